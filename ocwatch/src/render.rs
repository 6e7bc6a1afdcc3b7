//! Terminal output formatting

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use ocwatch_core::format::format_relative_time;
use ocwatch_core::types::{MessageEntry, ProcessedMessage};

/// One feed entry as a single log line.
pub fn feed_line(entry: &ProcessedMessage) -> String {
    format!(
        "[{}] {} {:<24} {}",
        Local::now().format("%H:%M:%S"),
        entry.icon,
        entry.event_type,
        entry.message
    )
}

/// One aggregated message as a transcript block: a header line with role
/// and age, then the text indented beneath it.
pub fn transcript_block(entry: &MessageEntry) -> String {
    let role = entry.role.map(|r| r.as_str()).unwrap_or("unknown");

    let mut block = format!("{} ({})", role, format_relative_time(entry.created_at));
    if let Some(mode) = &entry.mode {
        block.push_str(&format!(" [{}]", mode));
    }
    if !entry.finalized {
        block.push_str(" (streaming)");
    }

    let text = entry.display_text();
    if text.is_empty() {
        block.push_str("\n  (no text)");
    } else {
        for line in text.lines() {
            block.push_str("\n  ");
            block.push_str(line);
        }
    }
    block.push('\n');
    block
}

/// Spinner shown while a server call is in flight.
pub fn loading_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ocwatch_core::types::{EventCategory, Role};

    #[test]
    fn test_feed_line_shows_icon_and_summary() {
        let entry = ProcessedMessage {
            id: "abc".to_string(),
            message_id: Some("m1".to_string()),
            event_type: "message.part.updated".to_string(),
            category: EventCategory::Message,
            message: "Running the test suite".to_string(),
            project_name: None,
            icon: "+".to_string(),
            session_id: Some("S1".to_string()),
            mode: None,
        };

        let line = feed_line(&entry);
        assert!(line.contains("+ message.part.updated"));
        assert!(line.ends_with("Running the test suite"));
    }

    #[test]
    fn test_transcript_block_layout() {
        let mut entry = MessageEntry::new("m1", Utc::now());
        entry.role = Some(Role::Assistant);
        entry.mode = Some("build".to_string());
        entry.finalized = true;
        entry.finalized_message = Some("line one\nline two".to_string());

        let block = transcript_block(&entry);
        assert!(block.starts_with("assistant ("));
        assert!(block.contains("[build]"));
        assert!(!block.contains("(streaming)"));
        assert!(block.contains("\n  line one"));
        assert!(block.contains("\n  line two"));
    }

    #[test]
    fn test_transcript_block_unfinalized() {
        let entry = MessageEntry::new("m1", Utc::now());
        let block = transcript_block(&entry);
        assert!(block.starts_with("unknown ("));
        assert!(block.contains("(streaming)"));
        assert!(block.contains("(no text)"));
    }
}
