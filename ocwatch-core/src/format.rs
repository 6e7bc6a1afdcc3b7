//! Formatting helpers shared by the CLI and the classifier.

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let secs = Utc::now().signed_duration_since(ts).num_seconds();

    match secs {
        s if s < 0 => "just now".to_string(),
        s if s < MINUTE => format!("{}s ago", s),
        s if s < HOUR => format!("{}m ago", s / MINUTE),
        s if s < DAY => format!("{}h ago", s / HOUR),
        s if s < 7 * DAY => format!("{}d ago", s / DAY),
        _ => ts.format("%b %d").to_string(),
    }
}

/// Format an optional timestamp as relative time, or "never" if missing.
pub fn format_relative_time_opt(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts),
        None => "never".to_string(),
    }
}

/// Convert a server timestamp (unix milliseconds) to a DateTime. Values
/// outside the representable range are not timestamps and yield `None`.
pub fn datetime_from_millis(millis: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}

/// Truncate text to at most `max_chars` characters, appending "..." when
/// anything was cut. Collapses newlines so the result stays a single line.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(format_relative_time(now + Duration::seconds(30)), "just now");
        assert!(format_relative_time(now - Duration::seconds(30)).ends_with("s ago"));
        assert!(format_relative_time(now - Duration::minutes(5)).ends_with("m ago"));
        assert!(format_relative_time(now - Duration::hours(3)).ends_with("h ago"));
        assert!(format_relative_time(now - Duration::days(2)).ends_with("d ago"));
    }

    #[test]
    fn test_relative_time_opt() {
        assert_eq!(format_relative_time_opt(None), "never");
    }

    #[test]
    fn test_datetime_from_millis() {
        let dt = datetime_from_millis(1_700_000_000_000).unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);

        // Past i64 range the value would otherwise wrap negative
        assert!(datetime_from_millis(u64::MAX).is_none());
        assert!(datetime_from_millis(i64::MAX as u64 + 1).is_none());
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_text("this is far too long", 7), "this is...");
        // Char-boundary safe on multibyte input
        assert_eq!(truncate_text("héllo wörld", 5), "héllo...");
        // Newlines collapse to spaces
        assert_eq!(truncate_text("a\nb\r\nc", 10), "a b  c");
    }
}
