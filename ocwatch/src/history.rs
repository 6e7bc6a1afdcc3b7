//! Aggregated session transcripts

use anyhow::{Context, Result};
use ocwatch_core::api::{expand_history_message, ApiClient};
use ocwatch_core::ingest::{ClassifyRules, EventPipeline};
use ocwatch_core::Config;

use crate::render;

pub async fn run(config: &Config, session_id: &str, json: bool) -> Result<()> {
    let client = ApiClient::new(&config.server).context("failed to create API client")?;

    let spinner = render::loading_spinner(&format!("Loading history for {}", session_id));
    let history = client
        .session_history_with_retry(session_id)
        .await
        .context("failed to load session history")?;
    spinner.finish_and_clear();

    let mut pipeline = EventPipeline::new(ClassifyRules::from_config(&config.classify));
    pipeline.switch_session(Some(session_id.to_string()));
    for message in &history {
        pipeline.load_history(expand_history_message(message));
    }

    let mut entries = pipeline.store().messages_by_session(session_id);
    entries.sort_by_key(|e| e.created_at);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No messages in session {}", session_id);
        return Ok(());
    }

    for entry in entries {
        println!("{}", render::transcript_block(entry));
    }
    Ok(())
}
