//! Classification statistics for a session's history

use anyhow::{Context, Result};
use ocwatch_core::api::{expand_history_message, ApiClient};
use ocwatch_core::ingest::{ClassifyRules, EventPipeline};
use ocwatch_core::Config;

use crate::render;

pub async fn run(config: &Config, session_id: &str) -> Result<()> {
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

    let stats = pipeline.stats();
    println!("Session {}:", session_id);
    println!("  Raw events:    {}", stats.total_raw_events);
    println!("  Feed entries:  {}", stats.total_messages);
    println!("  Classified:    {}", stats.classified_messages);
    println!("  Unclassified:  {}", stats.unclassified_messages);
    println!("  Messages:      {}", pipeline.store().len());

    let breakdown = pipeline.unclassified_breakdown();
    if !breakdown.is_empty() {
        println!("\nUnclassified types ({}):", breakdown.len());
        for (event_type, count) in &breakdown {
            println!("  {:<32} {}", event_type, count);
        }
    }
    Ok(())
}
