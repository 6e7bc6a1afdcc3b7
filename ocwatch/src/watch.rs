//! Live session watcher
//!
//! Primes the pipeline from history, then tails the server's event stream
//! and prints classified feed entries as they arrive. Runs until Ctrl+C.

use anyhow::{Context, Result};
use chrono::Local;
use ocwatch_core::api::{expand_history_message, ApiClient, ConnectionStatus, EventStream};
use ocwatch_core::ingest::{ClassifyRules, EventPipeline};
use ocwatch_core::types::EventCategory;
use ocwatch_core::Config;

use crate::render;

pub async fn run(config: &Config, session: Option<String>, verbose: u8) -> Result<()> {
    let client = ApiClient::new(&config.server).context("failed to create API client")?;

    // Probe health first so a dead server is reported before subscribing
    let healthy = client
        .health()
        .await
        .context("failed to probe server health")?;
    if !healthy {
        anyhow::bail!(
            "server at {} is unreachable or unhealthy",
            config.server.url
        );
    }

    let session_id = match session {
        Some(id) => id,
        None => pick_latest_session(&client).await?,
    };
    tracing::info!(session_id, "Watching session");

    let mut pipeline = EventPipeline::new(ClassifyRules::from_config(&config.classify));
    pipeline.switch_session(Some(session_id.clone()));

    // Prime from history so the watcher starts from the current transcript
    let spinner = render::loading_spinner(&format!("Loading history for {}", session_id));
    let history = client
        .session_history_with_retry(&session_id)
        .await
        .context("failed to load session history")?;
    for message in &history {
        pipeline.load_history(expand_history_message(message));
    }
    spinner.finish_and_clear();

    println!(
        "Watching session {} ({} message(s) in history). Press Ctrl+C to stop.",
        session_id,
        pipeline.store().len()
    );

    let mut cursor = pipeline.feed().len();
    let stream = EventStream::new(&config.server).context("failed to create event stream")?;

    tokio::select! {
        result = stream.run(
            |data| {
                let outcome = pipeline.process_data(data);
                if verbose >= 2 && outcome.rejected > 0 {
                    println!(
                        "[{}]   ({} event(s) for other sessions ignored)",
                        Local::now().format("%H:%M:%S"),
                        outcome.rejected
                    );
                }
                for entry in pipeline.feed_since(cursor) {
                    if verbose >= 1 || entry.category == EventCategory::Message {
                        println!("{}", render::feed_line(entry));
                    }
                }
                cursor = pipeline.feed().len();
            },
            |status| {
                if status != ConnectionStatus::Connecting {
                    println!(
                        "[{}] -- {} --",
                        Local::now().format("%H:%M:%S"),
                        status
                    );
                }
            },
        ) => {
            result.context("event stream failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
        }
    }

    let stats = pipeline.stats();
    println!(
        "Session {}: {} raw event(s), {} classified, {} unclassified, {} message(s)",
        session_id,
        stats.total_raw_events,
        stats.classified_messages,
        stats.unclassified_messages,
        pipeline.store().len()
    );

    tracing::info!("ocwatch watch stopped");
    Ok(())
}

/// Pick the most recently updated session from the server.
async fn pick_latest_session(client: &ApiClient) -> Result<String> {
    let sessions = client.sessions().await.context("failed to list sessions")?;

    let latest = sessions
        .into_iter()
        .max_by_key(|s| s.time.and_then(|t| t.updated).unwrap_or(0))
        .ok_or_else(|| anyhow::anyhow!("no sessions found; is the server running?"))?;
    Ok(latest.id)
}
