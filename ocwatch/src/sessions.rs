//! Session listing

use anyhow::{Context, Result};
use ocwatch_core::api::ApiClient;
use ocwatch_core::format::{datetime_from_millis, format_relative_time_opt};
use ocwatch_core::Config;

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let client = ApiClient::new(&config.server).context("failed to create API client")?;

    let mut sessions = client.sessions().await.context("failed to list sessions")?;
    sessions.sort_by_key(|s| std::cmp::Reverse(s.time.and_then(|t| t.updated).unwrap_or(0)));

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{:<30}  {:<12}  TITLE", "SESSION", "UPDATED");
    for session in &sessions {
        let updated = format_relative_time_opt(
            session
                .time
                .and_then(|t| t.updated)
                .and_then(datetime_from_millis),
        );
        println!(
            "{:<30}  {:<12}  {}",
            session.id,
            updated,
            session.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}
