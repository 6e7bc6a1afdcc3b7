//! # ocwatch-core
//!
//! Core library for ocwatch - a live activity watcher for agent coding
//! sessions.
//!
//! This library provides:
//! - Schema resolution and classification for raw server events
//! - The in-memory message store that aggregates streamed parts
//! - The single-writer ingestion pipeline with its session gate
//! - HTTP and SSE clients for the agent server
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Every raw record, live or historical, takes the same path:
//! - **Resolve:** detect the payload shape once, expose tolerant accessors
//! - **Gate:** accept only events for the active session
//! - **Classify:** produce a deterministic feed entry per event
//! - **Aggregate:** fold message lifecycle events into per-message entries
//!
//! Readers poll the feed and store through version counters; statistics
//! are derived on demand and memoized.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ocwatch_core::{Config, EventPipeline};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let mut pipeline = EventPipeline::new(
//!     ocwatch_core::ClassifyRules::from_config(&config.classify),
//! );
//! pipeline.switch_session(Some("ses_1".to_string()));
//! pipeline.process_data(r#"{"type":"message.part","sessionId":"ses_1"}"#);
//! ```

// Re-export commonly used items at the crate root
pub use api::{ApiClient, EventStream};
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{ClassifyRules, EventPipeline, ProcessOutcome};
pub use stats::FeedStats;
pub use store::MessageStore;
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod stats;
pub mod store;
pub mod types;
