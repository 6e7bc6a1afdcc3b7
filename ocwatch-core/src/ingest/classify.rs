//! Event classification
//!
//! Sorts resolved events into the three categories and produces the
//! [`ProcessedMessage`] feed entry for each one. Classification is pure:
//! the same record always yields the same feed entry, including its id,
//! which is a content hash of the raw record.

use std::collections::HashSet;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::ClassifyConfig;
use crate::format::truncate_text;
use crate::ingest::resolve::ResolvedEvent;
use crate::types::{EventCategory, ProcessedMessage};

/// Maximum length of the one-line summary in a feed entry.
const SUMMARY_MAX_LEN: usize = 120;

/// The type sets that drive classification. Built from configuration so
/// deployments can track server-side type additions without a new binary.
#[derive(Debug, Clone)]
pub struct ClassifyRules {
    message_types: HashSet<String>,
    internal_types: HashSet<String>,
}

impl ClassifyRules {
    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self {
            message_types: config.message_types.iter().cloned().collect(),
            internal_types: config.internal_types.iter().cloned().collect(),
        }
    }

    pub fn category_for(&self, event_type: &str) -> EventCategory {
        if self.message_types.contains(event_type) {
            EventCategory::Message
        } else if self.internal_types.contains(event_type) {
            EventCategory::Internal
        } else {
            EventCategory::Unclassified
        }
    }
}

impl Default for ClassifyRules {
    fn default() -> Self {
        Self::from_config(&ClassifyConfig::default())
    }
}

/// Turns resolved events into feed entries.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ClassifyRules,
}

impl Classifier {
    pub fn new(rules: ClassifyRules) -> Self {
        Self { rules }
    }

    /// Classify one resolved event. Total: every event, including ones with
    /// no recognizable type, produces a feed entry.
    pub fn classify(&self, event: &ResolvedEvent) -> ProcessedMessage {
        let event_type = event.event_type().unwrap_or("").to_string();
        let category = if event_type.is_empty() {
            EventCategory::Unclassified
        } else {
            self.rules.category_for(&event_type)
        };

        ProcessedMessage {
            id: event_hash(event.record()),
            message_id: event.message_id().map(str::to_string),
            event_type: event_type.clone(),
            category,
            message: summary_for(category, &event_type, event),
            project_name: event.project_name().map(str::to_string),
            icon: icon_for(category, &event_type).to_string(),
            session_id: event.session_id().map(str::to_string),
            mode: event.mode().map(str::to_string),
        }
    }
}

/// Content hash of a raw record: SHA-256 over its canonical JSON encoding,
/// truncated to 128 bits. Identical records always hash identically because
/// object keys serialize in sorted order.
pub fn event_hash(record: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.to_string().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

fn summary_for(category: EventCategory, event_type: &str, event: &ResolvedEvent) -> String {
    match category {
        EventCategory::Message => {
            if let Some(text) = event.finalized_message().filter(|t| !t.is_empty()) {
                truncate_text(text, SUMMARY_MAX_LEN)
            } else if let Some(text) = part_text(event).filter(|t| !t.is_empty()) {
                truncate_text(text, SUMMARY_MAX_LEN)
            } else {
                event_type.to_string()
            }
        }
        EventCategory::Internal => event_type.to_string(),
        EventCategory::Unclassified => {
            if event_type.is_empty() {
                "unclassified event".to_string()
            } else {
                format!("unclassified event: {}", event_type)
            }
        }
    }
}

fn part_text(event: &ResolvedEvent) -> Option<&str> {
    event
        .part()
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
}

fn icon_for(category: EventCategory, event_type: &str) -> &'static str {
    match category {
        EventCategory::Message => {
            if event_type.contains(".part") {
                "+"
            } else if event_type == "message.updated" {
                "✓"
            } else if event_type == "message.removed" {
                "-"
            } else {
                "•"
            }
        }
        EventCategory::Internal => "·",
        EventCategory::Unclassified => "?",
    }
}
