//! Core domain types for ocwatch
//!
//! These types model the output side of the event pipeline: what a raw
//! server event becomes once it has been resolved, classified, and folded
//! into the per-session aggregate.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event record** | One raw JSON object from the server (live SSE or loaded history) |
//! | **Part** | An incremental fragment of a message (text or reasoning delta) |
//! | **Message entry** | The per-message aggregate: ordered parts plus the finalize result |
//! | **Feed entry** | A [`ProcessedMessage`]: one classified, display-ready log line per event |
//! | **Session** | One conversation on the server; the pipeline follows exactly one at a time |
//!
//! A message entry is created lazily the first time any event references its
//! id, accumulates parts while the assistant streams, and is sealed by a
//! finalize event. The feed is the flat, append-only log of everything that
//! passed the session filter, whether or not it touched an entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Part kinds
// ============================================

/// Kind of message part the pipeline accumulates.
///
/// The wire carries more part types ("tool", "step-start", ...); anything
/// that is not text-like is classified but never folded into an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    /// Assistant-visible output text
    Text,
    /// Model reasoning/thinking stream
    Reasoning,
}

impl PartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Text => "text",
            PartKind::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for PartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PartKind::Text),
            "reasoning" => Ok(PartKind::Reasoning),
            _ => Err(format!("unknown part kind: {}", s)),
        }
    }
}

// ============================================
// Roles
// ============================================

/// Author of a finalized message, as reported by the finalize event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

// ============================================
// Event categories
// ============================================

/// Bucket an event lands in after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Message-lifecycle traffic (parts, finalizes, removals)
    Message,
    /// Known server housekeeping (idle notices, storage writes, diagnostics)
    Internal,
    /// Anything the rule sets do not recognize; grouped by raw type string
    /// for diagnostics
    Unclassified,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Message => "message",
            EventCategory::Internal => "internal",
            EventCategory::Unclassified => "unclassified",
        }
    }

    /// Whether this category counts as classified in the statistics view.
    pub fn is_classified(&self) -> bool {
        !matches!(self, EventCategory::Unclassified)
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(EventCategory::Message),
            "internal" => Ok(EventCategory::Internal),
            "unclassified" => Ok(EventCategory::Unclassified),
            _ => Err(format!("unknown event category: {}", s)),
        }
    }
}

// ============================================
// Message parts
// ============================================

/// One streamed fragment of a message.
///
/// Parts are immutable once appended, with a single exception: a later part
/// carrying the same `part_id` replaces the earlier one in place (streaming
/// delta overwrite, last write wins, position preserved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    /// Server-assigned part id; the dedup key
    pub part_id: String,
    /// Text or reasoning
    pub kind: PartKind,
    /// Full text of the part as of this write
    pub text: String,
    /// Incremental delta, when the server sends one alongside the full text
    pub delta: Option<String>,
    /// When this part was observed
    pub timestamp: DateTime<Utc>,
}

// ============================================
// Message entries
// ============================================

/// Optional metadata carried by a finalize event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalizeMeta {
    pub project_name: Option<String>,
    pub mode: Option<String>,
}

/// The per-message aggregate, keyed by the server-assigned message id.
///
/// Created lazily on first reference (a part append or a finalize), never
/// implicitly deleted; explicit removal is the only destructor. `finalized`
/// is monotonic: once set it is never cleared by normal traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    /// Server-assigned message id (primary key)
    pub message_id: String,
    /// Session this message belongs to
    pub session_id: Option<String>,
    /// Set only by a finalize event
    pub role: Option<Role>,
    /// Ordered parts; insertion order is arrival order
    pub parts: Vec<MessagePart>,
    /// Whether a finalize event has sealed this entry
    pub finalized: bool,
    /// Complete message text from the finalize event, when it carries one
    pub finalized_message: Option<String>,
    /// Project name from finalize metadata
    pub project_name: Option<String>,
    /// Agent mode from finalize metadata (e.g. "build", "plan")
    pub mode: Option<String>,
    /// Set on first touch
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutation
    pub updated_at: DateTime<Utc>,
}

impl MessageEntry {
    /// Create an empty entry for a message id.
    pub fn new(message_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            message_id: message_id.into(),
            session_id: None,
            role: None,
            parts: Vec::new(),
            finalized: false,
            finalized_message: None,
            project_name: None,
            mode: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a part, or replace an existing part with the same `part_id`
    /// in place.
    pub fn upsert_part(&mut self, part: MessagePart) {
        match self.parts.iter_mut().find(|p| p.part_id == part.part_id) {
            Some(existing) => *existing = part,
            None => self.parts.push(part),
        }
    }

    /// All part text joined in arrival order.
    pub fn joined_parts(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.kind == PartKind::Text)
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Best available text for display: the finalized message when present,
    /// otherwise the joined streaming parts.
    pub fn display_text(&self) -> String {
        match &self.finalized_message {
            Some(text) if !text.is_empty() => text.clone(),
            _ => self.joined_parts(),
        }
    }
}

// ============================================
// Feed entries
// ============================================

/// One classified, display-ready log entry per accepted event.
///
/// Immutable once created. The `id` is a content hash of the raw record, so
/// classifying the same record twice yields byte-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    /// Deterministic content hash of the raw record (32 hex chars)
    pub id: String,
    /// Message id the event addressed, when it had one
    pub message_id: Option<String>,
    /// Raw event type string, unmodified ("" when absent)
    pub event_type: String,
    /// Classification bucket
    pub category: EventCategory,
    /// Human-readable one-line summary
    pub message: String,
    /// Project name, when the event carried one
    pub project_name: Option<String>,
    /// Short glyph for list rendering
    pub icon: String,
    /// Resolved session id, when the event carried one
    pub session_id: Option<String>,
    /// Agent mode, when the event carried one
    pub mode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_part_kind_round_trip() {
        assert_eq!(PartKind::from_str("text").unwrap(), PartKind::Text);
        assert_eq!(PartKind::from_str("reasoning").unwrap(), PartKind::Reasoning);
        assert_eq!(PartKind::Text.as_str(), "text");
        assert!(PartKind::from_str("tool").is_err());
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::from_str("assistant").unwrap(), Role::Assistant);
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert!(Role::from_str("system").is_err());
    }

    #[test]
    fn test_category_classified() {
        assert!(EventCategory::Message.is_classified());
        assert!(EventCategory::Internal.is_classified());
        assert!(!EventCategory::Unclassified.is_classified());
    }

    #[test]
    fn test_upsert_part_replaces_in_place() {
        let now = Utc::now();
        let mut entry = MessageEntry::new("m1", now);

        entry.upsert_part(MessagePart {
            part_id: "p1".to_string(),
            kind: PartKind::Text,
            text: "a".to_string(),
            delta: None,
            timestamp: now,
        });
        entry.upsert_part(MessagePart {
            part_id: "p2".to_string(),
            kind: PartKind::Text,
            text: "b".to_string(),
            delta: None,
            timestamp: now,
        });
        entry.upsert_part(MessagePart {
            part_id: "p1".to_string(),
            kind: PartKind::Text,
            text: "ab".to_string(),
            delta: Some("b".to_string()),
            timestamp: now,
        });

        assert_eq!(entry.parts.len(), 2);
        assert_eq!(entry.parts[0].part_id, "p1");
        assert_eq!(entry.parts[0].text, "ab");
        assert_eq!(entry.parts[1].part_id, "p2");
    }

    #[test]
    fn test_display_text_prefers_finalized() {
        let now = Utc::now();
        let mut entry = MessageEntry::new("m1", now);
        entry.upsert_part(MessagePart {
            part_id: "p1".to_string(),
            kind: PartKind::Text,
            text: "Hi".to_string(),
            delta: None,
            timestamp: now,
        });

        assert_eq!(entry.display_text(), "Hi");

        entry.finalized_message = Some("Hi there".to_string());
        assert_eq!(entry.display_text(), "Hi there");
    }

    #[test]
    fn test_joined_parts_skips_reasoning() {
        let now = Utc::now();
        let mut entry = MessageEntry::new("m1", now);
        entry.upsert_part(MessagePart {
            part_id: "p1".to_string(),
            kind: PartKind::Reasoning,
            text: "thinking".to_string(),
            delta: None,
            timestamp: now,
        });
        entry.upsert_part(MessagePart {
            part_id: "p2".to_string(),
            kind: PartKind::Text,
            text: "answer".to_string(),
            delta: None,
            timestamp: now,
        });

        assert_eq!(entry.joined_parts(), "answer");
    }
}
