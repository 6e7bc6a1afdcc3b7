//! Event ingestion pipeline
//!
//! Wires the schema resolver, session gate, classifier, and message store
//! into the single path every raw record flows through. The pipeline is
//! the only writer: stream callbacks and history loads both funnel into
//! [`EventPipeline::process_record`], one record at a time, in arrival
//! order. Readers take snapshots (`feed`, `store`, `stats`) and watch the
//! version counters for change.
//!
//! Rejection is cheap and silent by design. A record that fails the
//! session gate produces no feed entry and no store mutation; a payload
//! that fails to parse is dropped with a warning and the pipeline moves
//! on. One bad event never interrupts the stream.

pub mod classify;
pub mod resolve;

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::datetime_from_millis;
use crate::stats::{self, FeedStats, StatsCache};
use crate::store::MessageStore;
use crate::types::{EventCategory, FinalizeMeta, MessagePart, PartKind, ProcessedMessage, Role};

pub use classify::{event_hash, Classifier, ClassifyRules};
pub use resolve::{EventShape, ResolvedEvent};

/// Event types that append or overwrite a streamed part.
const PART_APPEND_TYPES: &[&str] = &["message.part", "message.part-added", "message.part.updated"];

/// Event type that seals a message.
const FINALIZE_TYPE: &str = "message.updated";

/// Event type that deletes a message.
const REMOVE_TYPE: &str = "message.removed";

// ============================================
// Outcomes
// ============================================

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Passed the session gate and entered the feed
    Accepted(EventCategory),
    /// Rejected: no session is active, so nothing is accepted
    NoActiveSession,
    /// Rejected: no strategy produced a session id for the record
    MissingSessionId,
    /// Rejected: the record belongs to a different session
    SessionMismatch,
}

impl Disposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Disposition::Accepted(_))
    }
}

/// Counters for one payload (or one history load).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Records parsed out of the payload
    pub received: usize,
    /// Records that passed the session gate
    pub accepted: usize,
    /// Records the session gate turned away
    pub rejected: usize,
    /// Whole payloads dropped as malformed
    pub dropped: usize,
}

impl ProcessOutcome {
    fn record(&mut self, disposition: Disposition) {
        self.received += 1;
        if disposition.is_accepted() {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

// ============================================
// Pipeline
// ============================================

/// The single-writer ingestion pipeline for one active session.
pub struct EventPipeline {
    classifier: Classifier,
    store: MessageStore,
    feed: Vec<ProcessedMessage>,
    active_session: Option<String>,
    raw_seen: u64,
    stats: StatsCache,
}

impl EventPipeline {
    pub fn new(rules: ClassifyRules) -> Self {
        Self {
            classifier: Classifier::new(rules),
            store: MessageStore::new(),
            feed: Vec::new(),
            active_session: None,
            raw_seen: 0,
            stats: StatsCache::default(),
        }
    }

    /// The session whose events are currently accepted, if any.
    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    /// Select (or deselect) the active session.
    ///
    /// The gate change and the state reset happen together: there is no
    /// window where the new session is active but stale entries linger, or
    /// where old-session events can still land in a cleared store.
    /// Re-selecting the current session also clears, rebuilding from
    /// whatever history the caller loads next.
    pub fn switch_session(&mut self, session_id: Option<String>) {
        debug!(
            from = self.active_session.as_deref().unwrap_or("none"),
            to = session_id.as_deref().unwrap_or("none"),
            "Switching active session"
        );
        self.active_session = session_id;
        self.store.clear();
        self.feed.clear();
        self.raw_seen = 0;
        // The counters restart at values the memo may have already seen
        self.stats.reset();
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Every feed entry for the active session, oldest first.
    pub fn feed(&self) -> &[ProcessedMessage] {
        &self.feed
    }

    /// Feed entries past `cursor` (a previously observed feed length).
    /// Polling readers keep their own cursor and render only the tail.
    pub fn feed_since(&self, cursor: usize) -> &[ProcessedMessage] {
        let start = cursor.min(self.feed.len());
        &self.feed[start..]
    }

    /// Current statistics, recomputed only when something changed.
    pub fn stats(&mut self) -> FeedStats {
        self.stats
            .get_or_compute(self.store.version(), &self.feed, self.raw_seen)
    }

    /// Per-type counts of unclassified feed entries.
    pub fn unclassified_breakdown(&self) -> BTreeMap<String, usize> {
        stats::unclassified_breakdown(&self.feed)
    }

    /// Process one transport payload: a JSON object or a JSON array of
    /// objects. A payload that does not parse is dropped whole, with no
    /// state change of any kind.
    pub fn process_data(&mut self, data: &str) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::default();

        let parsed = match parse_payload(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, len = data.len(), "Dropping malformed stream payload");
                outcome.dropped += 1;
                return outcome;
            }
        };

        match parsed {
            Value::Array(records) => {
                for record in records {
                    outcome.record(self.process_record(record));
                }
            }
            record => outcome.record(self.process_record(record)),
        }
        outcome
    }

    /// Feed already-parsed history records through the same path as live
    /// traffic. Order is preserved; the session gate applies unchanged.
    pub fn load_history(&mut self, records: Vec<Value>) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::default();
        for record in records {
            outcome.record(self.process_record(record));
        }
        debug!(
            received = outcome.received,
            accepted = outcome.accepted,
            "Loaded session history"
        );
        outcome
    }

    /// Gate, classify, and apply one raw record. The record's effect is
    /// all-or-nothing: a rejected record changes nothing, an accepted one
    /// lands in the feed and (when it addresses a message) in the store.
    pub fn process_record(&mut self, record: Value) -> Disposition {
        self.raw_seen += 1;
        let event = ResolvedEvent::resolve(record);

        let active = match self.active_session.as_deref() {
            Some(active) => active,
            None => {
                debug!("No active session, rejecting event");
                return Disposition::NoActiveSession;
            }
        };
        let session_id = match event.session_id() {
            Some(sid) => sid,
            None => {
                debug!(shape = event.shape().as_str(), "Event carries no session id, rejecting");
                return Disposition::MissingSessionId;
            }
        };
        if session_id != active {
            debug!(
                event_session = session_id,
                active_session = active,
                "Event belongs to another session, rejecting"
            );
            return Disposition::SessionMismatch;
        }
        let session_id = session_id.to_string();

        let entry = self.classifier.classify(&event);
        let category = entry.category;
        self.apply_to_store(&event, &entry.event_type, &session_id);
        self.feed.push(entry);
        Disposition::Accepted(category)
    }

    /// Dispatch a gated event's store effect by type. Types outside the
    /// lifecycle set are feed-only and touch nothing here.
    fn apply_to_store(&mut self, event: &ResolvedEvent, event_type: &str, session_id: &str) {
        let wants_store = PART_APPEND_TYPES.contains(&event_type)
            || event_type == FINALIZE_TYPE
            || event_type == REMOVE_TYPE;
        if !wants_store {
            return;
        }

        let message_id = match event.message_id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                debug!(event_type, "Event addresses no message, feed entry only");
                return;
            }
        };

        let result = if PART_APPEND_TYPES.contains(&event_type) {
            match build_part(event) {
                Some(part) => self
                    .stamp_session(&message_id, session_id)
                    .and_then(|_| self.store.add_part(&message_id, part)),
                None => {
                    debug!(event_type, message_id, "Part payload not usable, feed entry only");
                    Ok(())
                }
            }
        } else if event_type == FINALIZE_TYPE {
            let role = event.role().and_then(|r| Role::from_str(r).ok());
            let finalized_message = event.finalized_message().map(str::to_string);
            let meta = FinalizeMeta {
                project_name: event.project_name().map(str::to_string),
                mode: event.mode().map(str::to_string),
            };
            self.stamp_session(&message_id, session_id)
                .and_then(|_| self.store.finalize_message(&message_id, role, finalized_message, meta))
        } else {
            self.store.remove_message(&message_id);
            Ok(())
        };

        if let Err(err) = result {
            warn!(error = %err, event_type, message_id, "Store update failed");
        }
    }

    /// Record which session an entry belongs to, on first touch only.
    fn stamp_session(&mut self, message_id: &str, session_id: &str) -> Result<()> {
        let entry = self.store.get_or_create(message_id)?;
        if entry.session_id.is_none() {
            entry.session_id = Some(session_id.to_string());
        }
        Ok(())
    }
}

impl Default for EventPipeline {
    fn default() -> Self {
        Self::new(ClassifyRules::default())
    }
}

/// Parse one transport payload, typing the failure as [`Error::Parse`].
fn parse_payload(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|err| Error::Parse(err.to_string()))
}

/// Build a store part from an event's part payload. Field names differ
/// between the live stream (`id`, `type`) and flat records (`partId`,
/// `partType`); both are honored. Parts of kinds the store does not track
/// (tool calls, step markers) yield `None`.
fn build_part(event: &ResolvedEvent) -> Option<MessagePart> {
    let part = event.part()?;

    let part_id = resolve::str_field(part, "partId").or_else(|| resolve::str_field(part, "id"))?;
    let kind_str =
        resolve::str_field(part, "partType").or_else(|| resolve::str_field(part, "type"))?;
    let kind = PartKind::from_str(kind_str).ok()?;

    let timestamp = part
        .get("timestamp")
        .and_then(Value::as_u64)
        .and_then(datetime_from_millis)
        .unwrap_or_else(Utc::now);

    Some(MessagePart {
        part_id: part_id.to_string(),
        kind,
        text: resolve::str_field(part, "text").unwrap_or("").to_string(),
        delta: resolve::str_field(part, "delta").map(str::to_string),
        timestamp,
    })
}
