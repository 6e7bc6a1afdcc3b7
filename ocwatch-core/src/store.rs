//! In-memory message aggregation store
//!
//! The store owns the `message_id -> MessageEntry` map for the active
//! session. It is memory-only by design: on session activation it is rebuilt
//! from loaded history plus the live stream, and a session switch clears it.
//!
//! ## Write model
//!
//! The store has exactly one writer (the ingest pipeline) and any number of
//! readers. Readers never mutate; instead of watching for ambient changes
//! they poll [`MessageStore::version`], a counter bumped on every mutation,
//! and re-read when it moves.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::types::{FinalizeMeta, MessageEntry, MessagePart, Role};

/// Monotonic store revision. Bumped on every mutation.
pub type StoreVersion = u64;

/// Per-session message aggregate, keyed by server-assigned message id.
#[derive(Debug, Default)]
pub struct MessageStore {
    entries: HashMap<String, MessageEntry>,
    version: StoreVersion,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current store revision.
    pub fn version(&self) -> StoreVersion {
        self.version
    }

    /// Number of entries in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the existing entry for `message_id`, or create an empty one.
    ///
    /// Fails with [`Error::InvalidKey`] on an empty id; anonymous messages
    /// must never be registered.
    pub fn get_or_create(&mut self, message_id: &str) -> Result<&mut MessageEntry> {
        validate_key(message_id)?;

        if !self.entries.contains_key(message_id) {
            self.entries
                .insert(message_id.to_string(), MessageEntry::new(message_id, Utc::now()));
            self.version += 1;
            tracing::debug!(message_id, "Created message entry");
        }

        // The entry is guaranteed present after the insert above.
        self.entries
            .get_mut(message_id)
            .ok_or_else(|| Error::InvalidKey(message_id.to_string()))
    }

    /// Append a part to the entry for `message_id`, creating the entry if
    /// needed. A part whose `part_id` matches an existing part replaces it
    /// in place (last write wins, position preserved).
    pub fn add_part(&mut self, message_id: &str, part: MessagePart) -> Result<()> {
        let entry = self.get_or_create(message_id)?;
        entry.upsert_part(part);
        entry.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Seal the entry for `message_id`, creating it if needed.
    ///
    /// Fields present on this call overwrite earlier values; absent fields
    /// leave earlier values in place, so repeating a finalize is idempotent
    /// and `finalized` never flips back to false.
    pub fn finalize_message(
        &mut self,
        message_id: &str,
        role: Option<Role>,
        finalized_message: Option<String>,
        meta: FinalizeMeta,
    ) -> Result<()> {
        let entry = self.get_or_create(message_id)?;

        if let Some(role) = role {
            entry.role = Some(role);
        }
        if let Some(text) = finalized_message {
            entry.finalized_message = Some(text);
        }
        if let Some(project_name) = meta.project_name {
            entry.project_name = Some(project_name);
        }
        if let Some(mode) = meta.mode {
            entry.mode = Some(mode);
        }
        entry.finalized = true;
        entry.updated_at = Utc::now();
        self.version += 1;
        Ok(())
    }

    /// Look up a single entry.
    pub fn message(&self, message_id: &str) -> Option<&MessageEntry> {
        self.entries.get(message_id)
    }

    /// All entries belonging to a session, in unspecified order. Callers
    /// that need a transcript should sort by `created_at`.
    pub fn messages_by_session(&self, session_id: &str) -> Vec<&MessageEntry> {
        self.entries
            .values()
            .filter(|e| e.session_id.as_deref() == Some(session_id))
            .collect()
    }

    /// Remove an entry, returning it if it existed. The only destructor an
    /// entry has; nothing else deletes entries implicitly.
    pub fn remove_message(&mut self, message_id: &str) -> Option<MessageEntry> {
        let removed = self.entries.remove(message_id);
        if removed.is_some() {
            self.version += 1;
            tracing::debug!(message_id, "Removed message entry");
        }
        removed
    }

    /// Drop all entries. Used on session switch.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.version += 1;
        }
    }
}

fn validate_key(message_id: &str) -> Result<()> {
    if message_id.is_empty() {
        return Err(Error::InvalidKey(
            "message id must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PartKind;

    fn part(part_id: &str, text: &str) -> MessagePart {
        MessagePart {
            part_id: part_id.to_string(),
            kind: PartKind::Text,
            text: text.to_string(),
            delta: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut store = MessageStore::new();
        assert!(matches!(
            store.get_or_create(""),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            store.add_part("", part("p1", "x")),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            store.finalize_message("", None, None, FinalizeMeta::default()),
            Err(Error::InvalidKey(_))
        ));
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_lazy_creation() {
        let mut store = MessageStore::new();
        assert!(store.message("m1").is_none());

        store.add_part("m1", part("p1", "hello")).unwrap();
        let entry = store.message("m1").unwrap();
        assert_eq!(entry.message_id, "m1");
        assert!(!entry.finalized);
        assert_eq!(entry.parts.len(), 1);
        assert_eq!(entry.created_at, store.message("m1").unwrap().created_at);
    }

    #[test]
    fn test_part_dedup_preserves_position() {
        let mut store = MessageStore::new();
        store.add_part("m1", part("p1", "a")).unwrap();
        store.add_part("m1", part("p2", "b")).unwrap();
        store.add_part("m1", part("p1", "ab")).unwrap();

        let entry = store.message("m1").unwrap();
        assert_eq!(entry.parts.len(), 2);
        assert_eq!(entry.parts[0].part_id, "p1");
        assert_eq!(entry.parts[0].text, "ab");
        assert_eq!(entry.parts[1].part_id, "p2");
    }

    #[test]
    fn test_finalize_idempotent() {
        let mut store = MessageStore::new();
        store.add_part("m1", part("p1", "Hi")).unwrap();
        store
            .finalize_message(
                "m1",
                Some(Role::Assistant),
                Some("Hi there".to_string()),
                FinalizeMeta::default(),
            )
            .unwrap();

        let first = store.message("m1").unwrap().clone();

        store
            .finalize_message(
                "m1",
                Some(Role::Assistant),
                Some("Hi there".to_string()),
                FinalizeMeta::default(),
            )
            .unwrap();

        let second = store.message("m1").unwrap();
        assert_eq!(second.role, first.role);
        assert_eq!(second.finalized, first.finalized);
        assert_eq!(second.finalized_message, first.finalized_message);
        assert_eq!(second.parts, first.parts);
        assert_eq!(second.project_name, first.project_name);
        assert_eq!(second.mode, first.mode);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_finalize_later_values_win() {
        let mut store = MessageStore::new();
        store
            .finalize_message(
                "m1",
                Some(Role::User),
                Some("draft".to_string()),
                FinalizeMeta {
                    project_name: Some("alpha".to_string()),
                    mode: None,
                },
            )
            .unwrap();
        store
            .finalize_message(
                "m1",
                Some(Role::Assistant),
                Some("final".to_string()),
                FinalizeMeta {
                    project_name: None,
                    mode: Some("build".to_string()),
                },
            )
            .unwrap();

        let entry = store.message("m1").unwrap();
        assert_eq!(entry.role, Some(Role::Assistant));
        assert_eq!(entry.finalized_message.as_deref(), Some("final"));
        // Absent fields keep the earlier values
        assert_eq!(entry.project_name.as_deref(), Some("alpha"));
        assert_eq!(entry.mode.as_deref(), Some("build"));
        assert!(entry.finalized);
    }

    #[test]
    fn test_finalized_is_monotonic() {
        let mut store = MessageStore::new();
        store
            .finalize_message("m1", Some(Role::Assistant), None, FinalizeMeta::default())
            .unwrap();
        // A later finalize with nothing to say must not unseal the entry
        store
            .finalize_message("m1", None, None, FinalizeMeta::default())
            .unwrap();

        let entry = store.message("m1").unwrap();
        assert!(entry.finalized);
        assert_eq!(entry.role, Some(Role::Assistant));
    }

    #[test]
    fn test_parts_survive_finalize() {
        let mut store = MessageStore::new();
        store.add_part("m1", part("p1", "Hi")).unwrap();
        store
            .finalize_message(
                "m1",
                Some(Role::Assistant),
                Some("Hi there".to_string()),
                FinalizeMeta::default(),
            )
            .unwrap();

        let entry = store.message("m1").unwrap();
        assert_eq!(entry.parts.len(), 1);
        assert_eq!(entry.parts[0].text, "Hi");
        assert_eq!(entry.finalized_message.as_deref(), Some("Hi there"));
    }

    #[test]
    fn test_messages_by_session() {
        let mut store = MessageStore::new();
        store.get_or_create("m1").unwrap().session_id = Some("s1".to_string());
        store.get_or_create("m2").unwrap().session_id = Some("s2".to_string());
        store.get_or_create("m3").unwrap().session_id = Some("s1".to_string());

        let s1 = store.messages_by_session("s1");
        assert_eq!(s1.len(), 2);
        assert!(s1.iter().all(|e| e.session_id.as_deref() == Some("s1")));
        assert_eq!(store.messages_by_session("s3").len(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store = MessageStore::new();
        store.add_part("m1", part("p1", "a")).unwrap();
        store.add_part("m2", part("p2", "b")).unwrap();

        let removed = store.remove_message("m1");
        assert!(removed.is_some());
        assert!(store.message("m1").is_none());
        assert!(store.remove_message("m1").is_none());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_version_counts_mutations() {
        let mut store = MessageStore::new();
        let v0 = store.version();

        store.add_part("m1", part("p1", "a")).unwrap();
        let v1 = store.version();
        assert!(v1 > v0);

        // Reads do not bump the version
        let _ = store.message("m1");
        let _ = store.messages_by_session("s1");
        assert_eq!(store.version(), v1);

        store
            .finalize_message("m1", None, None, FinalizeMeta::default())
            .unwrap();
        assert!(store.version() > v1);

        // Clearing an already-empty store is not a mutation
        store.clear();
        let after_clear = store.version();
        store.clear();
        assert_eq!(store.version(), after_clear);
    }
}
