//! Derived feed statistics
//!
//! Statistics are never stored; they are recomputed from the feed on
//! demand and memoized against the pipeline's version counters, so a
//! render loop can poll them cheaply between events.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::store::StoreVersion;
use crate::types::{EventCategory, ProcessedMessage};

/// Aggregate counters over the current feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    /// Feed entries produced (one per accepted event)
    pub total_messages: usize,
    /// Entries in the message or internal categories
    pub classified_messages: usize,
    /// Entries that fell through both type sets
    pub unclassified_messages: usize,
    /// How many distinct event types the unclassified entries carry
    pub distinct_unclassified_types: usize,
    /// Raw records seen since the last session switch, accepted or not
    pub total_raw_events: u64,
}

/// Count categories across a feed. Tolerant by construction: any entry the
/// classifier produced is countable, whatever its fields hold.
pub fn compute(feed: &[ProcessedMessage], total_raw_events: u64) -> FeedStats {
    let mut classified = 0;
    let mut unclassified = 0;
    let mut unclassified_types: BTreeSet<&str> = BTreeSet::new();

    for entry in feed {
        if entry.category.is_classified() {
            classified += 1;
        } else {
            unclassified += 1;
            unclassified_types.insert(entry.event_type.as_str());
        }
    }

    FeedStats {
        total_messages: feed.len(),
        classified_messages: classified,
        unclassified_messages: unclassified,
        distinct_unclassified_types: unclassified_types.len(),
        total_raw_events,
    }
}

/// Per-type counts for the unclassified entries, sorted by type name. The
/// raw type strings are reported verbatim so new server vocabulary is
/// visible before anyone adds it to the classification config.
pub fn unclassified_breakdown(feed: &[ProcessedMessage]) -> BTreeMap<String, usize> {
    let mut breakdown = BTreeMap::new();
    for entry in feed {
        if entry.category == EventCategory::Unclassified {
            *breakdown.entry(entry.event_type.clone()).or_insert(0) += 1;
        }
    }
    breakdown
}

/// Memo for [`compute`], keyed by the pipeline's change counters.
#[derive(Debug, Default)]
pub struct StatsCache {
    key: Option<(StoreVersion, usize, u64)>,
    value: FeedStats,
}

impl StatsCache {
    /// Return the cached stats when nothing changed since the last call,
    /// recomputing otherwise.
    pub fn get_or_compute(
        &mut self,
        store_version: StoreVersion,
        feed: &[ProcessedMessage],
        total_raw_events: u64,
    ) -> FeedStats {
        let key = (store_version, feed.len(), total_raw_events);
        if self.key != Some(key) {
            self.value = compute(feed, total_raw_events);
            self.key = Some(key);
        }
        self.value
    }

    /// Forget the memo, forcing the next call to recompute. Called when the
    /// counters themselves restart and an old key could match a new state.
    pub fn reset(&mut self) {
        self.key = None;
    }
}
