//! Time-indexed event storage
//!
//! Normalized events are stored behind the [`EventStore`] trait so the
//! in-memory baseline can be swapped for a durable backend without touching
//! the pipeline. Appends deduplicate on `(timestamp, signal, value)`; range
//! queries are half-open `[since, until)` and ascend by timestamp.

use crate::types::CanonicalEvent;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Storage contract for normalized events
pub trait EventStore {
    /// Insert an event. Returns `false` (a no-op) when an event with the
    /// same dedup key is already stored, making re-ingestion idempotent.
    fn append(&mut self, event: CanonicalEvent) -> bool;

    /// All events with `since <= timestamp < until`, ascending by timestamp.
    /// An empty window returns an empty vec, not an error.
    fn query(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<CanonicalEvent>;

    /// Number of stored events
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory baseline store backed by an ordered map
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    // Multiple signals can share one instant, so each key holds a bucket
    events: BTreeMap<DateTime<Utc>, Vec<CanonicalEvent>>,
    count: usize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn append(&mut self, event: CanonicalEvent) -> bool {
        let bucket = self.events.entry(event.timestamp).or_default();
        if bucket
            .iter()
            .any(|existing| existing.dedup_key() == event.dedup_key())
        {
            return false;
        }
        bucket.push(event);
        self.count += 1;
        true
    }

    fn query(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<CanonicalEvent> {
        if since >= until {
            return Vec::new();
        }
        self.events
            .range(since..until)
            .flat_map(|(_, bucket)| bucket.iter().cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.count
    }
}
