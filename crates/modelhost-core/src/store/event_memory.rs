// crates/modelhost-core/src/store/event_memory.rs
// ============================================================================
// Module: In-Memory Event Store
// Description: Volatile EventStore for tests and storeless embeddings.
// Purpose: Provide the durable-store contract without a database.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A `Vec`-backed [`EventStore`]. Queries sort by event timestamp (insertion
//! order breaks ties) to match the durable store's ordering contract, so the
//! two implementations are interchangeable in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::PoisonError;
use std::sync::RwLock;

use crate::core::EventId;
use crate::core::Timestamp;
use crate::interfaces::EventQuery;
use crate::interfaces::EventStore;
use crate::interfaces::EventStoreError;
use crate::interfaces::RetentionPolicy;
use crate::interfaces::StoredEvent;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Volatile event store.
///
/// # Invariants
/// - Rows are append-only between prunes; `query` never mutates.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    /// Stored rows in insertion order.
    rows: RwLock<Vec<StoredEvent>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl EventStore for InMemoryEventStore {
    fn save(&self, event: &StoredEvent) -> Result<(), EventStoreError> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner).push(event.clone());
        Ok(())
    }

    fn save_batch(&self, events: &[StoredEvent]) -> Result<(), EventStoreError> {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events.iter().cloned());
        Ok(())
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut matched: Vec<StoredEvent> = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|row| query.matches(&row.event))
            .cloned()
            .collect();
        matched.sort_by_key(|row| row.event.timestamp);
        if query.limit > 0 {
            matched.truncate(query.limit);
        }
        Ok(matched)
    }

    fn get_by_id(&self, id: &EventId) -> Result<StoredEvent, EventStoreError> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|row| row.id == *id)
            .cloned()
            .ok_or_else(|| EventStoreError::NotFound(id.clone()))
    }

    fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, EventStoreError> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        if let Some(max_age) = policy.max_age {
            let cutoff = now.saturating_sub(max_age);
            rows.retain(|row| row.event.timestamp >= cutoff);
        }
        if let Some(max_events) = policy.max_events {
            let keep = usize::try_from(max_events).unwrap_or(usize::MAX);
            if rows.len() > keep {
                // Oldest rows go first; retention keeps the newest.
                rows.sort_by_key(|row| row.event.timestamp);
                let excess = rows.len() - keep;
                rows.drain(0..excess);
            }
        }
        Ok(u64::try_from(before - rows.len()).unwrap_or(u64::MAX))
    }
}
