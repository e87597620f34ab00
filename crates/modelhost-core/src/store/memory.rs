// crates/modelhost-core/src/store/memory.rs
// ============================================================================
// Module: In-Memory Entity Store
// Description: Thread-safe keyed map with create/get/update/delete/list.
// Purpose: Back pipelines, runs, and the model catalog without a database.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! A [`MemoryStore`] is a `RwLock`-protected ordered map with the store
//! contract: `create` on an existing key is `already exists`, reads and
//! writes on a missing key are `not found`, and `list` returns a copied
//! slice plus its count. Values are cloned out; callers never hold
//! references into the map.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::CoreError;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Entity store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An entity with the key already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// No entity exists for the key.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Maps the store error into the unit-facing taxonomy for a domain.
    #[must_use]
    pub fn into_core(self, domain: &str) -> CoreError {
        match self {
            Self::AlreadyExists(key) => {
                CoreError::already_exists(domain, format!("already exists: {key}"))
            }
            Self::NotFound(key) => CoreError::not_found(domain, format!("not found: {key}")),
        }
    }
}

// ============================================================================
// SECTION: Memory Store
// ============================================================================

/// Thread-safe in-memory keyed store.
///
/// # Invariants
/// - All operations are linearizable under the single `RwLock`.
/// - No callback runs while the lock is held; `list` filters over clones.
#[derive(Debug, Default)]
pub struct MemoryStore<K, V> {
    /// Keyed entries.
    entries: RwLock<BTreeMap<K, V>>,
}

impl<K, V> MemoryStore<K, V>
where
    K: Ord + Clone + fmt::Display,
    V: Clone,
{
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Inserts a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the key is taken.
    pub fn create(&self, key: K, value: V) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        entries.insert(key, value);
        Ok(())
    }

    /// Returns a copy of the entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent.
    pub fn get(&self, key: &K) -> Result<V, StoreError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Replaces an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent.
    pub fn update(&self, key: &K, value: V) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    /// Removes an entity, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent.
    pub fn delete(&self, key: &K) -> Result<V, StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Returns copies of all entities accepted by the filter, with the count.
    pub fn list(&self, filter: impl Fn(&V) -> bool) -> (Vec<V>, usize) {
        let snapshot: Vec<V> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let matched: Vec<V> = snapshot.into_iter().filter(|value| filter(value)).collect();
        let count = matched.len();
        (matched, count)
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}
