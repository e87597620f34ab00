// crates/modelhost-core/src/core/model.rs
// ============================================================================
// Module: Modelhost Model Catalog Records
// Description: Catalog records for models tracked on the host.
// Purpose: Back the thin `model.*` unit set with a typed record.
// Dependencies: crate::core::time, serde
// ============================================================================

//! ## Overview
//! The model catalog tracks the models present on the host as first-class
//! entities. Pulling, conversion, and engine binding are provider concerns;
//! the core only keeps the accounting record the `model.*` units expose.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Model Record
// ============================================================================

/// Catalog availability state of a model.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// Model files are present and usable.
    Available,
    /// A provider is fetching the model.
    Pulling,
    /// The model is registered but its files are missing.
    Missing,
}

/// Catalog record for one model on the host.
///
/// # Invariants
/// - `name` is the catalog key and unique within the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Catalog-unique model name.
    pub name: String,
    /// Engine the model targets, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// On-disk size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Availability state.
    pub state: ModelState,
    /// Registration timestamp.
    pub registered_at: Timestamp,
}
