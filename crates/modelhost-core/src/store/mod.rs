// crates/modelhost-core/src/store/mod.rs
// ============================================================================
// Module: Modelhost Stores
// Description: Thread-safe in-memory stores for core entities and events.
// Purpose: Own entity persistence behind narrow, contract-tested surfaces.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Entity stores are keyed in-memory maps (pipelines, runs, the model
//! catalog); the volatile event store mirrors the durable store's contract
//! for tests and storeless deployments. Each store is the sole owner of its
//! entities.

/// Volatile event store.
pub mod event_memory;
/// Generic keyed entity store.
pub mod memory;

pub use event_memory::InMemoryEventStore;
pub use memory::MemoryStore;
pub use memory::StoreError;

use crate::core::ModelRecord;
use crate::core::Pipeline;
use crate::core::PipelineId;
use crate::core::PipelineRun;
use crate::core::RunId;

/// Store of pipeline definitions keyed by pipeline id.
pub type PipelineStore = MemoryStore<PipelineId, Pipeline>;

/// Store of pipeline runs keyed by run id.
pub type RunStore = MemoryStore<RunId, PipelineRun>;

/// Model catalog keyed by model name.
pub type ModelStore = MemoryStore<String, ModelRecord>;
