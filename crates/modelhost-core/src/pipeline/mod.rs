// crates/modelhost-core/src/pipeline/mod.rs
// ============================================================================
// Module: Modelhost Pipelines
// Description: Validation, the DAG executor, and the pipeline.* unit set.
// Purpose: Run user-defined workflows of unit invocations.
// Dependencies: crate::bus, crate::core, crate::runtime, crate::store
// ============================================================================

//! ## Overview
//! Pipelines are validated before storage, executed in dependency waves, and
//! cancellable from other threads. The unit set is the only external surface.

/// DAG scheduler and run lifecycle.
pub mod executor;
/// pipeline.* units.
pub mod units;
/// Static definition validation.
pub mod validate;

pub use executor::CancelOutcome;
pub use executor::DEFAULT_MAX_CONCURRENT_STEPS;
pub use executor::DEFAULT_STEP_TIMEOUT;
pub use executor::PipelineExecutor;
pub use executor::RUN_INPUT_KEY;
pub use validate::validate_steps;
