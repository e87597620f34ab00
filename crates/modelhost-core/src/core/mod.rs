// crates/modelhost-core/src/core/mod.rs
// ============================================================================
// Module: Modelhost Core Data Model
// Description: Canonical records, identifiers, errors, and contracts.
// Purpose: Group the pure data model shared by every runtime component.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `core` module holds the pure data model: identifiers, timestamps,
//! the error taxonomy, events, the request/response façade, unit
//! descriptors, and the resource/pipeline/model records. Nothing here
//! spawns threads or touches I/O.

/// Error taxonomy with stable codes.
pub mod error;
/// Domain events.
pub mod event;
/// Typed identifiers.
pub mod identifiers;
/// Model catalog records.
pub mod model;
/// Pipeline, step, and run records.
pub mod pipeline;
/// Request/response façade types.
pub mod request;
/// Resource slot and budget records.
pub mod slot;
/// Canonical timestamps.
pub mod time;
/// Unit descriptors and the execute contract.
pub mod unit;

pub use error::CoreError;
pub use error::ErrorCode;
pub use event::Event;
pub use event::domain_of;
pub use identifiers::CorrelationId;
pub use identifiers::EventId;
pub use identifiers::PipelineId;
pub use identifiers::RunId;
pub use identifiers::SlotId;
pub use identifiers::StepId;
pub use identifiers::SubscriptionId;
pub use identifiers::UnitName;
pub use model::ModelRecord;
pub use model::ModelState;
pub use pipeline::Pipeline;
pub use pipeline::PipelineRun;
pub use pipeline::PipelineStatus;
pub use pipeline::PipelineStep;
pub use pipeline::RunStatus;
pub use pipeline::ValidationReport;
pub use request::Request;
pub use request::RequestKind;
pub use request::Response;
pub use slot::AdmissionDecision;
pub use slot::BudgetPool;
pub use slot::CapacityFigures;
pub use slot::DEFAULT_SLOT_PRIORITY;
pub use slot::HostUsage;
pub use slot::MAX_SLOT_PRIORITY;
pub use slot::PressureLevel;
pub use slot::ResourceBudgetReport;
pub use slot::ResourceSlot;
pub use slot::ResourceStatusSnapshot;
pub use slot::SlotStatus;
pub use slot::SlotType;
pub use time::Timestamp;
pub use unit::Unit;
pub use unit::UnitDescriptor;
pub use unit::UnitExample;
pub use unit::decode_input;
pub use unit::encode_output;
