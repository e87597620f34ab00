// crates/modelhost-core/src/lib.rs
// ============================================================================
// Module: Modelhost Core
// Description: Control-plane core of a single-host AI inference manager.
// Purpose: Unit dispatch, resource arbitration, events, and pipelines.
// Dependencies: rand, serde, serde_json, serde_jcs, sha2, thiserror, tracing
// ============================================================================

//! ## Overview
//! `modelhost-core` is the unit-dispatch, resource-arbitration,
//! event-distribution, and pipeline-execution substrate of Modelhost. Every
//! state-mutating action (command) and every read (query) is a uniformly
//! described unit invoked through the gateway; units publish lifecycle
//! events through the envelope; the slot manager arbitrates the host budget
//! against an injected probe; the pipeline executor runs DAG workflows of
//! unit invocations. Host integration (probes, engine and inference
//! backends, durable event storage) is injected through the `interfaces`
//! traits.

/// Event bus: contract, in-memory, and durable variants.
pub mod bus;
/// Execution context with cooperative cancellation.
pub mod context;
/// Pure data model.
pub mod core;
/// engine.* units.
pub mod engine;
/// Canonical JSON digests.
pub mod hashing;
/// Injected provider and storage contracts.
pub mod interfaces;
/// model.* units.
pub mod model;
/// Pipeline validation, executor, and units.
pub mod pipeline;
/// Resource slot manager and units.
pub mod resource;
/// Registry, gateway, envelope, and service bundle.
pub mod runtime;
/// In-memory entity and event stores.
pub mod store;

pub use self::context::CancelHandle;
pub use self::context::Context;
pub use self::core::AdmissionDecision;
pub use self::core::BudgetPool;
pub use self::core::CapacityFigures;
pub use self::core::CoreError;
pub use self::core::CorrelationId;
pub use self::core::DEFAULT_SLOT_PRIORITY;
pub use self::core::ErrorCode;
pub use self::core::Event;
pub use self::core::EventId;
pub use self::core::HostUsage;
pub use self::core::MAX_SLOT_PRIORITY;
pub use self::core::ModelRecord;
pub use self::core::ModelState;
pub use self::core::Pipeline;
pub use self::core::PipelineId;
pub use self::core::PipelineRun;
pub use self::core::PipelineStatus;
pub use self::core::PipelineStep;
pub use self::core::PressureLevel;
pub use self::core::Request;
pub use self::core::RequestKind;
pub use self::core::ResourceBudgetReport;
pub use self::core::ResourceSlot;
pub use self::core::ResourceStatusSnapshot;
pub use self::core::Response;
pub use self::core::RunId;
pub use self::core::RunStatus;
pub use self::core::SlotId;
pub use self::core::SlotStatus;
pub use self::core::SlotType;
pub use self::core::StepId;
pub use self::core::SubscriptionId;
pub use self::core::Timestamp;
pub use self::core::Unit;
pub use self::core::UnitDescriptor;
pub use self::core::UnitExample;
pub use self::core::UnitName;
pub use self::core::ValidationReport;
pub use self::core::decode_input;
pub use self::core::domain_of;
pub use self::core::encode_output;
