// crates/modelhost-core/src/runtime/mod.rs
// ============================================================================
// Module: Modelhost Runtime
// Description: Registry, gateway, envelope, and the wired service bundle.
// Purpose: Dispatch requests to units with uniform shaping and lifecycle.
// Dependencies: crate::bus, crate::core
// ============================================================================

//! ## Overview
//! The runtime turns the data model into a dispatchable surface: the
//! registry resolves names, the envelope wraps every unit with lifecycle
//! events, the gateway shapes requests and responses, and [`CoreServices`]
//! wires everything with explicit injection and ordered teardown.

/// Lifecycle event envelope.
pub mod envelope;
/// Request gateway.
pub mod gateway;
/// Unit registry.
pub mod registry;
/// Core services bundle.
pub mod services;

pub use envelope::UnitEnvelope;
pub use gateway::DEFAULT_REQUEST_TIMEOUT;
pub use gateway::Gateway;
pub use registry::UnitRegistry;
pub use services::CoreOptions;
pub use services::CoreServices;
pub use services::CoreServicesBuilder;
