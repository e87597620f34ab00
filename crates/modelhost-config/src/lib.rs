// crates/modelhost-config/src/lib.rs
// ============================================================================
// Module: Modelhost Configuration
// Description: Canonical configuration model, loading, and validation.
// Purpose: Map files and environment onto validated core runtime options.
// Dependencies: modelhost-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The configuration model mirrors the recognized option surface of the
//! core: gateway timeout, event bus sizing and flushing, workflow limits,
//! and the resource pressure threshold. Durations are plain `*_ms` integer
//! fields with explicit defaults. Loading is TOML; `MODELHOST_`-prefixed
//! environment variables shadow file values. Validation fails closed with
//! precise messages before any value reaches the core.

/// Loading and environment overrides.
pub mod load;
/// Configuration model and validation.
pub mod model;

pub use load::ENV_PREFIX;
pub use load::apply_env_overrides;
pub use load::load;
pub use load::load_with_env;
pub use model::ConfigError;
pub use model::EventBusConfig;
pub use model::GatewayConfig;
pub use model::ModelhostConfig;
pub use model::ResourceConfig;
pub use model::WorkflowConfig;
