// crates/modelhost-config/src/model.rs
// ============================================================================
// Module: Configuration Model
// Description: Typed configuration sections with defaults and validation.
// Purpose: Define every recognized option and its effect on the core.
// Dependencies: modelhost-core, serde, thiserror
// ============================================================================

//! ## Overview
//! One struct per section. Every field has an explicit `default_*` function
//! so a missing key means its documented default, never a zero. Validation
//! rejects values that would wedge the core (zero-sized buffers or pools,
//! zero timeouts, thresholds outside `(0, 1]`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use modelhost_core::interfaces::RetentionPolicy;
use modelhost_core::runtime::CoreOptions;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// File could not be parsed as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Gateway options.
///
/// # Invariants
/// - `request_timeout_ms` is interpreted as milliseconds and must be > 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Default per-request deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Event bus options.
///
/// # Invariants
/// - `buffer_size` and `worker_count` must be > 0.
/// - Absent retention bounds mean unbounded retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// In-memory channel capacity.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Dispatcher pool size.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Persistent bus batch flush cadence in milliseconds.
    #[serde(default = "default_flush_period_ms")]
    pub flush_period_ms: u64,
    /// Maximum event age in milliseconds; absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_max_age_ms: Option<u64>,
    /// Maximum stored rows; absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_events: Option<u64>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            worker_count: default_worker_count(),
            flush_period_ms: default_flush_period_ms(),
            retention_max_age_ms: None,
            max_events: None,
        }
    }
}

/// Workflow (pipeline executor) options.
///
/// # Invariants
/// - `max_concurrent_steps` and `step_timeout_ms` must be > 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Parallelism inside one run.
    #[serde(default = "default_max_concurrent_steps")]
    pub max_concurrent_steps: usize,
    /// Per-step deadline in milliseconds.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: default_max_concurrent_steps(),
            step_timeout_ms: default_step_timeout_ms(),
        }
    }
}

/// Resource arbitration options.
///
/// # Invariants
/// - `pressure_threshold` lies in `(0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Memory-utilization ratio at which pressure warnings fire.
    #[serde(default = "default_pressure_threshold")]
    pub pressure_threshold: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            pressure_threshold: default_pressure_threshold(),
        }
    }
}

// ============================================================================
// SECTION: Root
// ============================================================================

/// Root configuration.
///
/// # Invariants
/// - A defaulted instance always validates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelhostConfig {
    /// Gateway section.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Event bus section.
    #[serde(default)]
    pub eventbus: EventBusConfig,
    /// Workflow section.
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Resource section.
    #[serde(default)]
    pub resource: ResourceConfig,
}

impl ModelhostConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "gateway.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.eventbus.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "eventbus.buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.eventbus.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "eventbus.worker_count must be greater than zero".to_string(),
            ));
        }
        if self.eventbus.flush_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "eventbus.flush_period_ms must be greater than zero".to_string(),
            ));
        }
        if self.eventbus.max_events == Some(0) {
            return Err(ConfigError::Invalid(
                "eventbus.max_events must be greater than zero when set".to_string(),
            ));
        }
        if self.workflow.max_concurrent_steps == 0 {
            return Err(ConfigError::Invalid(
                "workflow.max_concurrent_steps must be greater than zero".to_string(),
            ));
        }
        if self.workflow.step_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "workflow.step_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let threshold = self.resource.pressure_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(
                "resource.pressure_threshold must lie in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Maps the configuration onto core runtime options.
    #[must_use]
    pub fn core_options(&self) -> CoreOptions {
        CoreOptions {
            request_timeout: Duration::from_millis(self.gateway.request_timeout_ms),
            eventbus_buffer_size: self.eventbus.buffer_size,
            eventbus_worker_count: self.eventbus.worker_count,
            eventbus_flush_period: Duration::from_millis(self.eventbus.flush_period_ms),
            eventbus_retention: RetentionPolicy {
                max_age: self.eventbus.retention_max_age_ms.map(Duration::from_millis),
                max_events: self.eventbus.max_events,
            },
            max_concurrent_steps: self.workflow.max_concurrent_steps,
            step_timeout: Duration::from_millis(self.workflow.step_timeout_ms),
            pressure_threshold: self.resource.pressure_threshold,
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default gateway request timeout (30 s).
const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Returns the default event bus buffer size.
const fn default_buffer_size() -> usize {
    1_000
}

/// Returns the default dispatcher pool size.
const fn default_worker_count() -> usize {
    4
}

/// Returns the default persistent bus flush cadence (100 ms).
const fn default_flush_period_ms() -> u64 {
    100
}

/// Returns the default run parallelism.
const fn default_max_concurrent_steps() -> usize {
    10
}

/// Returns the default per-step deadline (5 min).
const fn default_step_timeout_ms() -> u64 {
    5 * 60 * 1_000
}

/// Returns the default pressure-warning threshold.
const fn default_pressure_threshold() -> f64 {
    0.9
}
