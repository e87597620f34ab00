// crates/modelhost-config/src/load.rs
// ============================================================================
// Module: Configuration Loading
// Description: TOML file loading and environment overrides.
// Purpose: Produce a validated configuration from file and process state.
// Dependencies: crate::model, toml
// ============================================================================

//! ## Overview
//! Loading reads one TOML file into the model, then applies environment
//! overrides and validates. Override lookup is injectable so tests never
//! touch the process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use crate::model::ConfigError;
use crate::model::ModelhostConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix of every recognized environment override.
pub const ENV_PREFIX: &str = "MODELHOST_";

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads and validates a configuration file without environment overrides.
///
/// # Errors
///
/// Returns [`ConfigError`] on read, parse, or validation failure.
pub fn load(path: &Path) -> Result<ModelhostConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    let config: ModelhostConfig =
        toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Loads a configuration file, applies process-environment overrides, and
/// validates the result.
///
/// # Errors
///
/// Returns [`ConfigError`] on read, parse, override, or validation failure.
pub fn load_with_env(path: &Path) -> Result<ModelhostConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    let mut config: ModelhostConfig =
        toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

// ============================================================================
// SECTION: Environment Overrides
// ============================================================================

/// Applies `MODELHOST_`-prefixed overrides from the given lookup.
///
/// Recognized keys map 1:1 onto config fields, for example
/// `MODELHOST_EVENTBUS_BUFFER_SIZE` or
/// `MODELHOST_GATEWAY_REQUEST_TIMEOUT_MS`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when an override value fails to parse.
pub fn apply_env_overrides(
    config: &mut ModelhostConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    override_u64(&lookup, "MODELHOST_GATEWAY_REQUEST_TIMEOUT_MS", &mut config.gateway.request_timeout_ms)?;
    override_usize(&lookup, "MODELHOST_EVENTBUS_BUFFER_SIZE", &mut config.eventbus.buffer_size)?;
    override_usize(&lookup, "MODELHOST_EVENTBUS_WORKER_COUNT", &mut config.eventbus.worker_count)?;
    override_u64(&lookup, "MODELHOST_EVENTBUS_FLUSH_PERIOD_MS", &mut config.eventbus.flush_period_ms)?;
    override_opt_u64(
        &lookup,
        "MODELHOST_EVENTBUS_RETENTION_MAX_AGE_MS",
        &mut config.eventbus.retention_max_age_ms,
    )?;
    override_opt_u64(&lookup, "MODELHOST_EVENTBUS_MAX_EVENTS", &mut config.eventbus.max_events)?;
    override_usize(
        &lookup,
        "MODELHOST_WORKFLOW_MAX_CONCURRENT_STEPS",
        &mut config.workflow.max_concurrent_steps,
    )?;
    override_u64(&lookup, "MODELHOST_WORKFLOW_STEP_TIMEOUT_MS", &mut config.workflow.step_timeout_ms)?;
    override_f64(
        &lookup,
        "MODELHOST_RESOURCE_PRESSURE_THRESHOLD",
        &mut config.resource.pressure_threshold,
    )?;
    Ok(())
}

/// Overrides one `u64` field when the key is present.
fn override_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut u64,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = parse(key, &raw)?;
    }
    Ok(())
}

/// Overrides one optional `u64` field when the key is present.
fn override_opt_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut Option<u64>,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = Some(parse(key, &raw)?);
    }
    Ok(())
}

/// Overrides one `usize` field when the key is present.
fn override_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut usize,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = parse(key, &raw)?;
    }
    Ok(())
}

/// Overrides one `f64` field when the key is present.
fn override_f64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut f64,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *target = parse(key, &raw)?;
    }
    Ok(())
}

/// Parses an override value, naming the key on failure.
fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| ConfigError::Invalid(format!("{key}: {err}")))
}
