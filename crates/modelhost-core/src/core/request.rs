// crates/modelhost-core/src/core/request.rs
// ============================================================================
// Module: Modelhost Request Surface
// Description: The typed request/response façade of the gateway.
// Purpose: Define the only supported calling convention for units.
// Dependencies: crate::core::{error, identifiers}, serde, serde_json
// ============================================================================

//! ## Overview
//! External callers describe every invocation as a [`Request`]: a kind
//! string (`command` or `query`), a unit name, and an input mapping. The
//! gateway answers with a [`Response`] whose `ok`/`data`/`error` fields are
//! mutually exclusive; the constructors are the only way to build one, so
//! the exclusivity invariant cannot be violated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::CoreError;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::UnitName;

// ============================================================================
// SECTION: Request Kind
// ============================================================================

/// Resolved request kind.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// State-mutating action.
    Command,
    /// Read-only lookup.
    Query,
}

impl RequestKind {
    /// Parses a wire kind string; unknown kinds yield `None`.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "command" => Some(Self::Command),
            "query" => Some(Self::Query),
            _ => None,
        }
    }

    /// Returns the stable wire form of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
        }
    }
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// One unit invocation as described by an external caller.
///
/// # Invariants
/// - `kind` is carried as the raw wire string so the gateway can reject
///   unknown kinds with `INVALID_REQUEST`.
/// - `deadline_ms`, when present, overrides the gateway's default timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Raw request kind string (`command` or `query`).
    pub kind: String,
    /// Target unit name.
    pub unit: UnitName,
    /// Unit input mapping.
    #[serde(default)]
    pub input: Value,
    /// Optional caller-supplied correlation identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Optional per-request deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Request {
    /// Creates a command request for the given unit.
    #[must_use]
    pub fn command(unit: impl Into<UnitName>, input: Value) -> Self {
        Self {
            kind: RequestKind::Command.as_str().to_string(),
            unit: unit.into(),
            input,
            correlation_id: None,
            deadline_ms: None,
        }
    }

    /// Creates a query request for the given unit.
    #[must_use]
    pub fn query(unit: impl Into<UnitName>, input: Value) -> Self {
        Self {
            kind: RequestKind::Query.as_str().to_string(),
            unit: unit.into(),
            input,
            correlation_id: None,
            deadline_ms: None,
        }
    }

    /// Sets the correlation identifier.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets a per-request deadline in milliseconds.
    #[must_use]
    pub const fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Returns the per-request deadline as a duration, when present.
    #[must_use]
    pub const fn deadline(&self) -> Option<std::time::Duration> {
        match self.deadline_ms {
            Some(ms) => Some(std::time::Duration::from_millis(ms)),
            None => None,
        }
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Uniform gateway response.
///
/// # Invariants
/// - `ok == true` implies `error` is absent; `ok == false` implies `data`
///   is absent. The private fields and constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the invocation succeeded.
    ok: bool,
    /// Unit output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Typed error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CoreError>,
}

impl Response {
    /// Builds a success response carrying the unit output.
    #[must_use]
    pub const fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Builds a failure response carrying the typed error.
    #[must_use]
    pub const fn failure(error: CoreError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    /// Returns whether the invocation succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.ok
    }

    /// Returns the unit output on success.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Returns the typed error on failure.
    #[must_use]
    pub const fn error(&self) -> Option<&CoreError> {
        self.error.as_ref()
    }

    /// Consumes the response, yielding the output or the typed error.
    ///
    /// # Errors
    ///
    /// Returns the carried [`CoreError`] when the response is a failure.
    pub fn into_result(self) -> Result<Value, CoreError> {
        match (self.ok, self.data, self.error) {
            (true, Some(data), None) => Ok(data),
            (_, _, Some(error)) => Err(error),
            (true, None, None) => Ok(Value::Null),
            (false, _, None) => Err(CoreError::internal("gateway", "failure without error body")),
        }
    }
}
