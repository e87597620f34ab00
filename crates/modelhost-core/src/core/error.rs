// crates/modelhost-core/src/core/error.rs
// ============================================================================
// Module: Modelhost Error Taxonomy
// Description: Stable error codes and the domain error carried by every unit.
// Purpose: Give callers a single typed error with programmatic codes.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every unit, the gateway, and the resource/pipeline runtimes surface
//! failures as a [`CoreError`]: a stable [`ErrorCode`], the originating
//! domain, and a human-readable message. Codes are wire-stable identifiers;
//! callers branch on the code, never on the message.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable error codes of the command/query surface.
///
/// # Invariants
/// - Variants serialize as their `SCREAMING_SNAKE_CASE` wire identifiers and
///   are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The requested unit is not registered.
    UnitNotFound,
    /// The request envelope itself is malformed (for example an unknown kind).
    InvalidRequest,
    /// The unit input failed validation.
    InvalidInput,
    /// An entity with the same identifier already exists.
    AlreadyExists,
    /// The referenced entity does not exist.
    NotFound,
    /// Admission was refused because the budget cannot accommodate the request.
    InsufficientResources,
    /// The referenced resource slot does not exist.
    SlotNotFound,
    /// The execution context's deadline elapsed.
    Timeout,
    /// The execution context was cancelled.
    Cancelled,
    /// A required injected provider is not configured.
    ProviderNotSet,
    /// An unexpected internal failure; the original message is preserved.
    InternalError,
}

impl ErrorCode {
    /// Returns the stable wire identifier for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnitNotFound => "UNIT_NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidInput => "INVALID_INPUT",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::InsufficientResources => "INSUFFICIENT_RESOURCES",
            Self::SlotNotFound => "SLOT_NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::ProviderNotSet => "PROVIDER_NOT_SET",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Core Error
// ============================================================================

/// Typed domain error returned by units and the gateway.
///
/// # Invariants
/// - `code` is stable; `domain` names the originating domain (for example
///   `resource`); `message` is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{domain}: {message} [{code}]")]
pub struct CoreError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Originating domain of the failure.
    pub domain: String,
    /// Human-readable message.
    pub message: String,
}

impl CoreError {
    /// Creates an error with an explicit code.
    #[must_use]
    pub fn new(code: ErrorCode, domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Returns true when the error carries the given code.
    #[must_use]
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    /// Input validation failure (`INVALID_INPUT`).
    #[must_use]
    pub fn invalid_input(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, domain, message)
    }

    /// Malformed request envelope (`INVALID_REQUEST`).
    #[must_use]
    pub fn invalid_request(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, domain, message)
    }

    /// Missing entity (`NOT_FOUND`).
    #[must_use]
    pub fn not_found(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, domain, message)
    }

    /// Conflicting entity (`ALREADY_EXISTS`).
    #[must_use]
    pub fn already_exists(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, domain, message)
    }

    /// Unknown unit (`UNIT_NOT_FOUND`).
    #[must_use]
    pub fn unit_not_found(domain: impl Into<String>, unit: &str) -> Self {
        Self::new(ErrorCode::UnitNotFound, domain, format!("unit not found: {unit}"))
    }

    /// Missing slot (`SLOT_NOT_FOUND`).
    #[must_use]
    pub fn slot_not_found(slot_id: &str) -> Self {
        Self::new(ErrorCode::SlotNotFound, "resource", format!("slot not found: {slot_id}"))
    }

    /// Refused admission (`INSUFFICIENT_RESOURCES`).
    #[must_use]
    pub fn insufficient_resources(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientResources, "resource", message)
    }

    /// Deadline elapsed (`TIMEOUT`).
    #[must_use]
    pub fn timeout(domain: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, domain, "context deadline exceeded")
    }

    /// Context cancelled (`CANCELLED`).
    #[must_use]
    pub fn cancelled(domain: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, domain, "context cancelled")
    }

    /// Missing injected provider (`PROVIDER_NOT_SET`).
    #[must_use]
    pub fn provider_not_set(domain: impl Into<String>, provider: &str) -> Self {
        Self::new(
            ErrorCode::ProviderNotSet,
            domain,
            format!("required provider not configured: {provider}"),
        )
    }

    /// Internal failure with the original message preserved (`INTERNAL_ERROR`).
    #[must_use]
    pub fn internal(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, domain, message)
    }
}
