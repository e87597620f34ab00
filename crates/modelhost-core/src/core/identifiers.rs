// crates/modelhost-core/src/core/identifiers.rs
// ============================================================================
// Module: Modelhost Identifiers
// Description: Canonical opaque identifiers for units, events, slots, and runs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Modelhost.
//! Identifiers are opaque and serialize as strings on the wire. Randomly
//! minted identifiers are 128-bit lower-hex tokens; slot and run identifiers
//! additionally carry their stable `slot-` / `run-` prefixes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Token Minting
// ============================================================================

/// Mints a fresh 128-bit random token encoded as 32 lower-hex characters.
fn random_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

// ============================================================================
// SECTION: Unit Name
// ============================================================================

/// Fully qualified unit name (for example `resource.allocate`).
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
/// - The domain is the portion before the first `.`; a name without a `.`
///   is its own domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    /// Creates a new unit name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain portion of the name (before the first `.`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UnitName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UnitName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Correlation Id
// ============================================================================

/// Correlation identifier threading a request through its lifecycle and
/// domain events.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
/// - Freshly generated values are 128-bit lower-hex tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates a new correlation identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random correlation identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Slot Id
// ============================================================================

/// Resource slot identifier minted by the slot manager.
///
/// # Invariants
/// - Minted values carry the stable `slot-` prefix and are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// Creates a slot identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh slot identifier with the `slot-` prefix.
    #[must_use]
    pub fn mint() -> Self {
        Self(format!("slot-{}", random_token()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SlotId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SlotId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Pipeline Identifiers
// ============================================================================

/// Pipeline identifier for persisted pipeline definitions.
///
/// # Invariants
/// - Minted values carry the stable `pipeline-` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(String);

impl PipelineId {
    /// Creates a pipeline identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh pipeline identifier with the `pipeline-` prefix.
    #[must_use]
    pub fn mint() -> Self {
        Self(format!("pipeline-{}", random_token()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PipelineId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PipelineId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Step identifier unique within one pipeline definition.
///
/// # Invariants
/// - Opaque UTF-8 string; uniqueness within a pipeline is enforced by
///   pipeline validation, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Creates a new step identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Pipeline run identifier minted by the executor.
///
/// # Invariants
/// - Minted values carry the stable `run-` prefix and are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a run identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh run identifier with the `run-` prefix.
    #[must_use]
    pub fn mint() -> Self {
        Self(format!("run-{}", random_token()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Bus Identifiers
// ============================================================================

/// Subscription identifier allocated by an event bus.
///
/// # Invariants
/// - Generated values are 128-bit lower-hex tokens, unique per bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Creates a subscription identifier from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random subscription identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubscriptionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Stored event identifier assigned when an event is persisted.
///
/// # Invariants
/// - Generated values are 128-bit lower-hex tokens; in-flight bus events
///   carry no identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates an event identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random event identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
