// crates/modelhost-core/src/core/event.rs
// ============================================================================
// Module: Modelhost Events
// Description: Domain-qualified events published on the event bus.
// Purpose: Define the immutable event record and its construction rules.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Event`] is immutable after publication. Its type is domain-qualified
//! (for example `resource.allocated`); the domain is always the portion of
//! the type before the first `.` and is derived at construction so the two
//! fields cannot drift. Events carry the correlation identifier of their
//! originating request when one exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::CorrelationId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event
// ============================================================================

/// Immutable domain event.
///
/// # Invariants
/// - `domain` equals the portion of `event_type` before the first `.`.
/// - Fields are never mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Domain-qualified event type (for example `resource.allocated`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Domain portion of the event type.
    pub domain: String,
    /// Event payload; opaque to the bus.
    pub payload: Value,
    /// Publication timestamp.
    pub timestamp: Timestamp,
    /// Correlation identifier of the originating request, when one exists.
    pub correlation_id: Option<CorrelationId>,
}

impl Event {
    /// Creates an event stamped with the current time, deriving the domain
    /// from the type prefix.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        payload: Value,
        correlation_id: Option<CorrelationId>,
    ) -> Self {
        let event_type = event_type.into();
        let domain = domain_of(&event_type).to_string();
        Self {
            event_type,
            domain,
            payload,
            timestamp: Timestamp::now(),
            correlation_id,
        }
    }

    /// Returns a copy of the event with the given timestamp (test fixtures
    /// and replay tooling).
    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Returns the domain portion of a domain-qualified event type.
#[must_use]
pub fn domain_of(event_type: &str) -> &str {
    event_type.split('.').next().unwrap_or(event_type)
}
