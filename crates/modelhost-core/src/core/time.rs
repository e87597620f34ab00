// crates/modelhost-core/src/core/time.rs
// ============================================================================
// Module: Modelhost Time Model
// Description: Canonical timestamp representation for events and records.
// Purpose: Provide a single epoch-nanosecond time value with stable wire form.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Modelhost stamps events and records with nanoseconds since the Unix
//! epoch. The representation is a plain signed integer so that stored rows
//! sort and compare without parsing; `i64` nanoseconds cover dates well past
//! the service life of a single-host deployment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp: nanoseconds since the Unix epoch.
///
/// # Invariants
/// - Values compare and sort by chronological order.
/// - Reading the wall clock saturates rather than failing: a clock before
///   the epoch yields zero, a clock beyond `i64` range yields `i64::MAX`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from raw epoch nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Reads the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX));
        Self(nanos)
    }

    /// Returns the timestamp as epoch nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Returns the timestamp as epoch milliseconds (truncating).
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0 / 1_000_000
    }

    /// Returns a timestamp shifted backwards by the given duration,
    /// saturating at the epoch.
    #[must_use]
    pub fn saturating_sub(self, duration: std::time::Duration) -> Self {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(nanos).max(0))
    }
}
