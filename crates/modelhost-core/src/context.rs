// crates/modelhost-core/src/context.rs
// ============================================================================
// Module: Modelhost Execution Context
// Description: Cooperative cancellation and deadline propagation.
// Purpose: Thread one cancel/deadline object through every unit execution.
// Dependencies: crate::core::{error, identifiers}
// ============================================================================

//! ## Overview
//! A [`Context`] carries the correlation identifier, an optional deadline,
//! and a chain of cancel flags. Cancellation is cooperative: units call
//! [`Context::check`] at suspension points and return the typed `CANCELLED`
//! or `TIMEOUT` error; nothing ever kills a thread. Derived contexts inherit
//! the parent's flags, so cancelling a parent cancels every descendant while
//! a child's own cancellation never reaches the parent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crate::core::error::CoreError;
use crate::core::identifiers::CorrelationId;

// ============================================================================
// SECTION: Cancel Handle
// ============================================================================

/// Handle that cancels the context it was derived from.
///
/// # Invariants
/// - Cancellation is one-way and idempotent.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    /// Flag shared with the derived context.
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancels the associated context.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Execution context propagated through gateway, units, and the executor.
///
/// # Invariants
/// - Deadlines only tighten on derivation; a child never outlives its parent.
/// - Cancel flags accumulate on derivation; any set flag cancels the context.
#[derive(Debug, Clone)]
pub struct Context {
    /// Correlation identifier for the request this context serves.
    correlation_id: CorrelationId,
    /// Absolute deadline, when one applies.
    deadline: Option<Instant>,
    /// Cancel flags inherited from ancestors plus this context's own.
    cancel_flags: Vec<Arc<AtomicBool>>,
}

impl Context {
    /// Creates a root context with a fresh correlation identifier, no
    /// deadline, and no cancel flags.
    #[must_use]
    pub fn background() -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            deadline: None,
            cancel_flags: Vec::new(),
        }
    }

    /// Returns the correlation identifier.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Returns the absolute deadline, when one applies.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derives a child carrying the given correlation identifier.
    #[must_use]
    pub fn with_correlation_id(&self, correlation_id: CorrelationId) -> Self {
        let mut child = self.clone();
        child.correlation_id = correlation_id;
        child
    }

    /// Derives a child whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child with the tighter of the given and inherited deadlines.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.clone();
        child.deadline = Some(self.deadline.map_or(deadline, |inherited| inherited.min(deadline)));
        child
    }

    /// Derives a cancellable child and the handle that cancels it.
    #[must_use]
    pub fn cancellable(&self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let mut child = self.clone();
        child.cancel_flags.push(Arc::clone(&flag));
        (
            child,
            CancelHandle {
                flag,
            },
        )
    }

    /// Returns true when any cancel flag in the chain is set.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flags.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    /// Returns true when the deadline has elapsed.
    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns the remaining time before the deadline, when one applies.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Checks the context at a suspension point.
    ///
    /// # Errors
    ///
    /// Returns `CANCELLED` when a cancel flag is set (checked first) and
    /// `TIMEOUT` when the deadline has elapsed.
    pub fn check(&self, domain: &str) -> Result<(), CoreError> {
        if self.is_cancelled() {
            return Err(CoreError::cancelled(domain));
        }
        if self.deadline_exceeded() {
            return Err(CoreError::timeout(domain));
        }
        Ok(())
    }
}
