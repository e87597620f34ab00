// crates/modelhost-core/src/bus/mod.rs
// ============================================================================
// Module: Modelhost Event Bus
// Description: Publish/subscribe contract plus in-memory and durable buses.
// Purpose: Decouple event producers from consumers with bounded buffering.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The bus guarantees at-most-once, best-effort delivery per subscription
//! with a bounded buffer. Delivery preserves each publisher's relative order
//! per subscriber; there is no cross-producer ordering. A misbehaving
//! handler is logged and contained — it never poisons other subscribers or
//! the publisher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::SubscriptionId;
use crate::core::event::Event;
use crate::interfaces::EventStoreError;

/// Filter variants and evaluation.
pub mod filter;
/// Bounded in-memory bus with a sharded worker pool.
pub mod memory;
/// Durable bus layering an event store over the in-memory bus.
pub mod persistent;

pub use filter::EventFilter;
pub use memory::InMemoryEventBus;
pub use persistent::PersistentEventBus;

// ============================================================================
// SECTION: Bus Errors
// ============================================================================

/// Event bus errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus has been closed.
    #[error("event bus is closed")]
    Closed,
    /// No subscription exists for the identifier.
    #[error("subscription not found: {0}")]
    UnknownSubscription(SubscriptionId),
    /// The underlying event store failed.
    #[error("event store failure: {0}")]
    Store(#[from] EventStoreError),
    /// A replay handler refused an event.
    #[error("replay handler failed: {0}")]
    Handler(String),
}

// ============================================================================
// SECTION: Handler Contract
// ============================================================================

/// Error type a subscriber handler may return; logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber callback invoked for each matching event.
///
/// Handlers run on bus worker threads. A returned error is logged; a panic
/// is caught at the dispatch boundary. Either way other subscribers and the
/// publisher are unaffected.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

// ============================================================================
// SECTION: Bus Contract
// ============================================================================

/// Publish/subscribe surface shared by the in-memory and durable buses.
pub trait EventBus: Send + Sync {
    /// Publishes an event, blocking while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] when the bus has been closed.
    fn publish(&self, event: Event) -> Result<(), BusError>;

    /// Registers a handler with AND-composed filters, returning its
    /// subscription identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] when the bus has been closed.
    fn subscribe(
        &self,
        handler: EventHandler,
        filters: Vec<EventFilter>,
    ) -> Result<SubscriptionId, BusError>;

    /// Removes a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownSubscription`] when no such subscription
    /// exists (including after a previous unsubscribe).
    fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), BusError>;

    /// Closes the bus: drains queued events, joins the dispatch threads,
    /// and clears subscriptions. Idempotent.
    fn close(&self);
}
