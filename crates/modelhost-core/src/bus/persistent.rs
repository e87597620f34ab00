// crates/modelhost-core/src/bus/persistent.rs
// ============================================================================
// Module: Persistent Event Bus
// Description: Durable bus layering an event store over the in-memory bus.
// Purpose: Persist every published event for replay by correlation id.
// Dependencies: crate::bus, crate::core, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! The persistent bus delivers through the wrapped in-memory bus and buffers
//! a durable copy of every accepted event. A flusher thread writes the
//! buffer to the [`EventStore`] in one transaction per batch, every
//! `flush_period` or on an explicit [`PersistentEventBus::flush`]. Retention
//! is enforced lazily after each flush. [`PersistentEventBus::replay`] reads
//! all events for a correlation id in timestamp order and invokes the
//! handler synchronously.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::mem;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::bus::BusError;
use crate::bus::EventBus;
use crate::bus::EventHandler;
use crate::bus::HandlerError;
use crate::bus::filter::EventFilter;
use crate::bus::memory::InMemoryEventBus;
use crate::core::CorrelationId;
use crate::core::SubscriptionId;
use crate::core::Timestamp;
use crate::core::event::Event;
use crate::interfaces::EventQuery;
use crate::interfaces::EventStore;
use crate::interfaces::EventStoreError;
use crate::interfaces::RetentionPolicy;
use crate::interfaces::StoredEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default batch flush cadence.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// SECTION: Persistent Bus
// ============================================================================

/// Durable event bus.
///
/// # Invariants
/// - Every event accepted by `publish` is eventually written to the store
///   (on the next flush, at the latest on close).
/// - Batches are written in one transaction each.
pub struct PersistentEventBus {
    /// Delivery bus.
    inner: InMemoryEventBus,
    /// Durable store.
    store: Arc<dyn EventStore>,
    /// Rows awaiting the next flush.
    pending: Arc<Mutex<Vec<StoredEvent>>>,
    /// Retention policy applied after flushes.
    retention: RetentionPolicy,
    /// Shutdown signal for the flusher; taken on close.
    shutdown: Mutex<Option<Sender<()>>>,
    /// Flusher thread; joined on close.
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl PersistentEventBus {
    /// Creates a persistent bus over the given delivery bus and store.
    #[must_use]
    pub fn new(
        inner: InMemoryEventBus,
        store: Arc<dyn EventStore>,
        flush_period: Duration,
        retention: RetentionPolicy,
    ) -> Self {
        let pending: Arc<Mutex<Vec<StoredEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_sender, shutdown_receiver) = mpsc::channel::<()>();

        let flusher_store = Arc::clone(&store);
        let flusher_pending = Arc::clone(&pending);
        let flusher = std::thread::spawn(move || {
            loop {
                let stop = !matches!(
                    shutdown_receiver.recv_timeout(flush_period),
                    Err(RecvTimeoutError::Timeout)
                );
                if let Err(err) = flush_pending(&flusher_store, &flusher_pending, retention) {
                    tracing::warn!(error = %err, "event flush failed");
                }
                if stop {
                    break;
                }
            }
        });

        Self {
            inner,
            store,
            pending,
            retention,
            shutdown: Mutex::new(Some(shutdown_sender)),
            flusher: Mutex::new(Some(flusher)),
        }
    }

    /// Returns the underlying event store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.store)
    }

    /// Flushes buffered events to the store immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Store`] when the write fails; the batch is
    /// requeued for the next flush in that case.
    pub fn flush(&self) -> Result<(), BusError> {
        flush_pending(&self.store, &self.pending, self.retention).map_err(BusError::from)
    }

    /// Replays all stored events for a correlation id in timestamp order,
    /// invoking the handler synchronously for each.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Store`] when the store query fails and
    /// [`BusError::Handler`] when the handler refuses an event; replay stops
    /// at the first handler failure.
    pub fn replay(
        &self,
        correlation_id: &CorrelationId,
        handler: &dyn Fn(&StoredEvent) -> Result<(), HandlerError>,
    ) -> Result<usize, BusError> {
        self.flush()?;
        let rows = self.store.query(&EventQuery::by_correlation(correlation_id.clone()))?;
        let mut delivered = 0_usize;
        for row in &rows {
            handler(row).map_err(|err| BusError::Handler(err.to_string()))?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl EventBus for PersistentEventBus {
    fn publish(&self, event: Event) -> Result<(), BusError> {
        self.inner.publish(event.clone())?;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredEvent::wrap(event));
        Ok(())
    }

    fn subscribe(
        &self,
        handler: EventHandler,
        filters: Vec<EventFilter>,
    ) -> Result<SubscriptionId, BusError> {
        self.inner.subscribe(handler, filters)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), BusError> {
        self.inner.unsubscribe(id)
    }

    fn close(&self) {
        // Stop the flusher first; its final pass persists the tail buffer.
        drop(self.shutdown.lock().unwrap_or_else(PoisonError::into_inner).take());
        if let Some(handle) = self.flusher.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = handle.join();
        }
        self.inner.close();
    }
}

impl Drop for PersistentEventBus {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// SECTION: Flush
// ============================================================================

/// Writes the buffered rows in one batch and applies retention.
///
/// On write failure the batch is put back at the front of the buffer so no
/// accepted event is lost before close.
fn flush_pending(
    store: &Arc<dyn EventStore>,
    pending: &Arc<Mutex<Vec<StoredEvent>>>,
    retention: RetentionPolicy,
) -> Result<(), EventStoreError> {
    let batch = mem::take(&mut *pending.lock().unwrap_or_else(PoisonError::into_inner));
    if !batch.is_empty()
        && let Err(err) = store.save_batch(&batch)
    {
        let mut buffer = pending.lock().unwrap_or_else(PoisonError::into_inner);
        let tail = mem::take(&mut *buffer);
        *buffer = batch;
        buffer.extend(tail);
        return Err(err);
    }
    if !retention.is_unbounded() {
        store.prune(&retention, Timestamp::now())?;
    }
    Ok(())
}
