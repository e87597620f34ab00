// crates/modelhost-core/src/bus/memory.rs
// ============================================================================
// Module: In-Memory Event Bus
// Description: Bounded-channel bus with a router and sharded worker pool.
// Purpose: Fan events out to filtered subscribers with backpressure.
// Dependencies: crate::bus, crate::core, tracing
// ============================================================================

//! ## Overview
//! `publish` enqueues onto a bounded channel and blocks while it is full. A
//! router thread drains the channel in publish order and hands each event to
//! one of the shard workers; every subscription is pinned to a shard by its
//! identifier, so one subscriber always sees events in the router's order
//! while a slow handler stalls only its own shard. Shutdown is
//! close-then-join: the enqueue side is dropped, the router drains, the
//! workers drain, and all threads are joined before `close` returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::hash::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::SyncSender;
use std::thread::JoinHandle;

use crate::bus::BusError;
use crate::bus::EventBus;
use crate::bus::EventHandler;
use crate::bus::filter::EventFilter;
use crate::bus::filter::all_match;
use crate::core::SubscriptionId;
use crate::core::event::Event;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bounded-channel capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 1_000;

/// Default dispatcher pool size.
pub const DEFAULT_WORKER_COUNT: usize = 4;

// ============================================================================
// SECTION: Subscriptions
// ============================================================================

/// One registered subscription.
struct Subscription {
    /// Subscriber callback.
    handler: EventHandler,
    /// AND-composed filters; empty accepts everything.
    filters: Vec<EventFilter>,
    /// Worker shard the subscription is pinned to.
    shard: usize,
}

/// Shared subscription table.
type SubscriptionTable = Arc<RwLock<BTreeMap<SubscriptionId, Subscription>>>;

/// Work item handed from the router to a shard worker.
type DispatchJob = (Arc<Event>, Vec<EventHandler>);

// ============================================================================
// SECTION: Bus
// ============================================================================

/// Bounded in-memory event bus.
///
/// # Invariants
/// - Events accepted before `close` are delivered to every matching
///   subscription at most once, in each publisher's relative order.
/// - A handler error or panic never affects other subscribers or the
///   publisher.
pub struct InMemoryEventBus {
    /// Subscription table shared with the router.
    subscriptions: SubscriptionTable,
    /// Enqueue side of the bounded channel; taken on close.
    sender: Mutex<Option<SyncSender<Event>>>,
    /// Set once `close` begins; publishes observe it before enqueueing.
    closed: AtomicBool,
    /// Router and worker threads; joined on close.
    threads: Mutex<Vec<JoinHandle<()>>>,
    /// Number of shard workers.
    worker_count: usize,
}

impl InMemoryEventBus {
    /// Creates a bus with the given buffer capacity and worker pool size.
    ///
    /// Zero values are clamped to one.
    #[must_use]
    pub fn new(buffer_size: usize, worker_count: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        let worker_count = worker_count.max(1);

        let (sender, receiver) = mpsc::sync_channel::<Event>(buffer_size);
        let subscriptions: SubscriptionTable = Arc::new(RwLock::new(BTreeMap::new()));

        let mut threads = Vec::with_capacity(worker_count + 1);
        let mut shard_senders: Vec<SyncSender<DispatchJob>> = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            // Shard queues are bounded as well; a stalled handler backs up
            // through the router into `publish`.
            let (shard_sender, shard_receiver) = mpsc::sync_channel::<DispatchJob>(buffer_size);
            shard_senders.push(shard_sender);
            threads.push(std::thread::spawn(move || worker_loop(&shard_receiver)));
        }

        let router_table = Arc::clone(&subscriptions);
        threads.push(std::thread::spawn(move || {
            router_loop(&receiver, &router_table, &shard_senders);
        }));

        Self {
            subscriptions,
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            threads: Mutex::new(threads),
            worker_count,
        }
    }

    /// Returns the configured worker pool size.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_WORKER_COUNT)
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: Event) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        // Clone the sender out of the lock so a blocking send cannot hold
        // the mutex against `close`.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .cloned()
            .ok_or(BusError::Closed)?;
        sender.send(event).map_err(|_| BusError::Closed)
    }

    fn subscribe(
        &self,
        handler: EventHandler,
        filters: Vec<EventFilter>,
    ) -> Result<SubscriptionId, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let id = SubscriptionId::generate();
        let shard = shard_of(&id, self.worker_count);
        let mut table = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        table.insert(id.clone(), Subscription {
            handler,
            filters,
            shard,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), BusError> {
        let mut table = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        if table.remove(id).is_none() {
            return Err(BusError::UnknownSubscription(id.clone()));
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the enqueue side disconnects the router once transient
        // publish clones are gone; the router then disconnects the shards.
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());
        let threads = mem::take(&mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in threads {
            let _ = handle.join();
        }
        self.subscriptions.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Drop for InMemoryEventBus {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// SECTION: Dispatch Threads
// ============================================================================

/// Router: drains the bounded channel in publish order and fans each event
/// out to the shards with at least one matching subscription.
fn router_loop(
    receiver: &Receiver<Event>,
    subscriptions: &SubscriptionTable,
    shard_senders: &[SyncSender<DispatchJob>],
) {
    while let Ok(event) = receiver.recv() {
        let event = Arc::new(event);
        let mut per_shard: Vec<Vec<EventHandler>> = vec![Vec::new(); shard_senders.len()];
        {
            let table = subscriptions.read().unwrap_or_else(PoisonError::into_inner);
            for subscription in table.values() {
                if all_match(&subscription.filters, &event) {
                    per_shard[subscription.shard].push(Arc::clone(&subscription.handler));
                }
            }
        }
        for (shard, handlers) in per_shard.into_iter().enumerate() {
            if handlers.is_empty() {
                continue;
            }
            // A send failure means the worker is gone during shutdown; the
            // event is dropped, which close-before-publish already excludes.
            let _ = shard_senders[shard].send((Arc::clone(&event), handlers));
        }
    }
}

/// Shard worker: invokes each handler for its queued jobs in FIFO order.
fn worker_loop(receiver: &Receiver<DispatchJob>) {
    while let Ok((event, handlers)) = receiver.recv() {
        for handler in handlers {
            invoke_handler(&event, &handler);
        }
    }
}

/// Invokes one handler, containing errors and panics at the bus boundary.
fn invoke_handler(event: &Event, handler: &EventHandler) {
    match catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::warn!(event_type = %event.event_type, error = %err, "event handler failed");
        }
        Err(_) => {
            tracing::error!(event_type = %event.event_type, "event handler panicked");
        }
    }
}

/// Pins a subscription identifier to a worker shard.
fn shard_of(id: &SubscriptionId, worker_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    id.as_str().hash(&mut hasher);
    let shards = u64::try_from(worker_count).unwrap_or(1).max(1);
    usize::try_from(hasher.finish() % shards).unwrap_or(0)
}
