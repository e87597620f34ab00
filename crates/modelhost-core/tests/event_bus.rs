// crates/modelhost-core/tests/event_bus.rs
// ============================================================================
// Module: Event Bus Tests
// Description: Delivery, filtering, ordering, backpressure, and shutdown.
// Purpose: Validate the in-memory bus contract end to end.
// Dependencies: modelhost-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises the in-memory bus: filtered fan-out, unsubscribe semantics,
//! closed-bus errors, per-publisher ordering, backpressure under a slow
//! subscriber, and containment of handler errors and panics.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::EventCollector;
use modelhost_core::Event;
use modelhost_core::SubscriptionId;
use modelhost_core::bus::BusError;
use modelhost_core::bus::EventBus;
use modelhost_core::bus::EventFilter;
use modelhost_core::bus::InMemoryEventBus;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an event with the given type and integer payload.
fn event(event_type: &str, seq: i64) -> Event {
    Event::new(event_type, json!({ "seq": seq }), None)
}

// ============================================================================
// SECTION: Delivery and Filters
// ============================================================================

#[test]
fn subscriber_receives_published_event() {
    let bus = InMemoryEventBus::default();
    let collector = EventCollector::new();
    bus.subscribe(collector.handler(), Vec::new()).expect("subscribe");
    bus.publish(event("resource.allocated", 1)).expect("publish");
    assert!(collector.wait_for(1, Duration::from_secs(2)));
    let delivered = collector.events();
    assert_eq!(delivered[0].event_type, "resource.allocated");
    assert_eq!(delivered[0].domain, "resource");
    assert_eq!(delivered[0].payload, json!({ "seq": 1 }));
}

#[test]
fn filters_compose_by_and() {
    let bus = InMemoryEventBus::default();
    let by_type = EventCollector::new();
    let by_domain = EventCollector::new();
    let both = EventCollector::new();
    bus.subscribe(by_type.handler(), vec![EventFilter::by_type("resource.allocated")])
        .expect("subscribe");
    bus.subscribe(by_domain.handler(), vec![EventFilter::by_domain("pipeline")])
        .expect("subscribe");
    bus.subscribe(
        both.handler(),
        vec![EventFilter::by_domain("resource"), EventFilter::by_type("resource.released")],
    )
    .expect("subscribe");

    bus.publish(event("resource.allocated", 1)).expect("publish");
    bus.publish(event("resource.released", 2)).expect("publish");
    bus.publish(event("pipeline.run_started", 3)).expect("publish");
    bus.close();

    assert_eq!(by_type.types(), vec!["resource.allocated"]);
    assert_eq!(by_domain.types(), vec!["pipeline.run_started"]);
    assert_eq!(both.types(), vec!["resource.released"]);
}

#[test]
fn one_of_filters_match_sets() {
    let bus = InMemoryEventBus::default();
    let types = EventCollector::new();
    let domains = EventCollector::new();
    bus.subscribe(
        types.handler(),
        vec![EventFilter::one_of_types(["a.x", "b.y"])],
    )
    .expect("subscribe");
    bus.subscribe(
        domains.handler(),
        vec![EventFilter::one_of_domains(["a", "c"])],
    )
    .expect("subscribe");

    bus.publish(event("a.x", 1)).expect("publish");
    bus.publish(event("b.y", 2)).expect("publish");
    bus.publish(event("c.z", 3)).expect("publish");
    bus.close();

    assert_eq!(types.count(), 2);
    assert_eq!(domains.types(), vec!["a.x", "c.z"]);
}

// ============================================================================
// SECTION: Subscription Lifecycle
// ============================================================================

#[test]
fn unsubscribed_handler_sees_no_further_events() {
    let bus = InMemoryEventBus::default();
    let collector = EventCollector::new();
    let id = bus.subscribe(collector.handler(), Vec::new()).expect("subscribe");

    bus.publish(event("demo.first", 1)).expect("publish");
    assert!(collector.wait_for(1, Duration::from_secs(2)));

    bus.unsubscribe(&id).expect("unsubscribe");
    bus.publish(event("demo.second", 2)).expect("publish");
    bus.close();

    assert_eq!(collector.count(), 1, "handler observed exactly one event");
}

#[test]
fn duplicate_unsubscribe_is_an_error() {
    let bus = InMemoryEventBus::default();
    let collector = EventCollector::new();
    let id = bus.subscribe(collector.handler(), Vec::new()).expect("subscribe");
    bus.unsubscribe(&id).expect("first unsubscribe");
    let second = bus.unsubscribe(&id);
    assert!(matches!(second, Err(BusError::UnknownSubscription(_))));
}

#[test]
fn unknown_subscription_id_is_an_error() {
    let bus = InMemoryEventBus::default();
    let missing = bus.unsubscribe(&SubscriptionId::new("nope"));
    assert!(matches!(missing, Err(BusError::UnknownSubscription(_))));
}

// ============================================================================
// SECTION: Shutdown
// ============================================================================

#[test]
fn publish_on_closed_bus_errors() {
    let bus = InMemoryEventBus::default();
    bus.close();
    let result = bus.publish(event("demo.late", 1));
    assert!(matches!(result, Err(BusError::Closed)));
}

#[test]
fn subscribe_on_closed_bus_errors() {
    let bus = InMemoryEventBus::default();
    bus.close();
    let collector = EventCollector::new();
    let result = bus.subscribe(collector.handler(), Vec::new());
    assert!(matches!(result, Err(BusError::Closed)));
}

#[test]
fn close_is_idempotent_and_drains() {
    let bus = InMemoryEventBus::default();
    let collector = EventCollector::new();
    bus.subscribe(collector.handler(), Vec::new()).expect("subscribe");
    for seq in 0..10 {
        bus.publish(event("demo.drain", seq)).expect("publish");
    }
    bus.close();
    bus.close();
    assert_eq!(collector.count(), 10, "all pre-close events delivered");
    assert_eq!(bus.subscription_count(), 0, "subscriptions cleared");
}

// ============================================================================
// SECTION: Ordering and Backpressure
// ============================================================================

#[test]
fn per_publisher_order_is_preserved() {
    let bus = InMemoryEventBus::new(16, 4);
    let collector = EventCollector::new();
    bus.subscribe(collector.handler(), Vec::new()).expect("subscribe");
    for seq in 0..50 {
        bus.publish(event("order.seq", seq)).expect("publish");
    }
    bus.close();
    let sequence: Vec<i64> = collector
        .events()
        .iter()
        .map(|delivered| delivered.payload["seq"].as_i64().expect("seq"))
        .collect();
    let expected: Vec<i64> = (0..50).collect();
    assert_eq!(sequence, expected, "delivery preserves publish order");
}

#[test]
fn slow_subscriber_blocks_but_never_drops() {
    // Buffer of five, one subscriber sleeping 50 ms per event, twenty events.
    let bus = InMemoryEventBus::new(5, 2);
    let collector = EventCollector::new();
    let slow = {
        let inner = collector.clone();
        let handler = inner.handler();
        Arc::new(move |delivered: &Event| {
            std::thread::sleep(Duration::from_millis(50));
            handler(delivered)
        }) as modelhost_core::bus::EventHandler
    };
    bus.subscribe(slow, Vec::new()).expect("subscribe");
    for seq in 0..20 {
        bus.publish(event("slow.seq", seq)).expect("publish never fails while open");
    }
    assert!(collector.wait_for(20, Duration::from_secs(10)), "all twenty delivered");
    bus.close();
    assert_eq!(collector.count(), 20);
}

// ============================================================================
// SECTION: Handler Containment
// ============================================================================

#[test]
fn panicking_handler_does_not_poison_other_subscribers() {
    let bus = InMemoryEventBus::new(16, 1);
    let healthy = EventCollector::new();
    let panicking: modelhost_core::bus::EventHandler =
        Arc::new(|_event: &Event| panic!("subscriber bug"));
    bus.subscribe(panicking, Vec::new()).expect("subscribe panicking");
    bus.subscribe(healthy.handler(), Vec::new()).expect("subscribe healthy");
    for seq in 0..3 {
        bus.publish(event("demo.contained", seq)).expect("publish");
    }
    bus.close();
    assert_eq!(healthy.count(), 3, "healthy subscriber unaffected");
}

#[test]
fn erroring_handler_does_not_stop_delivery() {
    let bus = InMemoryEventBus::new(16, 1);
    let healthy = EventCollector::new();
    let erroring: modelhost_core::bus::EventHandler =
        Arc::new(|_event: &Event| Err("handler refused".into()));
    bus.subscribe(erroring, Vec::new()).expect("subscribe erroring");
    bus.subscribe(healthy.handler(), Vec::new()).expect("subscribe healthy");
    for seq in 0..3 {
        bus.publish(event("demo.errors", seq)).expect("publish");
    }
    bus.close();
    assert_eq!(healthy.count(), 3);
}
