// crates/modelhost-core/tests/resource_units.rs
// ============================================================================
// Module: Resource Unit Tests
// Description: Slot allocation, release, patching, and admission via gateway.
// Purpose: Validate the resource.* unit set and slot manager contracts.
// Dependencies: modelhost-core, serde_json
// ============================================================================

//! ## Overview
//! Drives the resource domain through the gateway: allocation round trips,
//! validation walls, refused admission, patch semantics with preemption
//! events, probe pass-throughs, and the concurrent-allocation contract.

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
use common::FixedProbe;
use common::GIB;
use common::ReservingProbe;
use modelhost_core::Context;
use modelhost_core::ErrorCode;
use modelhost_core::Request;
use modelhost_core::bus::EventFilter;
use modelhost_core::interfaces::ResourceBudgetProbe;
use modelhost_core::runtime::CoreServices;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a core with the given probe injected.
fn core_with(probe: Arc<dyn ResourceBudgetProbe>) -> CoreServices {
    CoreServices::builder().budget_probe(probe).build().expect("core builds")
}

/// A valid one-gibibyte allocation request body.
fn gib_allocation(name: &str) -> Value {
    json!({
        "name": name,
        "type": "inference_native",
        "memory_bytes": 1_073_741_824_u64,
        "priority": 5
    })
}

/// Allocates through the gateway, returning the minted slot id.
fn allocate(core: &CoreServices, name: &str) -> String {
    let response = core.handle(
        &Context::background(),
        Request::command("resource.allocate", gib_allocation(name)),
    );
    assert!(response.is_ok(), "allocation succeeds: {:?}", response.error());
    response.data().expect("data")["slot_id"].as_str().expect("slot id").to_string()
}

// ============================================================================
// SECTION: Allocation Scenarios
// ============================================================================

#[test]
fn allocate_mints_slot_and_publishes_exactly_one_event() {
    let core = core_with(Arc::new(FixedProbe::admitting()));
    let collector = EventCollector::new();
    core.bus()
        .subscribe(collector.handler(), vec![EventFilter::by_type("resource.allocated")])
        .expect("subscribe");

    let response = core.handle(
        &Context::background(),
        Request::command("resource.allocate", gib_allocation("test")),
    );
    assert!(response.is_ok());
    let slot_id = response.data().expect("data")["slot_id"].as_str().expect("slot id").to_string();
    assert!(slot_id.starts_with("slot-"), "slot ids carry the slot- prefix");

    assert!(collector.wait_for(1, Duration::from_secs(2)));
    core.shutdown();
    let events = collector.events();
    assert_eq!(events.len(), 1, "exactly one resource.allocated event");
    assert_eq!(events[0].payload["slot_id"], json!(slot_id));
    assert_eq!(events[0].payload["memory"], json!(1_073_741_824_u64));
}

#[test]
fn allocate_release_round_trip() {
    let core = core_with(Arc::new(FixedProbe::admitting()));
    let ctx = Context::background();
    let slot_id = allocate(&core, "round-trip");

    let listed = core
        .handle(&ctx, Request::query("resource.allocations", json!({ "slot_id": &slot_id })))
        .into_result()
        .expect("allocations");
    assert_eq!(listed["count"], json!(1));
    let slot = &listed["slots"][0];
    assert_eq!(slot["name"], json!("round-trip"));
    assert_eq!(slot["type"], json!("inference_native"));
    assert_eq!(slot["memory_limit"], json!(1_073_741_824_u64));
    assert_eq!(slot["status"], json!("active"));

    let released = core.handle(
        &ctx,
        Request::command("resource.release", json!({ "slot_id": &slot_id })),
    );
    assert!(released.is_ok());

    let after = core
        .handle(&ctx, Request::query("resource.allocations", json!({})))
        .into_result()
        .expect("allocations");
    assert_eq!(after["count"], json!(0));

    let again = core.handle(
        &ctx,
        Request::command("resource.release", json!({ "slot_id": &slot_id })),
    );
    assert_eq!(again.error().expect("error").code, ErrorCode::SlotNotFound);
    core.shutdown();
}

#[test]
fn refused_admission_surfaces_reason_and_leaves_no_trace() {
    let core = core_with(Arc::new(FixedProbe::refusing("gpu memory full")));
    let collector = EventCollector::new();
    core.bus()
        .subscribe(collector.handler(), vec![EventFilter::by_type("resource.allocated")])
        .expect("subscribe");

    let response = core.handle(
        &Context::background(),
        Request::command("resource.allocate", gib_allocation("denied")),
    );
    let error = response.error().expect("error body");
    assert_eq!(error.code, ErrorCode::InsufficientResources);
    assert!(error.message.contains("gpu memory full"));

    let listed = core
        .handle(&Context::background(), Request::query("resource.allocations", json!({})))
        .into_result()
        .expect("allocations");
    assert_eq!(listed["count"], json!(0), "no slot appears in the store");

    core.shutdown();
    assert_eq!(collector.count(), 0, "no resource.allocated event emitted");
}

// ============================================================================
// SECTION: Validation Walls
// ============================================================================

#[test]
fn allocate_validation_rejects_bad_inputs() {
    let core = core_with(Arc::new(FixedProbe::admitting()));
    let ctx = Context::background();
    let cases = [
        json!({ "name": "", "type": "inference_native", "memory_bytes": 1 }),
        json!({ "name": "x", "type": "inference_native", "memory_bytes": 0 }),
        json!({ "name": "x", "type": "inference_native", "memory_bytes": 1, "priority": 101 }),
        json!({ "name": "x", "type": "inference_native", "memory_bytes": 1, "gpu_fraction": 1.5 }),
        json!({ "name": "x", "type": "mainframe", "memory_bytes": 1 }),
    ];
    for input in cases {
        let response = core.handle(&ctx, Request::command("resource.allocate", input.clone()));
        assert_eq!(
            response.error().expect("error body").code,
            ErrorCode::InvalidInput,
            "rejected input: {input}"
        );
    }
    core.shutdown();
}

// ============================================================================
// SECTION: Patch Semantics
// ============================================================================

#[test]
fn update_slot_patches_fields_and_emits_preemption() {
    let core = core_with(Arc::new(FixedProbe::admitting()));
    let collector = EventCollector::new();
    core.bus()
        .subscribe(collector.handler(), vec![EventFilter::by_type("resource.preemption")])
        .expect("subscribe");
    let ctx = Context::background();
    let slot_id = allocate(&core, "patchable");

    let patched = core
        .handle(
            &ctx,
            Request::command("resource.update_slot", json!({
                "slot_id": &slot_id,
                "memory_limit": 2_147_483_648_u64,
                "status": "idle"
            })),
        )
        .into_result()
        .expect("patched");
    assert_eq!(patched["memory_limit"], json!(2_147_483_648_u64));
    assert_eq!(patched["status"], json!("idle"));

    let preempted = core
        .handle(
            &ctx,
            Request::command("resource.update_slot", json!({
                "slot_id": &slot_id,
                "status": "preempted",
                "reason": "higher priority workload"
            })),
        )
        .into_result()
        .expect("preempted");
    assert_eq!(preempted["status"], json!("preempted"));

    assert!(collector.wait_for(1, Duration::from_secs(2)));
    core.shutdown();
    let events = collector.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["slot_id"], json!(slot_id));
    assert_eq!(events[0].payload["reason"], json!("higher priority workload"));
}

#[test]
fn update_slot_rejects_unknown_slots_and_bad_status() {
    let core = core_with(Arc::new(FixedProbe::admitting()));
    let ctx = Context::background();

    let missing = core.handle(
        &ctx,
        Request::command("resource.update_slot", json!({ "slot_id": "slot-absent" })),
    );
    assert_eq!(missing.error().expect("error").code, ErrorCode::SlotNotFound);

    let slot_id = allocate(&core, "status-check");
    let bad_status = core.handle(
        &ctx,
        Request::command("resource.update_slot", json!({
            "slot_id": &slot_id,
            "status": "hibernating"
        })),
    );
    assert_eq!(bad_status.error().expect("error").code, ErrorCode::InvalidInput);
    core.shutdown();
}

// ============================================================================
// SECTION: Queries and Providers
// ============================================================================

#[test]
fn status_and_budget_reflect_probe_figures() {
    let core = core_with(Arc::new(FixedProbe::admitting()));
    let ctx = Context::background();
    allocate(&core, "snapshot");

    let status = core
        .handle(&ctx, Request::query("resource.status", json!({})))
        .into_result()
        .expect("status");
    assert_eq!(status["memory"]["total"], json!(16 * GIB));
    assert_eq!(status["pressure"], json!("low"));
    assert_eq!(status["slots"].as_array().expect("slots").len(), 1);

    let budget = core
        .handle(&ctx, Request::query("resource.budget", json!({})))
        .into_result()
        .expect("budget");
    assert_eq!(budget["total"], json!(16 * GIB));
    assert!(budget["pools"]["memory"].is_object());
    core.shutdown();
}

#[test]
fn can_allocate_passes_the_oracle_verdict_through() {
    let core = core_with(Arc::new(FixedProbe::refusing("budget exhausted")));
    let verdict = core
        .handle(
            &Context::background(),
            Request::query("resource.can_allocate", json!({ "memory_bytes": 1024 })),
        )
        .into_result()
        .expect("verdict");
    assert_eq!(verdict["can_allocate"], json!(false));
    assert_eq!(verdict["reason"], json!("budget exhausted"));
    core.shutdown();
}

#[test]
fn missing_probe_surfaces_provider_not_set() {
    let core = CoreServices::builder().build().expect("core builds");
    let response = core.handle(
        &Context::background(),
        Request::command("resource.allocate", gib_allocation("orphan")),
    );
    assert_eq!(response.error().expect("error").code, ErrorCode::ProviderNotSet);
    core.shutdown();
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn concurrent_allocations_cannot_jointly_exceed_budget() {
    // One gibibyte of budget; two 700 MiB requests racing.
    let core = Arc::new(core_with(Arc::new(ReservingProbe::new(GIB))));
    let request = json!({
        "name": "racer",
        "type": "inference_native",
        "memory_bytes": 700 * 1024 * 1024_u64
    });

    let mut handles = Vec::new();
    for _ in 0..2 {
        let core = Arc::clone(&core);
        let body = request.clone();
        handles.push(std::thread::spawn(move || {
            core.handle(&Context::background(), Request::command("resource.allocate", body))
        }));
    }
    let outcomes: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread").is_ok())
        .collect();

    let successes = outcomes.iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one of the racing allocations is admitted");
    core.shutdown();
}
