// crates/modelhost-providers/tests/budget_probe.rs
// ============================================================================
// Module: Budget Probe Tests
// Description: Ledger arithmetic, admission, procfs parsing, bus tracking.
// Purpose: Validate the built-in probes against the core admission seam.
// Dependencies: modelhost-core, modelhost-providers, tempfile
// ============================================================================

//! ## Overview
//! Validates the static probe's ledger and admission behavior, the procfs
//! probe against a fixture file, and the bus-driven reservation tracker
//! wired into a full core.

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

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use modelhost_core::Context;
use modelhost_core::ErrorCode;
use modelhost_core::PressureLevel;
use modelhost_core::Request;
use modelhost_core::interfaces::ResourceBudgetProbe;
use modelhost_core::runtime::CoreServices;
use modelhost_providers::ProcfsBudgetProbe;
use modelhost_providers::ProcfsBudgetProbeConfig;
use modelhost_providers::StaticBudgetProbe;
use modelhost_providers::StaticBudgetProbeConfig;
use modelhost_providers::track_reservations;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Gibibyte helper.
const GIB: u64 = 1024 * 1024 * 1024;

/// Builds a static probe over the given memory total.
fn probe(memory_total: u64) -> StaticBudgetProbe {
    StaticBudgetProbe::new(StaticBudgetProbeConfig {
        memory_total,
        storage_total: 100 * GIB,
        storage_used: 10 * GIB,
    })
}

// ============================================================================
// SECTION: Static Probe
// ============================================================================

#[test]
fn ledger_drives_admission_and_figures() {
    let probe = probe(4 * GIB);
    let ctx = Context::background();

    let verdict = probe.can_allocate(&ctx, 3 * GIB, 5).expect("verdict");
    assert!(verdict.can_allocate);

    probe.reserve(3 * GIB);
    let refused = probe.can_allocate(&ctx, 2 * GIB, 5).expect("verdict");
    assert!(!refused.can_allocate);
    assert!(refused.reason.expect("reason").contains("exceed available"));

    let status = probe.get_status(&ctx).expect("status");
    assert_eq!(status.memory.used, 3 * GIB);
    assert_eq!(status.memory.available, GIB);
    assert_eq!(status.pressure, PressureLevel::High);

    probe.release(3 * GIB);
    assert_eq!(probe.reserved(), 0);
    assert!(probe.can_allocate(&ctx, 2 * GIB, 5).expect("verdict").can_allocate);
}

#[test]
fn try_reserve_is_atomic_check_and_commit() {
    let probe = probe(GIB);
    assert!(probe.try_reserve(600 * 1024 * 1024).can_allocate);
    let second = probe.try_reserve(600 * 1024 * 1024);
    assert!(!second.can_allocate);
    assert_eq!(probe.reserved(), 600 * 1024 * 1024);
}

#[test]
fn budget_report_carries_memory_and_storage_pools() {
    let probe = probe(8 * GIB);
    probe.reserve(2 * GIB);
    let report = probe.get_budget(&Context::background()).expect("budget");
    assert_eq!(report.total, 8 * GIB);
    assert_eq!(report.reserved, 2 * GIB);
    assert_eq!(report.pools["memory"].available, 6 * GIB);
    assert_eq!(report.pools["storage"].total, 100 * GIB);
}

// ============================================================================
// SECTION: Procfs Probe
// ============================================================================

#[test]
fn procfs_probe_reads_a_meminfo_fixture() {
    let mut fixture = tempfile::NamedTempFile::new().expect("fixture");
    fixture
        .write_all(
            b"MemTotal:       16384000 kB\nMemFree: 1000 kB\nMemAvailable:    8192000 kB\n",
        )
        .expect("write fixture");
    let probe = ProcfsBudgetProbe::new(ProcfsBudgetProbeConfig {
        meminfo_path: fixture.path().to_path_buf(),
        storage_total: 0,
        storage_used: 0,
    });
    let ctx = Context::background();

    let status = probe.get_status(&ctx).expect("status");
    assert_eq!(status.memory.total, 16_384_000 * 1024);
    assert_eq!(status.memory.available, 8_192_000 * 1024);
    assert_eq!(status.pressure, PressureLevel::Medium);

    let verdict = probe.can_allocate(&ctx, status.memory.available, 5).expect("verdict");
    assert!(verdict.can_allocate);
    let refused = probe
        .can_allocate(&ctx, status.memory.available + 1, 5)
        .expect("verdict");
    assert!(!refused.can_allocate);
}

#[test]
fn procfs_probe_fails_closed_on_missing_file() {
    let probe = ProcfsBudgetProbe::new(ProcfsBudgetProbeConfig {
        meminfo_path: "/nonexistent/meminfo".into(),
        storage_total: 0,
        storage_used: 0,
    });
    assert!(probe.get_status(&Context::background()).is_err());
}

// ============================================================================
// SECTION: Bus-Tracked Reservations
// ============================================================================

#[test]
fn tracked_ledger_follows_allocate_and_release() {
    let probe = Arc::new(probe(2 * GIB));
    let core = CoreServices::builder()
        .budget_probe(Arc::clone(&probe) as Arc<dyn ResourceBudgetProbe>)
        .build()
        .expect("core builds");
    track_reservations(&probe, &core.bus()).expect("tracker subscribes");
    let ctx = Context::background();

    // First allocation fits; the tracker commits it to the ledger.
    let first = core.handle(
        &ctx,
        Request::command("resource.allocate", json!({
            "name": "tracked",
            "type": "inference_native",
            "memory_bytes": 2 * GIB
        })),
    );
    assert!(first.is_ok());
    let slot_id = first.data().expect("data")["slot_id"].as_str().expect("slot id").to_string();

    let deadline = Instant::now() + Duration::from_secs(5);
    while probe.reserved() < 2 * GIB {
        assert!(Instant::now() < deadline, "tracker observes the allocation");
        std::thread::sleep(Duration::from_millis(5));
    }

    // With the budget exhausted a second allocation is refused.
    let second = core.handle(
        &ctx,
        Request::command("resource.allocate", json!({
            "name": "tracked-2",
            "type": "inference_native",
            "memory_bytes": GIB
        })),
    );
    assert_eq!(second.error().expect("error").code, ErrorCode::InsufficientResources);

    // Releasing returns the budget.
    let released = core.handle(
        &ctx,
        Request::command("resource.release", json!({ "slot_id": slot_id })),
    );
    assert!(released.is_ok());
    let deadline = Instant::now() + Duration::from_secs(5);
    while probe.reserved() > 0 {
        assert!(Instant::now() < deadline, "tracker observes the release");
        std::thread::sleep(Duration::from_millis(5));
    }
    core.shutdown();
}
