// crates/modelhost-core/tests/pipeline_flow.rs
// ============================================================================
// Module: Pipeline Flow Tests
// Description: DAG execution, validation, cancellation, and deletion.
// Purpose: Validate the pipeline.* unit set and the executor contract.
// Dependencies: modelhost-core, serde_json
// ============================================================================

//! ## Overview
//! Drives the pipeline domain through the gateway: validated creation,
//! dependency-ordered execution with recorded step results, cycle rejection,
//! failure fast-stop, the run-input namespace, cross-thread cancellation,
//! and forced deletion.

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
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use common::EchoUnit;
use common::EventCollector;
use common::FailingUnit;
use common::SleepUnit;
use common::StaticUnit;
use common::TracingUnit;
use modelhost_core::Context;
use modelhost_core::CoreError;
use modelhost_core::ErrorCode;
use modelhost_core::Request;
use modelhost_core::bus::EventFilter;
use modelhost_core::runtime::CoreServices;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a core with stub step units registered.
fn core_with_steps() -> (CoreServices, Arc<Mutex<Vec<String>>>) {
    let core = CoreServices::builder().build().expect("core builds");
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let registry = core.registry();
    registry
        .register_query(Arc::new(StaticUnit::new(
            "device.detect",
            json!({ "devices": ["cpu:0"] }),
        )))
        .expect("register device.detect");
    registry
        .register_query(Arc::new(TracingUnit::new("trace.mark", Arc::clone(&log))))
        .expect("register trace.mark");
    registry
        .register_query(Arc::new(EchoUnit::new("echo.input")))
        .expect("register echo.input");
    registry
        .register_command(Arc::new(FailingUnit::new(
            "chaos.fail",
            CoreError::internal("chaos", "boom"),
        )))
        .expect("register chaos.fail");
    registry
        .register_command(Arc::new(SleepUnit::new(
            "chaos.sleep",
            Duration::from_secs(10),
        )))
        .expect("register chaos.sleep");
    (core, log)
}

/// Creates a pipeline via the gateway, returning its identifier.
fn create_pipeline(core: &CoreServices, name: &str, steps: Value) -> String {
    let created = core
        .handle(
            &Context::background(),
            Request::command("pipeline.create", json!({ "name": name, "steps": steps })),
        )
        .into_result()
        .expect("pipeline created");
    created["id"].as_str().expect("pipeline id").to_string()
}

/// Runs a pipeline via the gateway with a generous deadline.
fn run_pipeline(core: &CoreServices, pipeline_id: &str, input: Value) -> Value {
    core.handle(
        &Context::background(),
        Request::command("pipeline.run", json!({ "pipeline_id": pipeline_id, "input": input }))
            .with_deadline_ms(60_000),
    )
    .into_result()
    .expect("run finished")
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn validate_accepts_a_two_step_chain() {
    let (core, _log) = core_with_steps();
    let report = core
        .handle(
            &Context::background(),
            Request::query("pipeline.validate", json!({
                "steps": [
                    { "id": "a", "type": "device.detect", "input": {} },
                    { "id": "b", "type": "model.list", "input": {}, "depends_on": ["a"] }
                ]
            })),
        )
        .into_result()
        .expect("report");
    assert_eq!(report["valid"], json!(true));
    assert_eq!(report["issues"], json!([]));
    core.shutdown();
}

#[test]
fn validate_names_a_cycle() {
    let (core, _log) = core_with_steps();
    let report = core
        .handle(
            &Context::background(),
            Request::query("pipeline.validate", json!({
                "steps": [
                    { "id": "x", "type": "device.detect", "input": {}, "depends_on": ["y"] },
                    { "id": "y", "type": "device.detect", "input": {}, "depends_on": ["x"] }
                ]
            })),
        )
        .into_result()
        .expect("report");
    assert_eq!(report["valid"], json!(false));
    let issues = report["issues"].as_array().expect("issues");
    assert!(
        issues.iter().any(|issue| {
            let text = issue.as_str().unwrap_or_default();
            text.contains("circular") || text.contains("cycle")
        }),
        "issues mention the cycle: {issues:?}"
    );
    core.shutdown();
}

#[test]
fn rejected_definitions_never_reach_the_store() {
    let (core, _log) = core_with_steps();
    let response = core.handle(
        &Context::background(),
        Request::command("pipeline.create", json!({
            "name": "broken",
            "steps": [
                { "id": "x", "type": "device.detect", "input": {}, "depends_on": ["x"] }
            ]
        })),
    );
    assert_eq!(response.error().expect("error").code, ErrorCode::InvalidInput);

    let listed = core
        .handle(&Context::background(), Request::query("pipeline.list", json!({})))
        .into_result()
        .expect("list");
    assert_eq!(listed["count"], json!(0));
    core.shutdown();
}

// ============================================================================
// SECTION: Execution
// ============================================================================

#[test]
fn two_step_chain_completes_in_dependency_order() {
    let (core, log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "p", json!([
        { "id": "a", "type": "trace.mark", "input": { "tag": "a" } },
        { "id": "b", "type": "trace.mark", "input": { "tag": "b" }, "depends_on": ["a"] }
    ]));

    let run = run_pipeline(&core, &pipeline_id, json!({}));
    assert_eq!(run["status"], json!("completed"));
    assert!(run["step_results"]["a"].is_object());
    assert!(run["step_results"]["b"].is_object());
    assert!(run["completed_at"].is_i64() || run["completed_at"].is_u64());
    assert_eq!(*log.lock().expect("log"), vec!["a".to_string(), "b".to_string()]);
    core.shutdown();
}

#[test]
fn builtin_units_serve_as_steps() {
    let (core, _log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "builtin", json!([
        { "id": "a", "type": "device.detect", "input": {} },
        { "id": "b", "type": "model.list", "input": {}, "depends_on": ["a"] }
    ]));
    let run = run_pipeline(&core, &pipeline_id, json!({}));
    assert_eq!(run["status"], json!("completed"));
    assert_eq!(run["step_results"]["a"]["devices"], json!(["cpu:0"]));
    assert_eq!(run["step_results"]["b"]["count"], json!(0));
    core.shutdown();
}

#[test]
fn diamond_graph_runs_all_steps() {
    let (core, log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "diamond", json!([
        { "id": "a", "type": "trace.mark", "input": { "tag": "a" } },
        { "id": "b", "type": "trace.mark", "input": { "tag": "b" }, "depends_on": ["a"] },
        { "id": "c", "type": "trace.mark", "input": { "tag": "c" }, "depends_on": ["a"] },
        { "id": "d", "type": "trace.mark", "input": { "tag": "d" }, "depends_on": ["b", "c"] }
    ]));
    let run = run_pipeline(&core, &pipeline_id, json!({}));
    assert_eq!(run["status"], json!("completed"));
    assert_eq!(run["step_results"].as_object().expect("results").len(), 4);

    let order = log.lock().expect("log").clone();
    let position = |tag: &str| order.iter().position(|seen| seen == tag).expect("ran");
    assert!(position("a") < position("b"));
    assert!(position("a") < position("c"));
    assert!(position("b") < position("d"));
    assert!(position("c") < position("d"));
    core.shutdown();
}

#[test]
fn run_input_reaches_steps_under_the_reserved_key() {
    let (core, _log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "inputs", json!([
        { "id": "e", "type": "echo.input", "input": { "own": 1 } }
    ]));
    let run = run_pipeline(&core, &pipeline_id, json!({ "x": 42 }));
    assert_eq!(run["status"], json!("completed"));
    assert_eq!(run["step_results"]["e"]["own"], json!(1));
    assert_eq!(run["step_results"]["e"]["run_input"]["x"], json!(42));
    core.shutdown();
}

#[test]
fn step_failure_stops_dependents_and_fails_the_run() {
    let (core, log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "failing", json!([
        { "id": "a", "type": "chaos.fail", "input": {} },
        { "id": "b", "type": "trace.mark", "input": { "tag": "b" }, "depends_on": ["a"] }
    ]));
    let run = run_pipeline(&core, &pipeline_id, json!({}));
    assert_eq!(run["status"], json!("failed"));
    assert!(run["error"].as_str().expect("error").contains("step a failed"));
    assert!(run["step_results"].as_object().expect("results").is_empty());
    assert!(log.lock().expect("log").is_empty(), "dependent step never started");

    let pipeline = core
        .handle(
            &Context::background(),
            Request::query("pipeline.get", json!({ "pipeline_id": pipeline_id })),
        )
        .into_result()
        .expect("pipeline");
    assert_eq!(pipeline["status"], json!("idle"), "pipeline returns to idle");
    core.shutdown();
}

#[test]
fn unknown_step_unit_fails_with_the_documented_message() {
    let (core, _log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "ghost", json!([
        { "id": "a", "type": "ghost.unit", "input": {} }
    ]));
    let run = run_pipeline(&core, &pipeline_id, json!({}));
    assert_eq!(run["status"], json!("failed"));
    assert!(run["error"].as_str().expect("error").contains("unit not found: ghost.unit"));
    core.shutdown();
}

#[test]
fn run_emits_lifecycle_and_step_events() {
    let (core, _log) = core_with_steps();
    let collector = EventCollector::new();
    core.bus()
        .subscribe(collector.handler(), vec![EventFilter::by_domain("pipeline")])
        .expect("subscribe");
    let pipeline_id = create_pipeline(&core, "observed", json!([
        { "id": "a", "type": "device.detect", "input": {} }
    ]));
    run_pipeline(&core, &pipeline_id, json!({}));
    core.shutdown();

    let types = collector.types();
    for expected in [
        "pipeline.created",
        "pipeline.run_started",
        "pipeline.step_started",
        "pipeline.step_completed",
        "pipeline.run_completed",
    ] {
        assert!(types.contains(&expected.to_string()), "missing {expected} in {types:?}");
    }
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[test]
fn running_pipeline_is_cancellable_from_another_thread() {
    let (core, _log) = core_with_steps();
    let core = Arc::new(core);
    let pipeline_id = create_pipeline(&core, "cancellable", json!([
        { "id": "s", "type": "chaos.sleep", "input": {} }
    ]));

    let runner = {
        let core = Arc::clone(&core);
        let pipeline_id = pipeline_id.clone();
        std::thread::spawn(move || run_pipeline(&core, &pipeline_id, json!({})))
    };

    // Wait until the run record appears, then cancel it.
    let deadline = Instant::now() + Duration::from_secs(5);
    let run_id = loop {
        let runs = core.executor().list_runs(None);
        if let Some(run) = runs.first() {
            break run.id.clone();
        }
        assert!(Instant::now() < deadline, "run record appears");
        std::thread::sleep(Duration::from_millis(10));
    };

    let outcome = core
        .handle(
            &Context::background(),
            Request::command("pipeline.cancel", json!({ "run_id": &run_id })),
        )
        .into_result()
        .expect("cancel outcome");
    assert_eq!(outcome["success"], json!(true));

    let run = runner.join().expect("runner thread");
    assert_eq!(run["status"], json!("cancelled"));
    assert!(run["completed_at"].is_i64() || run["completed_at"].is_u64());

    // Terminal runs refuse further cancellation without an error.
    let again = core
        .handle(
            &Context::background(),
            Request::command("pipeline.cancel", json!({ "run_id": &run_id })),
        )
        .into_result()
        .expect("second cancel outcome");
    assert_eq!(again["success"], json!(false));
    assert!(again["message"].as_str().expect("message").contains("already"));
    core.shutdown();
}

#[test]
fn cancel_of_unknown_run_is_not_found() {
    let (core, _log) = core_with_steps();
    let response = core.handle(
        &Context::background(),
        Request::command("pipeline.cancel", json!({ "run_id": "run-ghost" })),
    );
    assert_eq!(response.error().expect("error").code, ErrorCode::NotFound);
    core.shutdown();
}

// ============================================================================
// SECTION: Deletion
// ============================================================================

#[test]
fn delete_refuses_active_runs_without_force() {
    let (core, _log) = core_with_steps();
    let core = Arc::new(core);
    let pipeline_id = create_pipeline(&core, "busy", json!([
        { "id": "s", "type": "chaos.sleep", "input": {} }
    ]));

    let runner = {
        let core = Arc::clone(&core);
        let pipeline_id = pipeline_id.clone();
        std::thread::spawn(move || run_pipeline(&core, &pipeline_id, json!({})))
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while core.executor().list_runs(None).is_empty() {
        assert!(Instant::now() < deadline, "run record appears");
        std::thread::sleep(Duration::from_millis(10));
    }

    let refused = core.handle(
        &Context::background(),
        Request::command("pipeline.delete", json!({ "pipeline_id": &pipeline_id })),
    );
    assert_eq!(refused.error().expect("error").code, ErrorCode::InvalidInput);

    let forced = core.handle(
        &Context::background(),
        Request::command("pipeline.delete", json!({
            "pipeline_id": &pipeline_id,
            "force": true
        })),
    );
    assert!(forced.is_ok(), "forced delete cancels and removes: {:?}", forced.error());

    let run = runner.join().expect("runner thread");
    assert_eq!(run["status"], json!("cancelled"));

    let missing = core.handle(
        &Context::background(),
        Request::query("pipeline.get", json!({ "pipeline_id": pipeline_id })),
    );
    assert_eq!(missing.error().expect("error").code, ErrorCode::NotFound);
    core.shutdown();
}

#[test]
fn delete_of_idle_pipeline_succeeds() {
    let (core, _log) = core_with_steps();
    let pipeline_id = create_pipeline(&core, "idle", json!([
        { "id": "a", "type": "device.detect", "input": {} }
    ]));
    let deleted = core.handle(
        &Context::background(),
        Request::command("pipeline.delete", json!({ "pipeline_id": pipeline_id })),
    );
    assert!(deleted.is_ok());
    core.shutdown();
}
