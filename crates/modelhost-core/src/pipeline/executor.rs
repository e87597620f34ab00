// crates/modelhost-core/src/pipeline/executor.rs
// ============================================================================
// Module: Pipeline Executor
// Description: DAG scheduler running pipelines of unit invocations.
// Purpose: Execute steps in dependency order with cancellation and persistence.
// Dependencies: crate::bus, crate::core, crate::runtime, crate::store, tracing
// ============================================================================

//! ## Overview
//! Runs are scheduled in waves: every step whose dependencies have all
//! completed runs on a scoped thread, at most `max_concurrent_steps` per
//! wave, with ties broken by lexical step-id order for determinism. A step
//! never starts before its dependencies completed; a failure stops new waves
//! while in-flight steps finish. Cancellation flips the run's cancel flag —
//! steps observe it cooperatively through their derived contexts.
//!
//! Run-level input reaches every step under the reserved `run_input` key of
//! the step's input object; the step's own input is otherwise passed
//! verbatim. A step-supplied `run_input` key is overwritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::bus::EventBus;
use crate::context::CancelHandle;
use crate::context::Context;
use crate::core::CoreError;
use crate::core::Event;
use crate::core::Pipeline;
use crate::core::PipelineId;
use crate::core::PipelineRun;
use crate::core::PipelineStatus;
use crate::core::PipelineStep;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::StepId;
use crate::core::Timestamp;
use crate::pipeline::validate::validate_steps;
use crate::runtime::registry::UnitRegistry;
use crate::store::PipelineStore;
use crate::store::RunStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default parallelism inside one run.
pub const DEFAULT_MAX_CONCURRENT_STEPS: usize = 10;

/// Default per-step deadline.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Domain name used for pipeline errors and events.
const DOMAIN: &str = "pipeline";

/// Reserved step-input key carrying the run-level input.
pub const RUN_INPUT_KEY: &str = "run_input";

// ============================================================================
// SECTION: Cancel Outcome
// ============================================================================

/// Result of a cancellation request.
///
/// # Invariants
/// - Cancelling a terminal run yields `success == false` without an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    /// Whether cancellation was applied or requested.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// DAG executor over the unit registry.
///
/// # Invariants
/// - Step transitions for one run are serialized by the executing thread.
/// - A run's terminal state is final; `completed_at` is stamped exactly at
///   the terminal transition.
pub struct PipelineExecutor {
    /// Pipeline definitions.
    pipelines: Arc<PipelineStore>,
    /// Run records.
    runs: Arc<RunStore>,
    /// Unit registry steps resolve against.
    registry: Arc<UnitRegistry>,
    /// Bus for pipeline domain events.
    bus: Arc<dyn EventBus>,
    /// Parallelism bound inside one run.
    max_concurrent_steps: usize,
    /// Per-step deadline.
    step_timeout: Duration,
    /// Cancel handles of in-flight runs.
    active: Mutex<BTreeMap<RunId, CancelHandle>>,
}

impl PipelineExecutor {
    /// Creates an executor over the given stores, registry, and bus.
    #[must_use]
    pub fn new(
        pipelines: Arc<PipelineStore>,
        runs: Arc<RunStore>,
        registry: Arc<UnitRegistry>,
        bus: Arc<dyn EventBus>,
        max_concurrent_steps: usize,
        step_timeout: Duration,
    ) -> Self {
        Self {
            pipelines,
            runs,
            registry,
            bus,
            max_concurrent_steps: max_concurrent_steps.max(1),
            step_timeout,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates and stores a pipeline after validation.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` naming the validation issues; a rejected
    /// definition never reaches the store.
    pub fn create_pipeline(
        &self,
        ctx: &Context,
        name: impl Into<String>,
        steps: Vec<PipelineStep>,
    ) -> Result<Pipeline, CoreError> {
        let report = validate_steps(&steps);
        if !report.valid {
            return Err(CoreError::invalid_input(
                DOMAIN,
                format!("invalid pipeline definition: {}", report.issues.join("; ")),
            ));
        }
        let now = Timestamp::now();
        let pipeline = Pipeline {
            id: PipelineId::mint(),
            name: name.into(),
            status: PipelineStatus::Idle,
            steps,
            created_at: now,
            updated_at: now,
        };
        self.pipelines
            .create(pipeline.id.clone(), pipeline.clone())
            .map_err(|err| err.into_core(DOMAIN))?;
        self.publish(ctx, "pipeline.created", json!({
            "pipeline_id": &pipeline.id,
            "name": &pipeline.name,
        }));
        Ok(pipeline)
    }

    /// Returns one pipeline definition.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` for unknown pipelines.
    pub fn get_pipeline(&self, pipeline_id: &PipelineId) -> Result<Pipeline, CoreError> {
        self.pipelines.get(pipeline_id).map_err(|err| err.into_core(DOMAIN))
    }

    /// Returns all pipeline definitions.
    #[must_use]
    pub fn list_pipelines(&self) -> Vec<Pipeline> {
        self.pipelines.list(|_| true).0
    }

    /// Returns one run record.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` for unknown runs.
    pub fn get_run(&self, run_id: &RunId) -> Result<PipelineRun, CoreError> {
        self.runs.get(run_id).map_err(|err| err.into_core(DOMAIN))
    }

    /// Returns run records, optionally restricted to one pipeline.
    #[must_use]
    pub fn list_runs(&self, pipeline_id: Option<&PipelineId>) -> Vec<PipelineRun> {
        self.runs
            .list(|run| pipeline_id.is_none_or(|wanted| run.pipeline_id == *wanted))
            .0
    }

    /// Executes a pipeline synchronously under the caller's context and
    /// returns the terminal run record.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` for unknown pipelines and `INVALID_INPUT` for
    /// definitions that no longer validate. Step failures do not surface as
    /// errors — they are recorded on the returned run.
    pub fn run(
        &self,
        ctx: &Context,
        pipeline_id: &PipelineId,
        input: Value,
    ) -> Result<PipelineRun, CoreError> {
        let pipeline = self.get_pipeline(pipeline_id)?;
        let report = validate_steps(&pipeline.steps);
        if !report.valid {
            return Err(CoreError::invalid_input(
                DOMAIN,
                format!("invalid pipeline definition: {}", report.issues.join("; ")),
            ));
        }

        let run = PipelineRun {
            id: RunId::mint(),
            pipeline_id: pipeline.id.clone(),
            status: RunStatus::Pending,
            input: input.clone(),
            step_results: BTreeMap::new(),
            error: None,
            started_at: Timestamp::now(),
            completed_at: None,
        };
        let run_id = run.id.clone();
        // Register the cancel handle before the record becomes visible so a
        // racing cancel always finds it.
        let (run_ctx, handle) = ctx.cancellable();
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run_id.clone(), handle);
        if let Err(err) = self.runs.create(run_id.clone(), run) {
            self.active.lock().unwrap_or_else(PoisonError::into_inner).remove(&run_id);
            return Err(err.into_core(DOMAIN));
        }
        self.set_pipeline_status(&pipeline.id, PipelineStatus::Running);
        self.publish(ctx, "pipeline.run_started", json!({
            "run_id": &run_id,
            "pipeline_id": &pipeline.id,
        }));

        self.execute_steps(&run_ctx, &pipeline, &run_id, &input);

        self.active.lock().unwrap_or_else(PoisonError::into_inner).remove(&run_id);
        self.set_pipeline_status(&pipeline.id, PipelineStatus::Idle);
        self.get_run(&run_id)
    }

    /// Cancels a pending or running run.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` for unknown runs. Cancelling a terminal run is
    /// not an error; it yields an unsuccessful [`CancelOutcome`].
    pub fn cancel(&self, ctx: &Context, run_id: &RunId) -> Result<CancelOutcome, CoreError> {
        let run = self.get_run(run_id)?;
        if run.status.is_terminal() {
            return Ok(CancelOutcome {
                success: false,
                message: format!("run is already {}", run.status.as_str()),
            });
        }

        let handle = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .cloned();
        if let Some(handle) = handle {
            handle.cancel();
            return Ok(CancelOutcome {
                success: true,
                message: "cancellation requested; in-flight steps will observe it".to_string(),
            });
        }

        // No executor thread owns the run (stale pending record); finalize
        // it directly.
        self.update_run(run_id, |run| {
            run.status = RunStatus::Cancelled;
            run.completed_at = Some(Timestamp::now());
        });
        self.publish(ctx, "pipeline.run_cancelled", json!({ "run_id": run_id }));
        Ok(CancelOutcome {
            success: true,
            message: "run cancelled".to_string(),
        })
    }

    /// Deletes a pipeline definition.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` for unknown pipelines and `INVALID_INPUT` when
    /// active runs exist and `force` is false. With `force`, active runs are
    /// cancelled first.
    pub fn delete_pipeline(
        &self,
        ctx: &Context,
        pipeline_id: &PipelineId,
        force: bool,
    ) -> Result<(), CoreError> {
        let _ = self.get_pipeline(pipeline_id)?;
        let (active_runs, active_count) = self
            .runs
            .list(|run| run.pipeline_id == *pipeline_id && !run.status.is_terminal());
        if active_count > 0 {
            if !force {
                return Err(CoreError::invalid_input(
                    DOMAIN,
                    format!("pipeline has {active_count} active runs; pass force to cancel them"),
                ));
            }
            for run in &active_runs {
                if let Err(err) = self.cancel(ctx, &run.id) {
                    tracing::warn!(run_id = %run.id, error = %err, "cancel during forced delete failed");
                }
            }
        }
        self.pipelines.delete(pipeline_id).map_err(|err| err.into_core(DOMAIN))?;
        self.publish(ctx, "pipeline.deleted", json!({ "pipeline_id": pipeline_id }));
        Ok(())
    }

    /// Cancels every in-flight run (teardown path).
    pub fn cancel_all(&self) {
        let handles: Vec<CancelHandle> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handle in handles {
            handle.cancel();
        }
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Drives the run to a terminal state, recording step results.
    fn execute_steps(&self, ctx: &Context, pipeline: &Pipeline, run_id: &RunId, run_input: &Value) {
        self.update_run(run_id, |run| run.status = RunStatus::Running);

        let mut remaining: BTreeMap<StepId, PipelineStep> =
            pipeline.steps.iter().map(|step| (step.id.clone(), step.clone())).collect();
        let mut completed: BTreeSet<StepId> = BTreeSet::new();
        let mut failure: Option<String> = None;
        let mut cancelled = false;

        while !remaining.is_empty() && failure.is_none() {
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            if ctx.deadline_exceeded() {
                failure = Some("run deadline exceeded".to_string());
                break;
            }

            // BTreeMap order makes the ready wave lexically deterministic.
            let wave: Vec<PipelineStep> = remaining
                .values()
                .filter(|step| step.depends_on.iter().all(|dep| completed.contains(dep)))
                .take(self.max_concurrent_steps)
                .cloned()
                .collect();
            if wave.is_empty() {
                failure = Some("no runnable steps remain (dependency deadlock)".to_string());
                break;
            }

            let results: Vec<(StepId, Result<Value, CoreError>)> = std::thread::scope(|scope| {
                let handles: Vec<_> = wave
                    .iter()
                    .map(|step| {
                        let step_ctx = ctx.with_timeout(self.step_timeout);
                        (
                            step.id.clone(),
                            scope.spawn(move || self.execute_step(&step_ctx, step, run_id, run_input)),
                        )
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(step_id, handle)| {
                        let result = handle.join().unwrap_or_else(|_| {
                            Err(CoreError::internal(DOMAIN, "step execution panicked"))
                        });
                        (step_id, result)
                    })
                    .collect()
            });

            for (step_id, result) in results {
                remaining.remove(&step_id);
                match result {
                    Ok(output) => {
                        completed.insert(step_id.clone());
                        self.publish(ctx, "pipeline.step_completed", json!({
                            "run_id": run_id,
                            "step_id": &step_id,
                        }));
                        self.update_run(run_id, |run| {
                            run.step_results.insert(step_id, output);
                        });
                    }
                    Err(err) => {
                        self.publish(ctx, "pipeline.step_failed", json!({
                            "run_id": run_id,
                            "step_id": &step_id,
                            "error": { "code": err.code.as_str(), "message": &err.message },
                        }));
                        if failure.is_none() {
                            failure = Some(format!("step {step_id} failed: {}", err.message));
                        }
                    }
                }
            }
        }

        if ctx.is_cancelled() {
            cancelled = true;
        }
        let status = if cancelled {
            RunStatus::Cancelled
        } else if failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let error = if cancelled { None } else { failure };
        self.update_run(run_id, |run| {
            run.status = status;
            run.error = error.clone();
            run.completed_at = Some(Timestamp::now());
        });
        let (event_type, mut payload) = match status {
            RunStatus::Cancelled => ("pipeline.run_cancelled", json!({ "run_id": run_id })),
            RunStatus::Failed => ("pipeline.run_failed", json!({ "run_id": run_id })),
            _ => ("pipeline.run_completed", json!({ "run_id": run_id })),
        };
        if let (Some(message), Some(object)) = (&error, payload.as_object_mut()) {
            object.insert("error".to_string(), Value::String(message.clone()));
        }
        self.publish(ctx, event_type, payload);
    }

    /// Executes one step: resolve the unit, merge the run input, invoke.
    fn execute_step(
        &self,
        ctx: &Context,
        step: &PipelineStep,
        run_id: &RunId,
        run_input: &Value,
    ) -> Result<Value, CoreError> {
        self.publish(ctx, "pipeline.step_started", json!({
            "run_id": run_id,
            "step_id": &step.id,
        }));
        ctx.check(DOMAIN)?;
        let unit = self
            .registry
            .any(&step.unit)
            .ok_or_else(|| CoreError::unit_not_found(DOMAIN, step.unit.as_str()))?;
        unit.execute(ctx, merge_run_input(&step.input, run_input))
    }

    /// Applies a mutation to a run record, best-effort.
    fn update_run(&self, run_id: &RunId, mutate: impl FnOnce(&mut PipelineRun)) {
        match self.runs.get(run_id) {
            Ok(mut run) => {
                if run.status.is_terminal() {
                    return;
                }
                mutate(&mut run);
                if let Err(err) = self.runs.update(run_id, run) {
                    tracing::warn!(run_id = %run_id, error = %err, "run update failed");
                }
            }
            Err(err) => {
                tracing::warn!(run_id = %run_id, error = %err, "run lookup failed during update");
            }
        }
    }

    /// Sets a pipeline's status, tolerating concurrent deletion.
    fn set_pipeline_status(&self, pipeline_id: &PipelineId, status: PipelineStatus) {
        if let Ok(mut pipeline) = self.pipelines.get(pipeline_id) {
            pipeline.status = status;
            pipeline.updated_at = Timestamp::now();
            let _ = self.pipelines.update(pipeline_id, pipeline);
        }
    }

    /// Publishes a domain event, logging and swallowing bus failures.
    fn publish(&self, ctx: &Context, event_type: &str, payload: Value) {
        let event = Event::new(event_type, payload, Some(ctx.correlation_id().clone()));
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(event_type, error = %err, "pipeline event publish failed");
        }
    }
}

// ============================================================================
// SECTION: Input Merge
// ============================================================================

/// Merges the run-level input into a step's input under [`RUN_INPUT_KEY`].
///
/// Object inputs gain the key (overwriting a step-supplied one); a null step
/// input becomes an object carrying only the key; any other shape is passed
/// verbatim. A null run input is never injected.
fn merge_run_input(step_input: &Value, run_input: &Value) -> Value {
    if run_input.is_null() {
        return step_input.clone();
    }
    match step_input {
        Value::Object(fields) => {
            let mut merged = fields.clone();
            merged.insert(RUN_INPUT_KEY.to_string(), run_input.clone());
            Value::Object(merged)
        }
        Value::Null => json!({ RUN_INPUT_KEY: run_input }),
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "panic-based assertions are permitted in tests")]

    use serde_json::json;

    use super::*;

    #[test]
    fn merge_injects_run_input_into_objects() {
        let merged = merge_run_input(&json!({ "a": 1 }), &json!({ "b": 2 }));
        assert_eq!(merged, json!({ "a": 1, "run_input": { "b": 2 } }));
    }

    #[test]
    fn merge_overwrites_step_supplied_key() {
        let merged = merge_run_input(&json!({ "run_input": "stale" }), &json!(7));
        assert_eq!(merged, json!({ "run_input": 7 }));
    }

    #[test]
    fn merge_skips_null_run_input() {
        let merged = merge_run_input(&json!({ "a": 1 }), &Value::Null);
        assert_eq!(merged, json!({ "a": 1 }));
    }

    #[test]
    fn merge_wraps_null_step_input() {
        let merged = merge_run_input(&Value::Null, &json!([1, 2]));
        assert_eq!(merged, json!({ "run_input": [1, 2] }));
    }
}
