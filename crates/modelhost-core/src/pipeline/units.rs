// crates/modelhost-core/src/pipeline/units.rs
// ============================================================================
// Module: Pipeline Units
// Description: The pipeline.* command and query set over the executor.
// Purpose: Expose workflow management through the uniform unit surface.
// Dependencies: crate::core, crate::pipeline::executor, serde_json
// ============================================================================

//! ## Overview
//! Thin typed units delegating to the [`PipelineExecutor`]. `pipeline.run`
//! executes synchronously under the caller's context and returns the
//! terminal run; cancellation reaches it from other threads through
//! `pipeline.cancel`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::context::Context;
use crate::core::CoreError;
use crate::core::Pipeline;
use crate::core::PipelineId;
use crate::core::PipelineRun;
use crate::core::PipelineStep;
use crate::core::RunId;
use crate::core::Unit;
use crate::core::UnitDescriptor;
use crate::core::decode_input;
use crate::core::encode_output;
use crate::pipeline::executor::PipelineExecutor;
use crate::pipeline::validate::validate_steps;
use crate::runtime::envelope::UnitEnvelope;
use crate::runtime::registry::UnitRegistry;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Domain name for the pipeline unit set.
const DOMAIN: &str = "pipeline";

/// Input of `pipeline.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInput {
    /// Pipeline name.
    pub name: String,
    /// Step definitions.
    pub steps: Vec<PipelineStep>,
}

/// Input of `pipeline.run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    /// Pipeline to execute.
    pub pipeline_id: PipelineId,
    /// Run-level input exposed to steps under the `run_input` key.
    #[serde(default)]
    pub input: Value,
}

/// Input of `pipeline.cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInput {
    /// Run to cancel.
    pub run_id: RunId,
}

/// Input of `pipeline.delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteInput {
    /// Pipeline to delete.
    pub pipeline_id: PipelineId,
    /// Cancel active runs before deleting.
    #[serde(default)]
    pub force: bool,
}

/// Output of `pipeline.delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutput {
    /// Deleted pipeline identifier.
    pub pipeline_id: PipelineId,
}

/// Input of `pipeline.validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateInput {
    /// Step definitions to validate.
    pub steps: Vec<PipelineStep>,
}

/// Input of `pipeline.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInput {
    /// Pipeline to fetch.
    pub pipeline_id: PipelineId,
}

/// Output of `pipeline.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOutput {
    /// Stored pipelines.
    pub pipelines: Vec<Pipeline>,
    /// Number of stored pipelines.
    pub count: usize,
}

/// Input of `pipeline.get_run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRunInput {
    /// Run to fetch.
    pub run_id: RunId,
}

/// Input of `pipeline.list_runs`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListRunsInput {
    /// Restrict to one pipeline, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<PipelineId>,
}

/// Output of `pipeline.list_runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRunsOutput {
    /// Matching runs.
    pub runs: Vec<PipelineRun>,
    /// Number of matching runs.
    pub count: usize,
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// `pipeline.create` command.
pub struct CreateUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl CreateUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new(
            "pipeline.create",
            "Validate and store a pipeline definition.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "steps": { "type": "array" }
                },
                "required": ["name", "steps"]
            }),
            json!({ "type": "object" }),
        )
        .with_example(
            "Two-step chain",
            json!({
                "name": "detect-then-list",
                "steps": [
                    { "id": "a", "type": "device.detect", "input": {} },
                    { "id": "b", "type": "model.list", "input": {}, "depends_on": ["a"] }
                ]
            }),
            json!({ "id": "pipeline-...", "status": "idle" }),
        );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for CreateUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: CreateInput = decode_input(DOMAIN, input)?;
        let pipeline = self.executor.create_pipeline(ctx, request.name, request.steps)?;
        encode_output(DOMAIN, &pipeline)
    }
}

/// `pipeline.run` command.
pub struct RunUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl RunUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new(
            "pipeline.run",
            "Execute a pipeline and return the terminal run. The run-level \
             input is exposed to each step under the reserved run_input key.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "pipeline_id": { "type": "string" },
                    "input": { "type": "object" }
                },
                "required": ["pipeline_id"]
            }),
            json!({ "type": "object" }),
        );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for RunUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: RunInput = decode_input(DOMAIN, input)?;
        let run = self.executor.run(ctx, &request.pipeline_id, request.input)?;
        encode_output(DOMAIN, &run)
    }
}

/// `pipeline.cancel` command.
pub struct CancelUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl CancelUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new(
            "pipeline.cancel",
            "Cancel a pending or running pipeline run.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": { "run_id": { "type": "string" } },
                "required": ["run_id"]
            }),
            json!({
                "type": "object",
                "properties": {
                    "success": { "type": "boolean" },
                    "message": { "type": "string" }
                }
            }),
        );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for CancelUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: CancelInput = decode_input(DOMAIN, input)?;
        let outcome = self.executor.cancel(ctx, &request.run_id)?;
        encode_output(DOMAIN, &outcome)
    }
}

/// `pipeline.delete` command.
pub struct DeleteUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl DeleteUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new(
            "pipeline.delete",
            "Delete a pipeline; with force, cancel its active runs first.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "pipeline_id": { "type": "string" },
                    "force": { "type": "boolean" }
                },
                "required": ["pipeline_id"]
            }),
            json!({ "type": "object" }),
        );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for DeleteUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: DeleteInput = decode_input(DOMAIN, input)?;
        self.executor.delete_pipeline(ctx, &request.pipeline_id, request.force)?;
        encode_output(DOMAIN, &DeleteOutput {
            pipeline_id: request.pipeline_id,
        })
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// `pipeline.validate` query.
pub struct ValidateUnit {
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl ValidateUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new() -> Self {
        let descriptor = UnitDescriptor::new(
            "pipeline.validate",
            "Statically validate a pipeline definition without storing it.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": { "steps": { "type": "array" } },
                "required": ["steps"]
            }),
            json!({
                "type": "object",
                "properties": {
                    "valid": { "type": "boolean" },
                    "issues": { "type": "array" }
                }
            }),
        );
        Self {
            descriptor,
        }
    }
}

impl Default for ValidateUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for ValidateUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: ValidateInput = decode_input(DOMAIN, input)?;
        encode_output(DOMAIN, &validate_steps(&request.steps))
    }
}

/// `pipeline.get` query.
pub struct GetUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl GetUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new("pipeline.get", "Fetch one pipeline definition.")
            .with_schemas(
                json!({
                    "type": "object",
                    "properties": { "pipeline_id": { "type": "string" } },
                    "required": ["pipeline_id"]
                }),
                json!({ "type": "object" }),
            );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for GetUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: GetInput = decode_input(DOMAIN, input)?;
        let pipeline = self.executor.get_pipeline(&request.pipeline_id)?;
        encode_output(DOMAIN, &pipeline)
    }
}

/// `pipeline.list` query.
pub struct ListUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl ListUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new("pipeline.list", "List stored pipeline definitions.")
            .with_schemas(json!({ "type": "object" }), json!({ "type": "object" }));
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for ListUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, _input: Value) -> Result<Value, CoreError> {
        let pipelines = self.executor.list_pipelines();
        let count = pipelines.len();
        encode_output(DOMAIN, &ListOutput {
            pipelines,
            count,
        })
    }
}

/// `pipeline.get_run` query.
pub struct GetRunUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl GetRunUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new("pipeline.get_run", "Fetch one pipeline run record.")
            .with_schemas(
                json!({
                    "type": "object",
                    "properties": { "run_id": { "type": "string" } },
                    "required": ["run_id"]
                }),
                json!({ "type": "object" }),
            );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for GetRunUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: GetRunInput = decode_input(DOMAIN, input)?;
        let run = self.executor.get_run(&request.run_id)?;
        encode_output(DOMAIN, &run)
    }
}

/// `pipeline.list_runs` query.
pub struct ListRunsUnit {
    /// Executor.
    executor: Arc<PipelineExecutor>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl ListRunsUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let descriptor = UnitDescriptor::new(
            "pipeline.list_runs",
            "List run records, optionally for one pipeline.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": { "pipeline_id": { "type": "string" } }
            }),
            json!({ "type": "object" }),
        );
        Self {
            executor,
            descriptor,
        }
    }
}

impl Unit for ListRunsUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: ListRunsInput = decode_input(DOMAIN, input)?;
        let runs = self.executor.list_runs(request.pipeline_id.as_ref());
        let count = runs.len();
        encode_output(DOMAIN, &ListRunsOutput {
            runs,
            count,
        })
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the full pipeline unit set, envelope-wrapped.
///
/// # Errors
///
/// Returns `ALREADY_EXISTS` when any pipeline unit name is taken.
pub fn register(
    registry: &UnitRegistry,
    envelope: &UnitEnvelope,
    executor: &Arc<PipelineExecutor>,
) -> Result<(), CoreError> {
    registry.register_command(envelope.wrap(Arc::new(CreateUnit::new(Arc::clone(executor)))))?;
    registry.register_command(envelope.wrap(Arc::new(RunUnit::new(Arc::clone(executor)))))?;
    registry.register_command(envelope.wrap(Arc::new(CancelUnit::new(Arc::clone(executor)))))?;
    registry.register_command(envelope.wrap(Arc::new(DeleteUnit::new(Arc::clone(executor)))))?;
    registry.register_query(envelope.wrap(Arc::new(ValidateUnit::new())))?;
    registry.register_query(envelope.wrap(Arc::new(GetUnit::new(Arc::clone(executor)))))?;
    registry.register_query(envelope.wrap(Arc::new(ListUnit::new(Arc::clone(executor)))))?;
    registry.register_query(envelope.wrap(Arc::new(GetRunUnit::new(Arc::clone(executor)))))?;
    registry.register_query(envelope.wrap(Arc::new(ListRunsUnit::new(Arc::clone(executor)))))?;
    Ok(())
}
