// crates/modelhost-core/src/core/pipeline.rs
// ============================================================================
// Module: Modelhost Pipeline Records
// Description: Pipelines, steps, runs, and validation reports.
// Purpose: Define the persisted workflow entities executed by the core.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Pipeline`] is a user-defined DAG of unit invocations persisted as a
//! first-class entity; a [`PipelineRun`] is one execution of it. Run states
//! `completed`, `failed`, and `cancelled` are terminal and final. Step
//! dependency graphs are validated before a pipeline ever reaches the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::PipelineId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::StepId;
use crate::core::identifiers::UnitName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Pipeline Status
// ============================================================================

/// Pipeline lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// No run is in flight.
    Idle,
    /// A run is in flight.
    Running,
    /// Execution is administratively paused.
    Paused,
    /// The definition is unusable until repaired.
    Failed,
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// One step of a pipeline: a unit invocation with dependencies.
///
/// # Invariants
/// - `id` is unique within the pipeline.
/// - `depends_on` references only step identifiers of the same pipeline and
///   the dependency graph is acyclic (enforced by validation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Step identifier, unique within the pipeline.
    pub id: StepId,
    /// Human-readable step name.
    #[serde(default)]
    pub name: String,
    /// Target unit name.
    #[serde(rename = "type")]
    pub unit: UnitName,
    /// Step input mapping, passed verbatim to the unit.
    #[serde(default)]
    pub input: Value,
    /// Identifiers of steps that must complete before this one starts.
    #[serde(default)]
    pub depends_on: BTreeSet<StepId>,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Persisted pipeline definition.
///
/// # Invariants
/// - Exactly one pipeline exists per identifier.
/// - `steps` satisfy the step invariants above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline identifier.
    pub id: PipelineId,
    /// Human-readable pipeline name.
    pub name: String,
    /// Lifecycle status.
    pub status: PipelineStatus,
    /// Ordered step definitions.
    pub steps: Vec<PipelineStep>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Runs
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - `Completed`, `Failed`, and `Cancelled` are terminal; once reached no
///   further transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet scheduled.
    Pending,
    /// Steps are executing.
    Running,
    /// All steps succeeded.
    Completed,
    /// A step failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl RunStatus {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the stable wire form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One execution of a pipeline.
///
/// # Invariants
/// - `completed_at` is set exactly when the run enters a terminal state.
/// - `step_results` holds the output of every successfully completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Executor-minted run identifier.
    pub id: RunId,
    /// Identifier of the executed pipeline.
    pub pipeline_id: PipelineId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Run-level input mapping.
    pub input: Value,
    /// Step outputs keyed by step identifier.
    #[serde(default)]
    pub step_results: BTreeMap<StepId, Value>,
    /// Failure message when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Run start timestamp.
    pub started_at: Timestamp,
    /// Terminal transition timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Validation Report
// ============================================================================

/// Result of static pipeline validation.
///
/// # Invariants
/// - `valid` is true exactly when `issues` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the definition is valid.
    pub valid: bool,
    /// Human-readable issues found.
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// Builds a report from collected issues.
    #[must_use]
    pub const fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}
