// crates/modelhost-core/src/pipeline/validate.rs
// ============================================================================
// Module: Pipeline Validation
// Description: Static validation of pipeline step definitions.
// Purpose: Reject malformed or cyclic step graphs before they are stored.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Static validation checks step identifiers (non-empty, unique), dependency
//! references (must name steps of the same pipeline), and acyclicity via
//! Kahn's algorithm. Cycle detection only runs once identifiers and
//! references are sound, so its issue message is never noise on top of a
//! broken definition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::core::PipelineStep;
use crate::core::StepId;
use crate::core::ValidationReport;

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a step list, returning the collected issues.
#[must_use]
pub fn validate_steps(steps: &[PipelineStep]) -> ValidationReport {
    let mut issues = Vec::new();

    let mut seen: BTreeSet<&StepId> = BTreeSet::new();
    for step in steps {
        if step.id.is_empty() {
            issues.push("step id must not be empty".to_string());
        } else if !seen.insert(&step.id) {
            issues.push(format!("duplicate step id: {}", step.id));
        }
    }

    let known: BTreeSet<&StepId> = steps.iter().map(|step| &step.id).collect();
    for step in steps {
        for dependency in &step.depends_on {
            if !known.contains(dependency) {
                issues.push(format!(
                    "step {} depends on unknown step {}",
                    step.id, dependency
                ));
            }
        }
    }

    if issues.is_empty()
        && let Some(members) = cycle_members(steps)
    {
        issues.push(format!(
            "circular dependency detected among steps: {}",
            members.iter().map(StepId::as_str).collect::<Vec<_>>().join(", ")
        ));
    }

    ValidationReport::from_issues(issues)
}

/// Returns the steps stuck on a dependency cycle, when one exists.
///
/// Runs Kahn's algorithm over a sound step graph; every step left with
/// unsatisfied dependencies afterwards sits on or behind a cycle.
fn cycle_members(steps: &[PipelineStep]) -> Option<BTreeSet<StepId>> {
    let mut indegree: BTreeMap<&StepId, usize> =
        steps.iter().map(|step| (&step.id, step.depends_on.len())).collect();
    let mut dependents: BTreeMap<&StepId, Vec<&StepId>> = BTreeMap::new();
    for step in steps {
        for dependency in &step.depends_on {
            dependents.entry(dependency).or_default().push(&step.id);
        }
    }

    let mut ready: Vec<&StepId> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut resolved = 0_usize;
    while let Some(id) = ready.pop() {
        resolved += 1;
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(dependent);
                }
            }
        }
    }

    if resolved == steps.len() {
        return None;
    }
    Some(
        indegree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.clone())
            .collect(),
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "panic-based assertions are permitted in tests")]

    use serde_json::json;

    use super::*;
    use crate::core::UnitName;

    /// Builds a step with the given id and dependencies.
    fn step(id: &str, deps: &[&str]) -> PipelineStep {
        PipelineStep {
            id: StepId::new(id),
            name: id.to_string(),
            unit: UnitName::new("test.noop"),
            input: json!({}),
            depends_on: deps.iter().map(|dep| StepId::new(*dep)).collect(),
        }
    }

    #[test]
    fn accepts_a_linear_chain() {
        let report = validate_steps(&[step("a", &[]), step("b", &["a"])]);
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        let report = validate_steps(&[step("a", &[]), step("a", &[]), step("", &[])]);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|issue| issue.contains("duplicate step id: a")));
        assert!(report.issues.iter().any(|issue| issue.contains("must not be empty")));
    }

    #[test]
    fn rejects_unknown_dependencies() {
        let report = validate_steps(&[step("a", &["ghost"])]);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|issue| issue.contains("unknown step ghost")));
    }

    #[test]
    fn rejects_two_step_cycle() {
        let report = validate_steps(&[step("x", &["y"]), step("y", &["x"])]);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|issue| issue.contains("circular")));
    }

    #[test]
    fn rejects_self_dependency_as_cycle() {
        let report = validate_steps(&[step("solo", &["solo"])]);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|issue| issue.contains("circular")));
    }
}
