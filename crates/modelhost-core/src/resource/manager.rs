// crates/modelhost-core/src/resource/manager.rs
// ============================================================================
// Module: Resource Slot Manager
// Description: Arbitrates slot creation and reports live usage.
// Purpose: Enforce admission against the budget probe and own slot records.
// Dependencies: crate::bus, crate::core, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! The manager owns the live slot map and defers every budget question to
//! the injected [`ResourceBudgetProbe`]. Allocation is serialized under a
//! dedicated admission mutex held across the probe check and the insert, so
//! two concurrent allocations can never both pass a budget that admits only
//! one. The slot map's own lock is never held across a probe call or an
//! event publication.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::bus::EventBus;
use crate::context::Context;
use crate::core::AdmissionDecision;
use crate::core::CoreError;
use crate::core::DEFAULT_SLOT_PRIORITY;
use crate::core::Event;
use crate::core::MAX_SLOT_PRIORITY;
use crate::core::ResourceBudgetReport;
use crate::core::ResourceSlot;
use crate::core::ResourceStatusSnapshot;
use crate::core::SlotId;
use crate::core::SlotStatus;
use crate::core::SlotType;
use crate::core::Timestamp;
use crate::interfaces::BudgetProbeError;
use crate::interfaces::ResourceBudgetProbe;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default memory-utilization ratio at which pressure warnings fire.
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 0.9;

/// Domain name used for resource errors and events.
const DOMAIN: &str = "resource";

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Allocation request.
///
/// # Invariants
/// - Validated before any effect: non-empty name, positive memory, priority
///   in `[0, 100]`, GPU fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocateRequest {
    /// Slot name.
    pub name: String,
    /// Workload type.
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Requested memory in bytes.
    pub memory_bytes: u64,
    /// Requested GPU fraction; defaults to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_fraction: Option<f64>,
    /// Arbitration priority; defaults to 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

/// Patch request for an existing slot.
///
/// # Invariants
/// - Each present field replaces the current value after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPatch {
    /// Target slot identifier.
    pub slot_id: SlotId,
    /// New memory limit in bytes, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    /// New lifecycle status, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SlotStatus>,
    /// Reason recorded on a preempting patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Filter for the allocations query.
///
/// # Invariants
/// - Absent fields do not constrain the result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationFilter {
    /// Exact slot identifier to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<SlotId>,
    /// Exact workload type to match.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub slot_type: Option<SlotType>,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Resource slot manager.
///
/// # Invariants
/// - Slot identifiers are minted by the manager and never reused.
/// - Allocate/release/update for one slot id are serialized by the slot-map
///   lock; admission is additionally serialized by the admission mutex.
pub struct ResourceManager {
    /// Live slot records.
    slots: RwLock<BTreeMap<SlotId, ResourceSlot>>,
    /// Serializes probe-check → insert during allocation.
    admission: Mutex<()>,
    /// Injected budget/pressure probe.
    probe: Option<Arc<dyn ResourceBudgetProbe>>,
    /// Bus for domain events.
    bus: Arc<dyn EventBus>,
    /// Memory-utilization ratio at which pressure warnings fire.
    pressure_threshold: f64,
}

impl ResourceManager {
    /// Creates a manager with the given probe and pressure threshold.
    #[must_use]
    pub fn new(
        bus: Arc<dyn EventBus>,
        probe: Option<Arc<dyn ResourceBudgetProbe>>,
        pressure_threshold: f64,
    ) -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            admission: Mutex::new(()),
            probe,
            bus,
            pressure_threshold,
        }
    }

    /// Allocates a slot after admission.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` on validation failure, `PROVIDER_NOT_SET`
    /// without a probe, `INSUFFICIENT_RESOURCES` on refused admission, and
    /// `CANCELLED`/`TIMEOUT` when the context ends.
    pub fn allocate(&self, ctx: &Context, request: &AllocateRequest) -> Result<ResourceSlot, CoreError> {
        validate_allocate(request)?;
        let probe = self.probe()?;
        let priority = request.priority.unwrap_or(DEFAULT_SLOT_PRIORITY);

        let slot = {
            let _admit = self.admission.lock().unwrap_or_else(PoisonError::into_inner);
            ctx.check(DOMAIN)?;
            let decision = probe
                .can_allocate(ctx, request.memory_bytes, priority)
                .map_err(probe_failure)?;
            if !decision.can_allocate {
                return Err(CoreError::insufficient_resources(
                    decision.reason.unwrap_or_else(|| "insufficient resources".to_string()),
                ));
            }

            let now = Timestamp::now();
            let slot = ResourceSlot {
                id: SlotId::mint(),
                name: request.name.clone(),
                slot_type: request.slot_type,
                memory_limit: request.memory_bytes,
                gpu_fraction: request.gpu_fraction.unwrap_or(0.0),
                priority,
                status: SlotStatus::Active,
                created_at: now,
                updated_at: now,
            };
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            if slots.contains_key(&slot.id) {
                return Err(CoreError::internal(DOMAIN, "slot id collision"));
            }
            slots.insert(slot.id.clone(), slot.clone());
            slot
        };

        self.publish(ctx, "resource.allocated", json!({
            "slot_id": &slot.id,
            "memory": slot.memory_limit,
        }));
        self.emit_pressure_warning(ctx, &probe);
        Ok(slot)
    }

    /// Releases a slot.
    ///
    /// # Errors
    ///
    /// Returns `SLOT_NOT_FOUND` when no such slot exists.
    pub fn release(&self, ctx: &Context, slot_id: &SlotId) -> Result<ResourceSlot, CoreError> {
        let removed = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(slot_id)
            .ok_or_else(|| CoreError::slot_not_found(slot_id.as_str()))?;
        self.publish(ctx, "resource.released", json!({
            "slot_id": &removed.id,
            "memory": removed.memory_limit,
        }));
        Ok(removed)
    }

    /// Applies a patch to a slot.
    ///
    /// # Errors
    ///
    /// Returns `SLOT_NOT_FOUND` for unknown slots and `INVALID_INPUT` for
    /// invalid patch values.
    pub fn update_slot(&self, ctx: &Context, patch: &SlotPatch) -> Result<ResourceSlot, CoreError> {
        if patch.memory_limit == Some(0) {
            return Err(CoreError::invalid_input(DOMAIN, "memory_limit must be greater than zero"));
        }

        let (updated, preempted) = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            let slot = slots
                .get_mut(&patch.slot_id)
                .ok_or_else(|| CoreError::slot_not_found(patch.slot_id.as_str()))?;
            let previous_status = slot.status;
            if let Some(memory_limit) = patch.memory_limit {
                slot.memory_limit = memory_limit;
            }
            if let Some(status) = patch.status {
                slot.status = status;
            }
            slot.updated_at = Timestamp::now();
            let preempted =
                previous_status != SlotStatus::Preempted && slot.status == SlotStatus::Preempted;
            (slot.clone(), preempted)
        };

        if preempted {
            self.publish(ctx, "resource.preemption", json!({
                "slot_id": &updated.id,
                "reason": patch.reason.clone().unwrap_or_else(|| "administrative preemption".to_string()),
            }));
        }
        Ok(updated)
    }

    /// Returns the full status snapshot: probe figures plus slot records.
    ///
    /// # Errors
    ///
    /// Returns `PROVIDER_NOT_SET` without a probe and `INTERNAL_ERROR` when
    /// the probe fails.
    pub fn status(&self, ctx: &Context) -> Result<ResourceStatusSnapshot, CoreError> {
        let probe = self.probe()?;
        let usage = probe.get_status(ctx).map_err(probe_failure)?;
        let snapshot = ResourceStatusSnapshot {
            memory: usage.memory,
            storage: usage.storage,
            slots: self.list(&AllocationFilter::default()),
            pressure: usage.pressure,
        };
        if snapshot.memory.utilization() >= self.pressure_threshold {
            self.publish(ctx, "resource.pressure_warning", json!({
                "pressure": snapshot.pressure,
                "threshold": self.pressure_threshold,
            }));
        }
        Ok(snapshot)
    }

    /// Returns the budget report from the probe.
    ///
    /// # Errors
    ///
    /// Returns `PROVIDER_NOT_SET` without a probe and `INTERNAL_ERROR` when
    /// the probe fails.
    pub fn budget(&self, ctx: &Context) -> Result<ResourceBudgetReport, CoreError> {
        self.probe()?.get_budget(ctx).map_err(probe_failure)
    }

    /// Returns slot records matching the filter.
    #[must_use]
    pub fn list(&self, filter: &AllocationFilter) -> Vec<ResourceSlot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| filter.slot_id.as_ref().is_none_or(|wanted| slot.id == *wanted))
            .filter(|slot| filter.slot_type.is_none_or(|wanted| slot.slot_type == wanted))
            .cloned()
            .collect()
    }

    /// Returns one slot record.
    ///
    /// # Errors
    ///
    /// Returns `SLOT_NOT_FOUND` when no such slot exists.
    pub fn get_slot(&self, slot_id: &SlotId) -> Result<ResourceSlot, CoreError> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slot_id)
            .cloned()
            .ok_or_else(|| CoreError::slot_not_found(slot_id.as_str()))
    }

    /// Passes an admission question through to the probe.
    ///
    /// # Errors
    ///
    /// Returns `PROVIDER_NOT_SET` without a probe and `INTERNAL_ERROR` when
    /// the probe fails.
    pub fn can_allocate(
        &self,
        ctx: &Context,
        memory_bytes: u64,
        priority: Option<u8>,
    ) -> Result<AdmissionDecision, CoreError> {
        self.probe()?
            .can_allocate(ctx, memory_bytes, priority.unwrap_or(DEFAULT_SLOT_PRIORITY))
            .map_err(probe_failure)
    }

    /// Returns the probe or the typed missing-provider error.
    fn probe(&self) -> Result<Arc<dyn ResourceBudgetProbe>, CoreError> {
        self.probe
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| CoreError::provider_not_set(DOMAIN, "resource budget probe"))
    }

    /// Publishes a pressure warning when memory utilization crosses the
    /// threshold; probe failures here are ignored.
    fn emit_pressure_warning(&self, ctx: &Context, probe: &Arc<dyn ResourceBudgetProbe>) {
        let Ok(usage) = probe.get_status(ctx) else {
            return;
        };
        if usage.memory.utilization() >= self.pressure_threshold {
            self.publish(ctx, "resource.pressure_warning", json!({
                "pressure": usage.pressure,
                "threshold": self.pressure_threshold,
            }));
        }
    }

    /// Publishes a domain event, logging and swallowing bus failures.
    fn publish(&self, ctx: &Context, event_type: &str, payload: serde_json::Value) {
        let event = Event::new(event_type, payload, Some(ctx.correlation_id().clone()));
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(event_type, error = %err, "resource event publish failed");
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates an allocation request before any effect.
fn validate_allocate(request: &AllocateRequest) -> Result<(), CoreError> {
    if request.name.trim().is_empty() {
        return Err(CoreError::invalid_input(DOMAIN, "name must not be empty"));
    }
    if request.memory_bytes == 0 {
        return Err(CoreError::invalid_input(DOMAIN, "memory_bytes must be greater than zero"));
    }
    if request.priority.is_some_and(|priority| priority > MAX_SLOT_PRIORITY) {
        return Err(CoreError::invalid_input(DOMAIN, "priority must be in [0, 100]"));
    }
    if request
        .gpu_fraction
        .is_some_and(|fraction| !(0.0..=1.0).contains(&fraction) || fraction.is_nan())
    {
        return Err(CoreError::invalid_input(DOMAIN, "gpu_fraction must be in [0, 1]"));
    }
    Ok(())
}

/// Maps a probe failure into the unit-facing taxonomy.
fn probe_failure(err: BudgetProbeError) -> CoreError {
    CoreError::internal(DOMAIN, format!("budget probe failed: {err}"))
}
