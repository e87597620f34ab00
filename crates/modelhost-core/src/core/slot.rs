// crates/modelhost-core/src/core/slot.rs
// ============================================================================
// Module: Modelhost Resource Records
// Description: Resource slots, pressure levels, and budget/status snapshots.
// Purpose: Define the accounting records arbitrated by the slot manager.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A [`ResourceSlot`] is an accounting record for a memory (and optional GPU
//! fraction) reservation held by some workload on the host. Status and
//! budget snapshots are derived on read and never persisted. The budget
//! probe supplies live host figures; the manager owns the slot records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::SlotId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Slot Enumerations
// ============================================================================

/// Workload type backing a slot.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// Natively managed inference engine process.
    InferenceNative,
    /// Docker container workload.
    DockerContainer,
    /// Host system service.
    SystemService,
}

/// Slot lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Slot is actively serving a workload.
    Active,
    /// Slot is held but its workload is idle.
    Idle,
    /// Slot has been preempted by the arbiter.
    Preempted,
}

/// Default slot priority.
pub const DEFAULT_SLOT_PRIORITY: u8 = 5;

/// Maximum slot priority (inclusive).
pub const MAX_SLOT_PRIORITY: u8 = 100;

// ============================================================================
// SECTION: Resource Slot
// ============================================================================

/// Accounting record for one resource reservation.
///
/// # Invariants
/// - `memory_limit > 0` at creation.
/// - `gpu_fraction` lies in `[0, 1]`; `priority` lies in `[0, 100]`.
/// - `id` is minted by the manager and never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSlot {
    /// Manager-minted slot identifier.
    pub id: SlotId,
    /// Caller-supplied slot name.
    pub name: String,
    /// Workload type.
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Memory reservation in bytes.
    pub memory_limit: u64,
    /// Reserved GPU fraction in `[0, 1]`.
    pub gpu_fraction: f64,
    /// Arbitration priority in `[0, 100]`.
    pub priority: u8,
    /// Lifecycle status.
    pub status: SlotStatus,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Pressure
// ============================================================================

/// Coarse four-level classification of resource strain.
///
/// # Invariants
/// - Variants are ordered from least to most strained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    /// Ample headroom.
    Low,
    /// Elevated usage.
    Medium,
    /// Approaching capacity.
    High,
    /// At or beyond safe capacity.
    Critical,
}

// ============================================================================
// SECTION: Status Snapshots
// ============================================================================

/// Capacity figures for one resource dimension.
///
/// # Invariants
/// - `used + available` need not equal `total` exactly (probes may round).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityFigures {
    /// Total capacity in bytes.
    pub total: u64,
    /// Bytes in use.
    pub used: u64,
    /// Bytes available.
    pub available: u64,
}

impl CapacityFigures {
    /// Returns the utilization ratio `used / total` (zero for empty totals).
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        // Precision loss on very large totals is acceptable for a ratio.
        #[allow(clippy::cast_precision_loss, reason = "coarse ratio over byte counts")]
        let ratio = self.used as f64 / self.total as f64;
        ratio
    }
}

/// Live host usage reported by the budget probe (no slot records).
///
/// # Invariants
/// - Derived on read; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostUsage {
    /// Memory figures.
    pub memory: CapacityFigures,
    /// Storage figures.
    pub storage: CapacityFigures,
    /// Pressure classification.
    pub pressure: PressureLevel,
}

/// Full resource status snapshot: host usage plus live slot records.
///
/// # Invariants
/// - Derived on read; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatusSnapshot {
    /// Memory figures.
    pub memory: CapacityFigures,
    /// Storage figures.
    pub storage: CapacityFigures,
    /// Live slot records.
    pub slots: Vec<ResourceSlot>,
    /// Pressure classification.
    pub pressure: PressureLevel,
}

// ============================================================================
// SECTION: Budget
// ============================================================================

/// Per-pool budget figures.
///
/// # Invariants
/// - `available = total - reserved` up to probe rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPool {
    /// Pool capacity in bytes.
    pub total: u64,
    /// Bytes reserved from the pool.
    pub reserved: u64,
    /// Bytes available in the pool.
    pub available: u64,
}

/// Budget report from the probe.
///
/// # Invariants
/// - Pool names are probe-defined and stable per probe implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudgetReport {
    /// Total budget in bytes.
    pub total: u64,
    /// Total reserved bytes.
    pub reserved: u64,
    /// Named pools.
    pub pools: BTreeMap<String, BudgetPool>,
}

// ============================================================================
// SECTION: Admission
// ============================================================================

/// Admission oracle verdict.
///
/// # Invariants
/// - `reason` is present when `can_allocate` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// Whether the allocation may proceed.
    pub can_allocate: bool,
    /// Refusal reason when admission is denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AdmissionDecision {
    /// Builds a permitting decision.
    #[must_use]
    pub const fn permit() -> Self {
        Self {
            can_allocate: true,
            reason: None,
        }
    }

    /// Builds a refusing decision with the given reason.
    #[must_use]
    pub fn refuse(reason: impl Into<String>) -> Self {
        Self {
            can_allocate: false,
            reason: Some(reason.into()),
        }
    }
}
