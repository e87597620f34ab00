// crates/modelhost-providers/src/budget.rs
// ============================================================================
// Module: Budget Probes
// Description: Static and procfs-backed resource budget probes.
// Purpose: Supply live totals, pressure, and admission verdicts to the core.
// Dependencies: modelhost-core, serde, tracing
// ============================================================================

//! ## Overview
//! Two probes back the slot manager's admission seam. The static probe
//! arbitrates against configured totals and an explicit reservation ledger;
//! [`track_reservations`] keeps that ledger synchronized from the bus's
//! `resource.allocated` / `resource.released` events. The procfs probe reads
//! live memory figures from `/proc/meminfo` (path injectable for tests) and
//! fails closed when the file is missing or unparsable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use modelhost_core::AdmissionDecision;
use modelhost_core::BudgetPool;
use modelhost_core::CapacityFigures;
use modelhost_core::Context;
use modelhost_core::HostUsage;
use modelhost_core::PressureLevel;
use modelhost_core::ResourceBudgetReport;
use modelhost_core::SubscriptionId;
use modelhost_core::bus::BusError;
use modelhost_core::bus::EventBus;
use modelhost_core::bus::EventFilter;
use modelhost_core::interfaces::BudgetProbeError;
use modelhost_core::interfaces::ResourceBudgetProbe;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// SECTION: Pressure Classification
// ============================================================================

/// Utilization below this is low pressure.
const MEDIUM_UTILIZATION: f64 = 0.5;
/// Utilization below this is medium pressure.
const HIGH_UTILIZATION: f64 = 0.75;
/// Utilization below this is high pressure; at or above is critical.
const CRITICAL_UTILIZATION: f64 = 0.9;

/// Classifies a memory-utilization ratio into a pressure level.
#[must_use]
pub fn classify_pressure(utilization: f64) -> PressureLevel {
    if utilization >= CRITICAL_UTILIZATION {
        PressureLevel::Critical
    } else if utilization >= HIGH_UTILIZATION {
        PressureLevel::High
    } else if utilization >= MEDIUM_UTILIZATION {
        PressureLevel::Medium
    } else {
        PressureLevel::Low
    }
}

// ============================================================================
// SECTION: Static Probe
// ============================================================================

/// Configuration for the static budget probe.
///
/// # Invariants
/// - `memory_total` must be greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticBudgetProbeConfig {
    /// Memory budget in bytes.
    pub memory_total: u64,
    /// Storage capacity in bytes.
    #[serde(default)]
    pub storage_total: u64,
    /// Storage bytes already in use.
    #[serde(default)]
    pub storage_used: u64,
}

/// Budget probe over configured totals and an explicit reservation ledger.
///
/// # Invariants
/// - `reserved` never exceeds `memory_total`.
/// - Admission is a pure check; reservations change only through
///   [`StaticBudgetProbe::reserve`] and [`StaticBudgetProbe::release`].
pub struct StaticBudgetProbe {
    /// Configured totals.
    config: StaticBudgetProbeConfig,
    /// Memory bytes currently reserved.
    reserved: Mutex<u64>,
}

impl StaticBudgetProbe {
    /// Creates a probe over the given totals.
    #[must_use]
    pub const fn new(config: StaticBudgetProbeConfig) -> Self {
        Self {
            config,
            reserved: Mutex::new(0),
        }
    }

    /// Returns the memory bytes currently reserved.
    #[must_use]
    pub fn reserved(&self) -> u64 {
        *self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits a reservation, saturating at the configured total.
    pub fn reserve(&self, bytes: u64) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        *reserved = (*reserved + bytes).min(self.config.memory_total);
    }

    /// Returns a reservation, saturating at zero.
    pub fn release(&self, bytes: u64) {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        *reserved = reserved.saturating_sub(bytes);
    }

    /// Atomically checks and commits a reservation in one step.
    #[must_use]
    pub fn try_reserve(&self, bytes: u64) -> AdmissionDecision {
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        if *reserved + bytes > self.config.memory_total {
            return AdmissionDecision::refuse(format!(
                "requested {bytes} bytes exceed available {}",
                self.config.memory_total - *reserved
            ));
        }
        *reserved += bytes;
        AdmissionDecision::permit()
    }

    /// Builds the memory figures from the ledger.
    fn memory_figures(&self) -> CapacityFigures {
        let reserved = self.reserved();
        CapacityFigures {
            total: self.config.memory_total,
            used: reserved,
            available: self.config.memory_total.saturating_sub(reserved),
        }
    }
}

impl ResourceBudgetProbe for StaticBudgetProbe {
    fn get_status(&self, _ctx: &Context) -> Result<HostUsage, BudgetProbeError> {
        let memory = self.memory_figures();
        Ok(HostUsage {
            pressure: classify_pressure(memory.utilization()),
            memory,
            storage: CapacityFigures {
                total: self.config.storage_total,
                used: self.config.storage_used,
                available: self.config.storage_total.saturating_sub(self.config.storage_used),
            },
        })
    }

    fn get_budget(&self, _ctx: &Context) -> Result<ResourceBudgetReport, BudgetProbeError> {
        let memory = self.memory_figures();
        let mut pools = BTreeMap::new();
        pools.insert("memory".to_string(), BudgetPool {
            total: memory.total,
            reserved: memory.used,
            available: memory.available,
        });
        pools.insert("storage".to_string(), BudgetPool {
            total: self.config.storage_total,
            reserved: self.config.storage_used,
            available: self.config.storage_total.saturating_sub(self.config.storage_used),
        });
        Ok(ResourceBudgetReport {
            total: memory.total,
            reserved: memory.used,
            pools,
        })
    }

    fn can_allocate(
        &self,
        _ctx: &Context,
        memory_bytes: u64,
        _priority: u8,
    ) -> Result<AdmissionDecision, BudgetProbeError> {
        let memory = self.memory_figures();
        if memory_bytes > memory.available {
            return Ok(AdmissionDecision::refuse(format!(
                "requested {memory_bytes} bytes exceed available {}",
                memory.available
            )));
        }
        Ok(AdmissionDecision::permit())
    }
}

// ============================================================================
// SECTION: Reservation Tracking
// ============================================================================

/// Subscribes the probe's ledger to the bus's allocation lifecycle.
///
/// `resource.allocated` events commit their `memory` payload to the ledger;
/// `resource.released` events return it. Events without a numeric `memory`
/// field are ignored.
///
/// # Errors
///
/// Returns [`BusError`] when the subscription cannot be registered.
pub fn track_reservations(
    probe: &Arc<StaticBudgetProbe>,
    bus: &Arc<dyn EventBus>,
) -> Result<SubscriptionId, BusError> {
    let ledger = Arc::clone(probe);
    bus.subscribe(
        Arc::new(move |event| {
            let Some(memory) = event.payload.get("memory").and_then(Value::as_u64) else {
                return Ok(());
            };
            match event.event_type.as_str() {
                "resource.allocated" => ledger.reserve(memory),
                "resource.released" => ledger.release(memory),
                _ => {}
            }
            Ok(())
        }),
        vec![EventFilter::one_of_types(["resource.allocated", "resource.released"])],
    )
}

// ============================================================================
// SECTION: Procfs Probe
// ============================================================================

/// Configuration for the procfs-backed probe.
///
/// # Invariants
/// - `meminfo_path` must point at a file in `/proc/meminfo` format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcfsBudgetProbeConfig {
    /// Path to the meminfo file.
    #[serde(default = "default_meminfo_path")]
    pub meminfo_path: PathBuf,
    /// Storage capacity in bytes (procfs carries no storage figures).
    #[serde(default)]
    pub storage_total: u64,
    /// Storage bytes already in use.
    #[serde(default)]
    pub storage_used: u64,
}

impl Default for ProcfsBudgetProbeConfig {
    fn default() -> Self {
        Self {
            meminfo_path: default_meminfo_path(),
            storage_total: 0,
            storage_used: 0,
        }
    }
}

/// Returns the canonical meminfo path.
fn default_meminfo_path() -> PathBuf {
    PathBuf::from("/proc/meminfo")
}

/// Budget probe reading live memory figures from procfs.
///
/// # Invariants
/// - Fails closed: unreadable or unparsable host data is an error, never a
///   permissive default.
pub struct ProcfsBudgetProbe {
    /// Probe configuration.
    config: ProcfsBudgetProbeConfig,
}

impl ProcfsBudgetProbe {
    /// Creates a probe with the given configuration.
    #[must_use]
    pub const fn new(config: ProcfsBudgetProbeConfig) -> Self {
        Self {
            config,
        }
    }

    /// Reads and parses the meminfo file.
    fn read_memory(&self) -> Result<CapacityFigures, BudgetProbeError> {
        let raw = std::fs::read_to_string(&self.config.meminfo_path).map_err(|err| {
            BudgetProbeError::Probe(format!(
                "{}: {err}",
                self.config.meminfo_path.display()
            ))
        })?;
        parse_meminfo(&raw)
    }
}

impl ResourceBudgetProbe for ProcfsBudgetProbe {
    fn get_status(&self, _ctx: &Context) -> Result<HostUsage, BudgetProbeError> {
        let memory = self.read_memory()?;
        Ok(HostUsage {
            pressure: classify_pressure(memory.utilization()),
            memory,
            storage: CapacityFigures {
                total: self.config.storage_total,
                used: self.config.storage_used,
                available: self.config.storage_total.saturating_sub(self.config.storage_used),
            },
        })
    }

    fn get_budget(&self, _ctx: &Context) -> Result<ResourceBudgetReport, BudgetProbeError> {
        let memory = self.read_memory()?;
        let storage = self.config.storage_total;
        let mut pools = BTreeMap::new();
        pools.insert("memory".to_string(), BudgetPool {
            total: memory.total,
            reserved: memory.used,
            available: memory.available,
        });
        pools.insert("storage".to_string(), BudgetPool {
            total: storage,
            reserved: self.config.storage_used,
            available: storage.saturating_sub(self.config.storage_used),
        });
        Ok(ResourceBudgetReport {
            total: memory.total,
            reserved: memory.used,
            pools,
        })
    }

    fn can_allocate(
        &self,
        _ctx: &Context,
        memory_bytes: u64,
        _priority: u8,
    ) -> Result<AdmissionDecision, BudgetProbeError> {
        let memory = self.read_memory()?;
        if memory_bytes > memory.available {
            return Ok(AdmissionDecision::refuse(format!(
                "requested {memory_bytes} bytes exceed available {}",
                memory.available
            )));
        }
        Ok(AdmissionDecision::permit())
    }
}

/// Parses `MemTotal` and `MemAvailable` (kB) out of meminfo text.
fn parse_meminfo(raw: &str) -> Result<CapacityFigures, BudgetProbeError> {
    let mut total_kb: Option<u64> = None;
    let mut available_kb: Option<u64> = None;
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available_kb = parse_kb(rest);
        }
    }
    let total = total_kb
        .ok_or_else(|| BudgetProbeError::Probe("meminfo missing MemTotal".to_string()))?
        .saturating_mul(1024);
    let available = available_kb
        .ok_or_else(|| BudgetProbeError::Probe("meminfo missing MemAvailable".to_string()))?
        .saturating_mul(1024);
    Ok(CapacityFigures {
        total,
        used: total.saturating_sub(available),
        available,
    })
}

/// Parses the numeric kB value of one meminfo line remainder.
fn parse_kb(rest: &str) -> Option<u64> {
    rest.trim().split_whitespace().next().and_then(|digits| digits.parse().ok())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "panic-based assertions are permitted in tests")]

    use super::*;

    const SAMPLE: &str = "MemTotal:       16384000 kB\n\
                          MemFree:         1024000 kB\n\
                          MemAvailable:    8192000 kB\n\
                          Buffers:          204800 kB\n";

    #[test]
    fn parses_total_and_available() {
        let figures = parse_meminfo(SAMPLE).unwrap();
        assert_eq!(figures.total, 16_384_000 * 1024);
        assert_eq!(figures.available, 8_192_000 * 1024);
        assert_eq!(figures.used, figures.total - figures.available);
    }

    #[test]
    fn missing_fields_fail_closed() {
        assert!(parse_meminfo("MemTotal: 1 kB\n").is_err());
        assert!(parse_meminfo("MemAvailable: 1 kB\n").is_err());
        assert!(parse_meminfo("").is_err());
    }

    #[test]
    fn pressure_classification_thresholds() {
        assert_eq!(classify_pressure(0.1), PressureLevel::Low);
        assert_eq!(classify_pressure(0.6), PressureLevel::Medium);
        assert_eq!(classify_pressure(0.8), PressureLevel::High);
        assert_eq!(classify_pressure(0.95), PressureLevel::Critical);
    }
}
