// crates/modelhost-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for modelhost-core tests.
// Purpose: Provide reusable probes, units, and event collectors.
// Dependencies: modelhost-core, serde_json
// ============================================================================

//! ## Overview
//! Provides shared probes, stub units, and an event collector for the core
//! integration tests.

#![allow(
    dead_code,
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only helpers; not every binary uses every helper."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use modelhost_core::AdmissionDecision;
use modelhost_core::BudgetPool;
use modelhost_core::CapacityFigures;
use modelhost_core::Context;
use modelhost_core::CoreError;
use modelhost_core::Event;
use modelhost_core::HostUsage;
use modelhost_core::PressureLevel;
use modelhost_core::ResourceBudgetReport;
use modelhost_core::Unit;
use modelhost_core::UnitDescriptor;
use modelhost_core::bus::EventHandler;
use modelhost_core::interfaces::BudgetProbeError;
use modelhost_core::interfaces::ResourceBudgetProbe;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Event Collector
// ============================================================================

/// Thread-safe collector of delivered events.
#[derive(Clone, Default)]
pub struct EventCollector {
    /// Collected events in delivery order.
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a bus handler appending every delivered event.
    pub fn handler(&self) -> EventHandler {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &Event| {
            events.lock().expect("collector lock").push(event.clone());
            Ok(())
        })
    }

    /// Returns a snapshot of the collected events.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("collector lock").clone()
    }

    /// Returns the number of collected events.
    pub fn count(&self) -> usize {
        self.events.lock().expect("collector lock").len()
    }

    /// Polls until at least `count` events arrived or the timeout elapses.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.count() >= count
    }

    /// Returns the collected event types in delivery order.
    pub fn types(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.event_type).collect()
    }
}

// ============================================================================
// SECTION: Budget Probes
// ============================================================================

/// Gibibyte helper.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Probe with fixed figures and a fixed admission verdict.
pub struct FixedProbe {
    /// Whether admission is granted.
    pub admit: bool,
    /// Refusal reason when admission is denied.
    pub reason: Option<String>,
    /// Memory bytes reported as used.
    pub used: u64,
    /// Memory bytes reported as total.
    pub total: u64,
}

impl FixedProbe {
    /// Probe that admits everything on a lightly used host.
    pub fn admitting() -> Self {
        Self {
            admit: true,
            reason: None,
            used: 4 * GIB,
            total: 16 * GIB,
        }
    }

    /// Probe that refuses everything with the given reason.
    pub fn refusing(reason: &str) -> Self {
        Self {
            admit: false,
            reason: Some(reason.to_string()),
            used: 15 * GIB,
            total: 16 * GIB,
        }
    }
}

impl ResourceBudgetProbe for FixedProbe {
    fn get_status(&self, _ctx: &Context) -> Result<HostUsage, BudgetProbeError> {
        let pressure = if self.used * 10 >= self.total * 9 {
            PressureLevel::Critical
        } else {
            PressureLevel::Low
        };
        Ok(HostUsage {
            memory: CapacityFigures {
                total: self.total,
                used: self.used,
                available: self.total - self.used,
            },
            storage: CapacityFigures {
                total: 512 * GIB,
                used: 128 * GIB,
                available: 384 * GIB,
            },
            pressure,
        })
    }

    fn get_budget(&self, _ctx: &Context) -> Result<ResourceBudgetReport, BudgetProbeError> {
        let mut pools = std::collections::BTreeMap::new();
        pools.insert("memory".to_string(), BudgetPool {
            total: self.total,
            reserved: self.used,
            available: self.total - self.used,
        });
        Ok(ResourceBudgetReport {
            total: self.total,
            reserved: self.used,
            pools,
        })
    }

    fn can_allocate(
        &self,
        _ctx: &Context,
        _memory_bytes: u64,
        _priority: u8,
    ) -> Result<AdmissionDecision, BudgetProbeError> {
        if self.admit {
            Ok(AdmissionDecision::permit())
        } else {
            Ok(AdmissionDecision::refuse(
                self.reason.clone().unwrap_or_else(|| "refused".to_string()),
            ))
        }
    }
}

/// Reserving oracle: admission atomically consumes budget, so concurrent
/// allocations that together exceed the total can never both pass.
pub struct ReservingProbe {
    /// Memory bytes total.
    total: u64,
    /// Memory bytes already committed.
    reserved: Mutex<u64>,
}

impl ReservingProbe {
    /// Creates an oracle over the given total.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            reserved: Mutex::new(0),
        }
    }
}

impl ResourceBudgetProbe for ReservingProbe {
    fn get_status(&self, _ctx: &Context) -> Result<HostUsage, BudgetProbeError> {
        let used = *self.reserved.lock().expect("probe lock");
        Ok(HostUsage {
            memory: CapacityFigures {
                total: self.total,
                used,
                available: self.total.saturating_sub(used),
            },
            storage: CapacityFigures {
                total: 0,
                used: 0,
                available: 0,
            },
            pressure: PressureLevel::Low,
        })
    }

    fn get_budget(&self, _ctx: &Context) -> Result<ResourceBudgetReport, BudgetProbeError> {
        let used = *self.reserved.lock().expect("probe lock");
        Ok(ResourceBudgetReport {
            total: self.total,
            reserved: used,
            pools: std::collections::BTreeMap::new(),
        })
    }

    fn can_allocate(
        &self,
        _ctx: &Context,
        memory_bytes: u64,
        _priority: u8,
    ) -> Result<AdmissionDecision, BudgetProbeError> {
        let mut reserved = self.reserved.lock().expect("probe lock");
        if *reserved + memory_bytes > self.total {
            return Ok(AdmissionDecision::refuse("memory budget exhausted"));
        }
        *reserved += memory_bytes;
        Ok(AdmissionDecision::permit())
    }
}

// ============================================================================
// SECTION: Stub Units
// ============================================================================

/// Unit returning a fixed output.
pub struct StaticUnit {
    /// Descriptor.
    descriptor: UnitDescriptor,
    /// Fixed output value.
    output: Value,
}

impl StaticUnit {
    /// Creates a static unit with the given name and output.
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            descriptor: UnitDescriptor::new(name, "test unit with a fixed output"),
            output,
        }
    }
}

impl Unit for StaticUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, _input: Value) -> Result<Value, CoreError> {
        ctx.check(self.descriptor.domain.as_str())?;
        Ok(self.output.clone())
    }
}

/// Unit echoing its input back.
pub struct EchoUnit {
    /// Descriptor.
    descriptor: UnitDescriptor,
}

impl EchoUnit {
    /// Creates an echo unit with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: UnitDescriptor::new(name, "test unit echoing its input"),
        }
    }
}

impl Unit for EchoUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        Ok(input)
    }
}

/// Unit failing with a typed error.
pub struct FailingUnit {
    /// Descriptor.
    descriptor: UnitDescriptor,
    /// Error returned from every execution.
    error: CoreError,
}

impl FailingUnit {
    /// Creates a failing unit with the given name and error.
    pub fn new(name: &str, error: CoreError) -> Self {
        Self {
            descriptor: UnitDescriptor::new(name, "test unit that always fails"),
            error,
        }
    }
}

impl Unit for FailingUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, _input: Value) -> Result<Value, CoreError> {
        Err(self.error.clone())
    }
}

/// Unit sleeping cooperatively, polling the context.
pub struct SleepUnit {
    /// Descriptor.
    descriptor: UnitDescriptor,
    /// Total sleep duration.
    duration: Duration,
}

impl SleepUnit {
    /// Creates a sleeping unit with the given name and duration.
    pub fn new(name: &str, duration: Duration) -> Self {
        Self {
            descriptor: UnitDescriptor::new(name, "test unit sleeping cooperatively"),
            duration,
        }
    }
}

impl Unit for SleepUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, _input: Value) -> Result<Value, CoreError> {
        let start = Instant::now();
        while start.elapsed() < self.duration {
            ctx.check(self.descriptor.domain.as_str())?;
            std::thread::sleep(Duration::from_millis(2));
        }
        Ok(json!({ "slept_ms": u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX) }))
    }
}

/// Unit recording invocation tags in order.
pub struct TracingUnit {
    /// Descriptor.
    descriptor: UnitDescriptor,
    /// Shared invocation log.
    log: Arc<Mutex<Vec<String>>>,
}

impl TracingUnit {
    /// Creates a tracing unit appending the `tag` input field to the log.
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            descriptor: UnitDescriptor::new(name, "test unit recording invocations"),
            log,
        }
    }
}

impl Unit for TracingUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let tag = input
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or("untagged")
            .to_string();
        self.log.lock().expect("trace lock").push(tag.clone());
        Ok(json!({ "tag": tag }))
    }
}
