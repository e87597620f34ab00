// crates/modelhost-core/src/resource/units.rs
// ============================================================================
// Module: Resource Units
// Description: The resource.* command and query set over the slot manager.
// Purpose: Expose slot arbitration through the uniform unit surface.
// Dependencies: crate::core, crate::resource::manager, serde_json
// ============================================================================

//! ## Overview
//! Thin typed units delegating to the [`ResourceManager`]. Inputs decode
//! into the manager's request types; outputs are the manager's records
//! serialized back onto the wire. All business rules live in the manager.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::context::Context;
use crate::core::AdmissionDecision;
use crate::core::CoreError;
use crate::core::ResourceSlot;
use crate::core::SlotId;
use crate::core::Unit;
use crate::core::UnitDescriptor;
use crate::core::decode_input;
use crate::core::encode_output;
use crate::resource::manager::AllocateRequest;
use crate::resource::manager::AllocationFilter;
use crate::resource::manager::ResourceManager;
use crate::runtime::envelope::UnitEnvelope;
use crate::runtime::registry::UnitRegistry;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Domain name for the resource unit set.
const DOMAIN: &str = "resource";

/// Output of `resource.allocate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateOutput {
    /// Minted slot identifier.
    pub slot_id: SlotId,
}

/// Input of `resource.release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInput {
    /// Slot to release.
    pub slot_id: SlotId,
}

/// Output of `resource.release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutput {
    /// Released slot identifier.
    pub slot_id: SlotId,
}

/// Output of `resource.allocations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationsOutput {
    /// Matching slot records.
    pub slots: Vec<ResourceSlot>,
    /// Number of matching records.
    pub count: usize,
}

/// Input of `resource.can_allocate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanAllocateInput {
    /// Requested memory in bytes.
    pub memory_bytes: u64,
    /// Arbitration priority; defaults to 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// `resource.allocate` command.
pub struct AllocateUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl AllocateUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor = UnitDescriptor::new(
            "resource.allocate",
            "Allocate a resource slot after admission against the budget probe.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "type": { "enum": ["inference_native", "docker_container", "system_service"] },
                    "memory_bytes": { "type": "integer", "minimum": 1 },
                    "gpu_fraction": { "type": "number", "minimum": 0, "maximum": 1 },
                    "priority": { "type": "integer", "minimum": 0, "maximum": 100 }
                },
                "required": ["name", "type", "memory_bytes"]
            }),
            json!({
                "type": "object",
                "properties": { "slot_id": { "type": "string" } },
                "required": ["slot_id"]
            }),
        )
        .with_example(
            "Reserve 1 GiB for a native engine",
            json!({ "name": "llama-server", "type": "inference_native", "memory_bytes": 1_073_741_824_u64 }),
            json!({ "slot_id": "slot-0f3a..." }),
        );
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for AllocateUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: AllocateRequest = decode_input(DOMAIN, input)?;
        let slot = self.manager.allocate(ctx, &request)?;
        encode_output(DOMAIN, &AllocateOutput {
            slot_id: slot.id,
        })
    }
}

/// `resource.release` command.
pub struct ReleaseUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl ReleaseUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor =
            UnitDescriptor::new("resource.release", "Release a resource slot by identifier.")
                .with_schemas(
                    json!({
                        "type": "object",
                        "properties": { "slot_id": { "type": "string" } },
                        "required": ["slot_id"]
                    }),
                    json!({
                        "type": "object",
                        "properties": { "slot_id": { "type": "string" } },
                        "required": ["slot_id"]
                    }),
                );
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for ReleaseUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: ReleaseInput = decode_input(DOMAIN, input)?;
        let slot = self.manager.release(ctx, &request.slot_id)?;
        encode_output(DOMAIN, &ReleaseOutput {
            slot_id: slot.id,
        })
    }
}

/// `resource.update_slot` command.
pub struct UpdateSlotUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl UpdateSlotUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor = UnitDescriptor::new(
            "resource.update_slot",
            "Patch a slot's memory limit or lifecycle status.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "slot_id": { "type": "string" },
                    "memory_limit": { "type": "integer", "minimum": 1 },
                    "status": { "enum": ["active", "idle", "preempted"] },
                    "reason": { "type": "string" }
                },
                "required": ["slot_id"]
            }),
            json!({ "type": "object" }),
        );
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for UpdateSlotUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let patch = decode_input(DOMAIN, input)?;
        let slot = self.manager.update_slot(ctx, &patch)?;
        encode_output(DOMAIN, &slot)
    }
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// `resource.status` query.
pub struct StatusUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl StatusUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor = UnitDescriptor::new(
            "resource.status",
            "Live memory/storage figures, pressure, and slot records.",
        )
        .with_schemas(json!({ "type": "object" }), json!({ "type": "object" }));
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for StatusUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, _input: Value) -> Result<Value, CoreError> {
        let snapshot = self.manager.status(ctx)?;
        encode_output(DOMAIN, &snapshot)
    }
}

/// `resource.budget` query.
pub struct BudgetUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl BudgetUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor =
            UnitDescriptor::new("resource.budget", "Budget report with per-pool figures.")
                .with_schemas(json!({ "type": "object" }), json!({ "type": "object" }));
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for BudgetUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, _input: Value) -> Result<Value, CoreError> {
        let report = self.manager.budget(ctx)?;
        encode_output(DOMAIN, &report)
    }
}

/// `resource.allocations` query.
pub struct AllocationsUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl AllocationsUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor = UnitDescriptor::new(
            "resource.allocations",
            "Slot records filtered by identifier or workload type.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "slot_id": { "type": "string" },
                    "type": { "enum": ["inference_native", "docker_container", "system_service"] }
                }
            }),
            json!({ "type": "object" }),
        );
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for AllocationsUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let filter: AllocationFilter = decode_input(DOMAIN, input)?;
        let slots = self.manager.list(&filter);
        let count = slots.len();
        encode_output(DOMAIN, &AllocationsOutput {
            slots,
            count,
        })
    }
}

/// `resource.can_allocate` query.
pub struct CanAllocateUnit {
    /// Slot manager.
    manager: Arc<ResourceManager>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl CanAllocateUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(manager: Arc<ResourceManager>) -> Self {
        let descriptor = UnitDescriptor::new(
            "resource.can_allocate",
            "Admission verdict for a hypothetical reservation.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": {
                    "memory_bytes": { "type": "integer", "minimum": 1 },
                    "priority": { "type": "integer", "minimum": 0, "maximum": 100 }
                },
                "required": ["memory_bytes"]
            }),
            json!({ "type": "object" }),
        );
        Self {
            manager,
            descriptor,
        }
    }
}

impl Unit for CanAllocateUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: CanAllocateInput = decode_input(DOMAIN, input)?;
        let decision: AdmissionDecision =
            self.manager.can_allocate(ctx, request.memory_bytes, request.priority)?;
        encode_output(DOMAIN, &decision)
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the full resource unit set, envelope-wrapped.
///
/// # Errors
///
/// Returns `ALREADY_EXISTS` when any resource unit name is taken.
pub fn register(
    registry: &UnitRegistry,
    envelope: &UnitEnvelope,
    manager: &Arc<ResourceManager>,
) -> Result<(), CoreError> {
    registry.register_command(envelope.wrap(Arc::new(AllocateUnit::new(Arc::clone(manager)))))?;
    registry.register_command(envelope.wrap(Arc::new(ReleaseUnit::new(Arc::clone(manager)))))?;
    registry.register_command(envelope.wrap(Arc::new(UpdateSlotUnit::new(Arc::clone(manager)))))?;
    registry.register_query(envelope.wrap(Arc::new(StatusUnit::new(Arc::clone(manager)))))?;
    registry.register_query(envelope.wrap(Arc::new(BudgetUnit::new(Arc::clone(manager)))))?;
    registry.register_query(envelope.wrap(Arc::new(AllocationsUnit::new(Arc::clone(manager)))))?;
    registry.register_query(envelope.wrap(Arc::new(CanAllocateUnit::new(Arc::clone(manager)))))?;
    Ok(())
}
