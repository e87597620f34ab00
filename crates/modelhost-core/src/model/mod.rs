// crates/modelhost-core/src/model/mod.rs
// ============================================================================
// Module: Model Catalog Units
// Description: The model.* command and query set over the catalog store.
// Purpose: Track models on the host as first-class entities.
// Dependencies: crate::core, crate::store, serde_json
// ============================================================================

//! ## Overview
//! Thin units over the in-memory model catalog. Pulling and conversion are
//! provider concerns outside the core; the catalog records what is (or is
//! about to be) present on the host.

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
use crate::core::ModelRecord;
use crate::core::ModelState;
use crate::core::Timestamp;
use crate::core::Unit;
use crate::core::UnitDescriptor;
use crate::core::decode_input;
use crate::core::encode_output;
use crate::runtime::envelope::UnitEnvelope;
use crate::runtime::registry::UnitRegistry;
use crate::store::ModelStore;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Domain name for the model unit set.
const DOMAIN: &str = "model";

/// Input of `model.register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInput {
    /// Catalog-unique model name.
    pub name: String,
    /// Engine the model targets, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// On-disk size in bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Input of `model.remove` and `model.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameInput {
    /// Catalog model name.
    pub name: String,
}

/// Input of `model.list`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListInput {
    /// Restrict to models targeting one engine, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

/// Output of `model.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOutput {
    /// Matching catalog records.
    pub models: Vec<ModelRecord>,
    /// Number of matching records.
    pub count: usize,
}

// ============================================================================
// SECTION: Units
// ============================================================================

/// `model.register` command.
pub struct RegisterUnit {
    /// Model catalog.
    models: Arc<ModelStore>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl RegisterUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(models: Arc<ModelStore>) -> Self {
        let descriptor =
            UnitDescriptor::new("model.register", "Register a model in the host catalog.")
                .with_schemas(
                    json!({
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "engine": { "type": "string" },
                            "size_bytes": { "type": "integer" }
                        },
                        "required": ["name"]
                    }),
                    json!({ "type": "object" }),
                );
        Self {
            models,
            descriptor,
        }
    }
}

impl Unit for RegisterUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: RegisterInput = decode_input(DOMAIN, input)?;
        if request.name.trim().is_empty() {
            return Err(CoreError::invalid_input(DOMAIN, "name must not be empty"));
        }
        let record = ModelRecord {
            name: request.name,
            engine: request.engine,
            size_bytes: request.size_bytes,
            state: ModelState::Available,
            registered_at: Timestamp::now(),
        };
        self.models
            .create(record.name.clone(), record.clone())
            .map_err(|err| err.into_core(DOMAIN))?;
        encode_output(DOMAIN, &record)
    }
}

/// `model.remove` command.
pub struct RemoveUnit {
    /// Model catalog.
    models: Arc<ModelStore>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl RemoveUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(models: Arc<ModelStore>) -> Self {
        let descriptor =
            UnitDescriptor::new("model.remove", "Remove a model from the host catalog.")
                .with_schemas(
                    json!({
                        "type": "object",
                        "properties": { "name": { "type": "string" } },
                        "required": ["name"]
                    }),
                    json!({ "type": "object" }),
                );
        Self {
            models,
            descriptor,
        }
    }
}

impl Unit for RemoveUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: NameInput = decode_input(DOMAIN, input)?;
        let removed = self.models.delete(&request.name).map_err(|err| err.into_core(DOMAIN))?;
        encode_output(DOMAIN, &removed)
    }
}

/// `model.get` query.
pub struct GetUnit {
    /// Model catalog.
    models: Arc<ModelStore>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl GetUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(models: Arc<ModelStore>) -> Self {
        let descriptor = UnitDescriptor::new("model.get", "Fetch one model catalog record.")
            .with_schemas(
                json!({
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"]
                }),
                json!({ "type": "object" }),
            );
        Self {
            models,
            descriptor,
        }
    }
}

impl Unit for GetUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: NameInput = decode_input(DOMAIN, input)?;
        let record = self.models.get(&request.name).map_err(|err| err.into_core(DOMAIN))?;
        encode_output(DOMAIN, &record)
    }
}

/// `model.list` query.
pub struct ListUnit {
    /// Model catalog.
    models: Arc<ModelStore>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl ListUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(models: Arc<ModelStore>) -> Self {
        let descriptor = UnitDescriptor::new(
            "model.list",
            "List model catalog records, optionally for one engine.",
        )
        .with_schemas(
            json!({
                "type": "object",
                "properties": { "engine": { "type": "string" } }
            }),
            json!({ "type": "object" }),
        );
        Self {
            models,
            descriptor,
        }
    }
}

impl Unit for ListUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, _ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: ListInput = decode_input(DOMAIN, input)?;
        let (models, count) = self
            .models
            .list(|record| request.engine.as_deref().is_none_or(|wanted| {
                record.engine.as_deref() == Some(wanted)
            }));
        encode_output(DOMAIN, &ListOutput {
            models,
            count,
        })
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the model unit set, envelope-wrapped.
///
/// # Errors
///
/// Returns `ALREADY_EXISTS` when any model unit name is taken.
pub fn register(
    registry: &UnitRegistry,
    envelope: &UnitEnvelope,
    models: &Arc<ModelStore>,
) -> Result<(), CoreError> {
    registry.register_command(envelope.wrap(Arc::new(RegisterUnit::new(Arc::clone(models)))))?;
    registry.register_command(envelope.wrap(Arc::new(RemoveUnit::new(Arc::clone(models)))))?;
    registry.register_query(envelope.wrap(Arc::new(GetUnit::new(Arc::clone(models)))))?;
    registry.register_query(envelope.wrap(Arc::new(ListUnit::new(Arc::clone(models)))))?;
    Ok(())
}
