// crates/modelhost-core/src/engine/mod.rs
// ============================================================================
// Module: Engine Units
// Description: The engine.* query set over the injected engine provider.
// Purpose: Expose engine capability lookups through the unit surface.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! Engine lifecycle is a provider concern; the core only passes capability
//! questions through. Without an injected provider, `engine.features`
//! surfaces `PROVIDER_NOT_SET`.

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
use crate::core::Unit;
use crate::core::UnitDescriptor;
use crate::core::decode_input;
use crate::core::encode_output;
use crate::interfaces::EngineError;
use crate::interfaces::EngineProvider;
use crate::runtime::envelope::UnitEnvelope;
use crate::runtime::registry::UnitRegistry;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Domain name for the engine unit set.
const DOMAIN: &str = "engine";

/// Input of `engine.features`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesInput {
    /// Engine name to inspect.
    pub name: String,
}

// ============================================================================
// SECTION: Units
// ============================================================================

/// `engine.features` query.
pub struct FeaturesUnit {
    /// Injected engine provider.
    provider: Option<Arc<dyn EngineProvider>>,
    /// Unit descriptor.
    descriptor: UnitDescriptor,
}

impl FeaturesUnit {
    /// Creates the unit.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn EngineProvider>>) -> Self {
        let descriptor =
            UnitDescriptor::new("engine.features", "Capability report for one inference engine.")
                .with_schemas(
                    json!({
                        "type": "object",
                        "properties": { "name": { "type": "string" } },
                        "required": ["name"]
                    }),
                    json!({ "type": "object" }),
                );
        Self {
            provider,
            descriptor,
        }
    }
}

impl Unit for FeaturesUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let request: FeaturesInput = decode_input(DOMAIN, input)?;
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| CoreError::provider_not_set(DOMAIN, "engine provider"))?;
        let features = provider.get_features(ctx, &request.name).map_err(|err| match err {
            EngineError::UnknownEngine(name) => {
                CoreError::not_found(DOMAIN, format!("unknown engine: {name}"))
            }
            EngineError::Provider(message) => {
                CoreError::internal(DOMAIN, format!("engine provider failed: {message}"))
            }
        })?;
        encode_output(DOMAIN, &features)
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the engine unit set, envelope-wrapped.
///
/// # Errors
///
/// Returns `ALREADY_EXISTS` when any engine unit name is taken.
pub fn register(
    registry: &UnitRegistry,
    envelope: &UnitEnvelope,
    provider: Option<&Arc<dyn EngineProvider>>,
) -> Result<(), CoreError> {
    registry.register_query(envelope.wrap(Arc::new(FeaturesUnit::new(provider.map(Arc::clone)))))?;
    Ok(())
}
