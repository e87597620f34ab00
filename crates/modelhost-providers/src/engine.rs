// crates/modelhost-providers/src/engine.rs
// ============================================================================
// Module: Engine Capability Provider
// Description: Static engine feature maps for the engine.* units.
// Purpose: Answer capability lookups from configured data.
// Dependencies: modelhost-core, serde_json
// ============================================================================

//! ## Overview
//! A configured map from engine name to feature map. Useful for hosts whose
//! engine roster is known at deployment time and for tests; a process-probing
//! provider would implement the same trait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use modelhost_core::Context;
use modelhost_core::interfaces::EngineError;
use modelhost_core::interfaces::EngineFeatures;
use modelhost_core::interfaces::EngineProvider;
use serde_json::Value;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Engine provider answering from a configured feature table.
///
/// # Invariants
/// - Unknown engine names fail closed with [`EngineError::UnknownEngine`].
#[derive(Debug, Clone, Default)]
pub struct StaticEngineProvider {
    /// Feature maps keyed by engine name.
    engines: BTreeMap<String, BTreeMap<String, Value>>,
}

impl StaticEngineProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) one engine's feature map.
    #[must_use]
    pub fn with_engine(
        mut self,
        name: impl Into<String>,
        features: BTreeMap<String, Value>,
    ) -> Self {
        self.engines.insert(name.into(), features);
        self
    }

    /// Returns the configured engine names.
    #[must_use]
    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }
}

impl EngineProvider for StaticEngineProvider {
    fn get_features(&self, _ctx: &Context, name: &str) -> Result<EngineFeatures, EngineError> {
        self.engines
            .get(name)
            .map(|features| EngineFeatures {
                engine: name.to_string(),
                features: features.clone(),
            })
            .ok_or_else(|| EngineError::UnknownEngine(name.to_string()))
    }
}
