// crates/modelhost-core/src/core/unit.rs
// ============================================================================
// Module: Modelhost Unit Contract
// Description: Unit descriptors and the execute contract shared by all units.
// Purpose: Describe every command/query uniformly and type its boundary.
// Dependencies: crate::core::{error, identifiers}, crate::context, serde, serde_json
// ============================================================================

//! ## Overview
//! A unit is a named command or query. Its [`UnitDescriptor`] carries the
//! self-describing metadata (schemas, description, examples) the agent and
//! tooling surface; the [`Unit`] trait is the execute contract. Units are
//! typed records internally: [`decode_input`] and [`encode_output`] convert
//! between the wire mapping and the unit's own serde types, mapping decode
//! failures to `INVALID_INPUT`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::Context;
use crate::core::error::CoreError;
use crate::core::identifiers::UnitName;

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Worked example attached to a unit descriptor.
///
/// # Invariants
/// - `input` and `output` are illustrative only; they are never validated
///   against the schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitExample {
    /// Short description of the example scenario.
    pub description: String,
    /// Example input mapping.
    pub input: Value,
    /// Example output.
    pub output: Value,
}

/// Self-describing unit metadata.
///
/// # Invariants
/// - `domain` equals the portion of `name` before the first `.`.
/// - A registered descriptor is immutable for its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    /// Globally unique unit name.
    pub name: UnitName,
    /// Domain portion of the name.
    pub domain: String,
    /// Informal JSON schema of the input mapping.
    pub input_schema: Value,
    /// Informal JSON schema of the output.
    pub output_schema: Value,
    /// Human-readable description.
    pub description: String,
    /// Worked examples.
    pub examples: Vec<UnitExample>,
}

impl UnitDescriptor {
    /// Creates a descriptor, deriving the domain from the name prefix.
    #[must_use]
    pub fn new(name: impl Into<UnitName>, description: impl Into<String>) -> Self {
        let name = name.into();
        let domain = name.domain().to_string();
        Self {
            name,
            domain,
            input_schema: Value::Null,
            output_schema: Value::Null,
            description: description.into(),
            examples: Vec::new(),
        }
    }

    /// Attaches input and output schemas.
    #[must_use]
    pub fn with_schemas(mut self, input_schema: Value, output_schema: Value) -> Self {
        self.input_schema = input_schema;
        self.output_schema = output_schema;
        self
    }

    /// Appends a worked example.
    #[must_use]
    pub fn with_example(mut self, description: impl Into<String>, input: Value, output: Value) -> Self {
        self.examples.push(UnitExample {
            description: description.into(),
            input,
            output,
        });
        self
    }
}

// ============================================================================
// SECTION: Unit Trait
// ============================================================================

/// Execute contract implemented by every command and query.
///
/// Implementations must honour context cancellation at suspension points and
/// must never panic across the boundary; failures are returned as typed
/// [`CoreError`] values.
pub trait Unit: Send + Sync {
    /// Returns the unit's descriptor.
    fn descriptor(&self) -> &UnitDescriptor;

    /// Executes the unit against the given input mapping.
    ///
    /// # Errors
    ///
    /// Returns a typed [`CoreError`]; see the error taxonomy for the stable
    /// codes a unit may surface.
    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError>;
}

// ============================================================================
// SECTION: Typed Boundary Helpers
// ============================================================================

/// Decodes a wire input mapping into a unit's typed input.
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming the decode failure.
pub fn decode_input<T: DeserializeOwned>(domain: &str, input: Value) -> Result<T, CoreError> {
    serde_json::from_value(input)
        .map_err(|err| CoreError::invalid_input(domain, format!("invalid input: {err}")))
}

/// Encodes a unit's typed output into the wire value.
///
/// # Errors
///
/// Returns `INTERNAL_ERROR` when serialization fails (a unit output type
/// that cannot serialize is a programming error).
pub fn encode_output<T: Serialize>(domain: &str, output: &T) -> Result<Value, CoreError> {
    serde_json::to_value(output)
        .map_err(|err| CoreError::internal(domain, format!("output serialization failed: {err}")))
}
