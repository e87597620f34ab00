// crates/modelhost-core/src/runtime/envelope.rs
// ============================================================================
// Module: Unit Execution Envelope
// Description: Lifecycle event wrapper around every unit execution.
// Purpose: Publish started/completed/failed events with payload digests.
// Dependencies: crate::bus, crate::core, crate::hashing, tracing
// ============================================================================

//! ## Overview
//! The envelope is the only path that publishes unit lifecycle events. Every
//! registered unit is wrapped at registration time, so gateway calls and
//! pipeline steps alike emit `<unit>.started` before user code runs,
//! `<unit>.completed` on success, and `<unit>.failed` on failure. Lifecycle
//! publication is best-effort: a publish failure is logged and swallowed,
//! never surfaced to the caller. Payloads are digested, not embedded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use crate::bus::EventBus;
use crate::context::Context;
use crate::core::CoreError;
use crate::core::Unit;
use crate::core::UnitDescriptor;
use crate::core::event::Event;
use crate::hashing::digest_value;

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Factory wrapping units with lifecycle event publication.
///
/// # Invariants
/// - Wrapped units are the only source of `started`/`completed`/`failed`
///   lifecycle events.
pub struct UnitEnvelope {
    /// Bus lifecycle events are published on.
    bus: Arc<dyn EventBus>,
}

impl UnitEnvelope {
    /// Creates an envelope publishing on the given bus.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
        }
    }

    /// Wraps a unit so its executions publish lifecycle events.
    #[must_use]
    pub fn wrap(&self, unit: Arc<dyn Unit>) -> Arc<dyn Unit> {
        Arc::new(EnvelopedUnit {
            inner: unit,
            bus: Arc::clone(&self.bus),
        })
    }
}

/// A unit wrapped with lifecycle publication.
struct EnvelopedUnit {
    /// The wrapped unit.
    inner: Arc<dyn Unit>,
    /// Bus lifecycle events are published on.
    bus: Arc<dyn EventBus>,
}

impl Unit for EnvelopedUnit {
    fn descriptor(&self) -> &UnitDescriptor {
        self.inner.descriptor()
    }

    fn execute(&self, ctx: &Context, input: Value) -> Result<Value, CoreError> {
        let name = self.descriptor().name.clone();
        publish_lifecycle(
            &self.bus,
            ctx,
            &format!("{name}.started"),
            json!({ "input_digest": digest_value(&input) }),
        );

        match self.inner.execute(ctx, input) {
            Ok(output) => {
                publish_lifecycle(
                    &self.bus,
                    ctx,
                    &format!("{name}.completed"),
                    json!({ "output_digest": digest_value(&output) }),
                );
                Ok(output)
            }
            Err(err) => {
                publish_lifecycle(
                    &self.bus,
                    ctx,
                    &format!("{name}.failed"),
                    json!({
                        "error": {
                            "code": err.code.as_str(),
                            "domain": &err.domain,
                            "message": &err.message,
                        }
                    }),
                );
                Err(err)
            }
        }
    }
}

// ============================================================================
// SECTION: Publication
// ============================================================================

/// Publishes one lifecycle event, logging and swallowing failures.
fn publish_lifecycle(bus: &Arc<dyn EventBus>, ctx: &Context, event_type: &str, payload: Value) {
    let event = Event::new(event_type, payload, Some(ctx.correlation_id().clone()));
    if let Err(err) = bus.publish(event) {
        tracing::debug!(event_type, error = %err, "lifecycle publish failed");
    }
}
