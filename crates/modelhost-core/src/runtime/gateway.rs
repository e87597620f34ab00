// crates/modelhost-core/src/runtime/gateway.rs
// ============================================================================
// Module: Request Gateway
// Description: Single entry point turning requests into unit invocations.
// Purpose: Shape timeouts, correlation, and errors uniformly for callers.
// Dependencies: crate::core, crate::runtime::registry
// ============================================================================

//! ## Overview
//! The gateway is the only supported way for external callers to run units.
//! It resolves the request kind and unit, derives an execution context from
//! the caller's context and the configured default timeout (overridable per
//! request), and wraps the outcome into the uniform [`Response`]. The
//! gateway never mutates the registry and never publishes events itself —
//! lifecycle events come from the envelope around each unit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::core::CoreError;
use crate::core::CorrelationId;
use crate::core::Request;
use crate::core::RequestKind;
use crate::core::Response;
use crate::runtime::registry::UnitRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Single dispatch surface over the unit registry.
///
/// # Invariants
/// - Every response satisfies the `ok`/`error` exclusivity invariant.
/// - The registry is read-only from the gateway's perspective.
pub struct Gateway {
    /// Unit registry consulted for lookups.
    registry: Arc<UnitRegistry>,
    /// Default per-request deadline.
    request_timeout: Duration,
}

impl Gateway {
    /// Creates a gateway with the default request timeout.
    #[must_use]
    pub fn new(registry: Arc<UnitRegistry>) -> Self {
        Self::with_timeout(registry, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a gateway with an explicit default request timeout.
    #[must_use]
    pub fn with_timeout(registry: Arc<UnitRegistry>, request_timeout: Duration) -> Self {
        Self {
            registry,
            request_timeout,
        }
    }

    /// Returns the configured default request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Handles one request end to end.
    #[must_use]
    pub fn handle(&self, ctx: &Context, request: Request) -> Response {
        let Some(kind) = RequestKind::parse(&request.kind) else {
            return Response::failure(CoreError::invalid_request(
                "gateway",
                format!("unknown request kind: {}", request.kind),
            ));
        };

        let unit = match kind {
            RequestKind::Command => self.registry.command(&request.unit),
            RequestKind::Query => self.registry.query(&request.unit),
        };
        let Some(unit) = unit else {
            return Response::failure(CoreError::unit_not_found("gateway", request.unit.as_str()));
        };

        let timeout = request.deadline().unwrap_or(self.request_timeout);
        let correlation_id =
            request.correlation_id.clone().unwrap_or_else(CorrelationId::generate);
        let exec_ctx = ctx.with_correlation_id(correlation_id).with_timeout(timeout);

        if let Err(err) = exec_ctx.check("gateway") {
            return Response::failure(err);
        }

        match unit.execute(&exec_ctx, request.input) {
            Ok(data) => Response::success(data),
            Err(err) => Response::failure(err),
        }
    }
}
