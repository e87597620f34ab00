// crates/modelhost-core/src/interfaces/mod.rs
// ============================================================================
// Module: Modelhost Interfaces
// Description: Backend-agnostic interfaces for probes, providers, and storage.
// Purpose: Define the contract surfaces the core consumes but never owns.
// Dependencies: crate::core, crate::context, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the core integrates with the host and with domain
//! providers without embedding backend detail. Every method accepts the
//! execution context and must honour its cancellation; implementations fail
//! closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::context::Context;
use crate::core::AdmissionDecision;
use crate::core::CorrelationId;
use crate::core::Event;
use crate::core::EventId;
use crate::core::HostUsage;
use crate::core::ResourceBudgetReport;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Resource Budget Probe
// ============================================================================

/// Budget probe errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BudgetProbeError {
    /// Probe reported an error.
    #[error("budget probe error: {0}")]
    Probe(String),
}

/// Injected interface supplying live resource totals and admission verdicts.
///
/// The slot manager owns no budget logic of its own; the probe is the single
/// source of truth for host capacity and admissibility.
pub trait ResourceBudgetProbe: Send + Sync {
    /// Returns live memory/storage figures and a pressure classification.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetProbeError`] when host state cannot be read.
    fn get_status(&self, ctx: &Context) -> Result<HostUsage, BudgetProbeError>;

    /// Returns the budget report with per-pool figures.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetProbeError`] when host state cannot be read.
    fn get_budget(&self, ctx: &Context) -> Result<ResourceBudgetReport, BudgetProbeError>;

    /// Decides whether a reservation of `memory_bytes` at `priority` fits.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetProbeError`] when the decision cannot be computed;
    /// a refusal is a successful `AdmissionDecision`, not an error.
    fn can_allocate(
        &self,
        ctx: &Context,
        memory_bytes: u64,
        priority: u8,
    ) -> Result<AdmissionDecision, BudgetProbeError>;
}

// ============================================================================
// SECTION: Inference Provider
// ============================================================================

/// Inference provider errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Provider reported an error.
    #[error("inference provider error: {0}")]
    Provider(String),
    /// The provider does not implement the requested operation.
    #[error("inference operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Request passed to every inference operation.
///
/// # Invariants
/// - `input` and `options` are provider-interpreted; the core never reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Target model name.
    pub model: String,
    /// Operation input (messages, prompt, media reference, ...).
    pub input: Value,
    /// Provider-specific options.
    #[serde(default)]
    pub options: Value,
}

/// Response returned by inference operations.
///
/// # Invariants
/// - `output` shape is operation-specific and provider-interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// Operation output.
    pub output: Value,
    /// Optional usage accounting (tokens, duration, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

/// Injected inference backend consumed by the inference front-end.
///
/// Every operation is context-aware; the default implementations refuse with
/// [`InferenceError::Unsupported`] so backends implement only what they
/// actually serve.
pub trait InferenceProvider: Send + Sync {
    /// Chat-style generation.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn chat(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("chat"))
    }

    /// Plain completion.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn complete(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("complete"))
    }

    /// Text embedding.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn embed(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("embed"))
    }

    /// Speech-to-text transcription.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn transcribe(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("transcribe"))
    }

    /// Text-to-speech synthesis.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn synthesize(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("synthesize"))
    }

    /// Image generation.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn generate_image(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("generate_image"))
    }

    /// Video generation.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn generate_video(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("generate_video"))
    }

    /// Document reranking.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn rerank(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("rerank"))
    }

    /// Object detection.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] on provider failure or unsupported operation.
    fn detect(&self, ctx: &Context, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let _ = (ctx, request);
        Err(InferenceError::Unsupported("detect"))
    }
}

// ============================================================================
// SECTION: Engine Provider
// ============================================================================

/// Engine provider errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Provider reported an error.
    #[error("engine provider error: {0}")]
    Provider(String),
    /// The named engine is unknown to the provider.
    #[error("unknown engine: {0}")]
    UnknownEngine(String),
}

/// Feature report for one inference engine.
///
/// # Invariants
/// - Feature keys are provider-defined and stable per provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFeatures {
    /// Engine name.
    pub engine: String,
    /// Capability map (key → provider-defined value).
    pub features: std::collections::BTreeMap<String, Value>,
}

/// Injected engine lifecycle backend.
pub trait EngineProvider: Send + Sync {
    /// Returns the feature report for the named engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on provider failure or unknown engine.
    fn get_features(&self, ctx: &Context, name: &str) -> Result<EngineFeatures, EngineError>;
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// Event store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Store I/O error.
    #[error("event store io error: {0}")]
    Io(String),
    /// Row serialization or deserialization failure.
    #[error("event store serialization error: {0}")]
    Serialization(String),
    /// No row exists for the identifier.
    #[error("event not found: {0}")]
    NotFound(EventId),
    /// Query or row data is invalid.
    #[error("event store invalid data: {0}")]
    Invalid(String),
}

/// Persisted event row: the event plus its store-assigned identity.
///
/// # Invariants
/// - `id` is unique within the store; `created_at` is the insertion stamp,
///   distinct from the event's own publication timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Store-assigned event identifier.
    pub id: EventId,
    /// The persisted event.
    pub event: Event,
    /// Row insertion timestamp.
    pub created_at: Timestamp,
}

impl StoredEvent {
    /// Wraps an event into a row with a fresh identifier, stamped now.
    #[must_use]
    pub fn wrap(event: Event) -> Self {
        Self {
            id: EventId::generate(),
            event,
            created_at: Timestamp::now(),
        }
    }
}

/// Filter for historical event queries.
///
/// # Invariants
/// - Absent fields do not constrain the query; `limit == 0` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventQuery {
    /// Exact event type to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Exact domain to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Correlation identifier to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Inclusive lower bound on the event timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    /// Inclusive upper bound on the event timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Maximum rows to return; zero means unlimited.
    #[serde(default)]
    pub limit: usize,
}

impl EventQuery {
    /// Builds a query matching all events for one correlation identifier.
    #[must_use]
    pub fn by_correlation(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            ..Self::default()
        }
    }

    /// Returns true when the given event satisfies every present filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.event_type.as_ref().is_some_and(|wanted| *wanted != event.event_type) {
            return false;
        }
        if self.domain.as_ref().is_some_and(|wanted| *wanted != event.domain) {
            return false;
        }
        if self
            .correlation_id
            .as_ref()
            .is_some_and(|wanted| event.correlation_id.as_ref() != Some(wanted))
        {
            return false;
        }
        if self.start_time.is_some_and(|start| event.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        true
    }
}

/// Retention policy enforced lazily by durable stores.
///
/// # Invariants
/// - Absent bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    /// Maximum event age.
    pub max_age: Option<Duration>,
    /// Maximum row count.
    pub max_events: Option<u64>,
}

impl RetentionPolicy {
    /// Returns true when neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.max_age.is_none() && self.max_events.is_none()
    }
}

/// Durable, append-only event log keyed for replay.
pub trait EventStore: Send + Sync {
    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] when the append fails.
    fn save(&self, event: &StoredEvent) -> Result<(), EventStoreError>;

    /// Appends many rows in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] when the batch fails; no partial batch
    /// is visible afterwards.
    fn save_batch(&self, events: &[StoredEvent]) -> Result<(), EventStoreError>;

    /// Returns matching rows ordered by event timestamp ascending.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] when the query fails.
    fn query(&self, query: &EventQuery) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Returns the row with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::NotFound`] when no such row exists.
    fn get_by_id(&self, id: &EventId) -> Result<StoredEvent, EventStoreError>;

    /// Applies the retention policy, returning the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] when pruning fails.
    fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, EventStoreError>;
}
