// crates/modelhost-core/src/runtime/services.rs
// ============================================================================
// Module: Core Services Bundle
// Description: Construction and teardown of the wired control-plane core.
// Purpose: Replace ambient singletons with one explicitly injected bundle.
// Dependencies: crate::bus, crate::core, crate::interfaces, crate::pipeline,
// crate::resource, crate::store
// ============================================================================

//! ## Overview
//! [`CoreServices`] owns every runtime component: registry, bus (in-memory
//! or durable), stores, resource manager, pipeline executor, and gateway.
//! The builder injects the external providers; nothing reaches for process
//! globals. Teardown is explicit and ordered: executor first (cancel
//! in-flight runs), then the bus (drain and join), then the stores with the
//! bundle itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::bus::EventBus;
use crate::bus::memory::DEFAULT_BUFFER_SIZE;
use crate::bus::memory::DEFAULT_WORKER_COUNT;
use crate::bus::memory::InMemoryEventBus;
use crate::bus::persistent::DEFAULT_FLUSH_PERIOD;
use crate::bus::persistent::PersistentEventBus;
use crate::context::Context;
use crate::core::CoreError;
use crate::core::Request;
use crate::core::Response;
use crate::interfaces::EngineProvider;
use crate::interfaces::EventStore;
use crate::interfaces::ResourceBudgetProbe;
use crate::interfaces::RetentionPolicy;
use crate::pipeline::executor::DEFAULT_MAX_CONCURRENT_STEPS;
use crate::pipeline::executor::DEFAULT_STEP_TIMEOUT;
use crate::pipeline::executor::PipelineExecutor;
use crate::resource::manager::DEFAULT_PRESSURE_THRESHOLD;
use crate::resource::manager::ResourceManager;
use crate::runtime::envelope::UnitEnvelope;
use crate::runtime::gateway::DEFAULT_REQUEST_TIMEOUT;
use crate::runtime::gateway::Gateway;
use crate::runtime::registry::UnitRegistry;
use crate::store::ModelStore;
use crate::store::PipelineStore;
use crate::store::RunStore;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Tunable runtime options with the documented defaults.
///
/// # Invariants
/// - Zero-valued sizes are clamped to one at construction sites.
#[derive(Debug, Clone, Copy)]
pub struct CoreOptions {
    /// Default per-request deadline.
    pub request_timeout: Duration,
    /// Event bus channel capacity.
    pub eventbus_buffer_size: usize,
    /// Event bus dispatcher pool size.
    pub eventbus_worker_count: usize,
    /// Durable bus batch flush cadence.
    pub eventbus_flush_period: Duration,
    /// Durable bus retention policy.
    pub eventbus_retention: RetentionPolicy,
    /// Parallelism inside one pipeline run.
    pub max_concurrent_steps: usize,
    /// Per-step deadline.
    pub step_timeout: Duration,
    /// Memory-utilization ratio at which pressure warnings fire.
    pub pressure_threshold: f64,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            eventbus_buffer_size: DEFAULT_BUFFER_SIZE,
            eventbus_worker_count: DEFAULT_WORKER_COUNT,
            eventbus_flush_period: DEFAULT_FLUSH_PERIOD,
            eventbus_retention: RetentionPolicy::default(),
            max_concurrent_steps: DEFAULT_MAX_CONCURRENT_STEPS,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`CoreServices`].
///
/// # Invariants
/// - Providers left unset surface `PROVIDER_NOT_SET` from the units that
///   need them, never a construction failure.
#[derive(Default)]
pub struct CoreServicesBuilder {
    /// Runtime options.
    options: CoreOptions,
    /// Injected budget probe.
    probe: Option<Arc<dyn ResourceBudgetProbe>>,
    /// Injected engine provider.
    engine_provider: Option<Arc<dyn EngineProvider>>,
    /// Durable event store; enables the persistent bus.
    event_store: Option<Arc<dyn EventStore>>,
}

impl CoreServicesBuilder {
    /// Creates a builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the runtime options.
    #[must_use]
    pub fn options(mut self, options: CoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Injects the resource budget probe.
    #[must_use]
    pub fn budget_probe(mut self, probe: Arc<dyn ResourceBudgetProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Injects the engine provider.
    #[must_use]
    pub fn engine_provider(mut self, provider: Arc<dyn EngineProvider>) -> Self {
        self.engine_provider = Some(provider);
        self
    }

    /// Injects a durable event store, upgrading the bus to the persistent
    /// variant.
    #[must_use]
    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// Wires the bundle and registers the built-in unit set.
    ///
    /// # Errors
    ///
    /// Returns `ALREADY_EXISTS` if built-in unit registration collides,
    /// which indicates a programming error in the built-in set.
    pub fn build(self) -> Result<CoreServices, CoreError> {
        let options = self.options;
        let inner =
            InMemoryEventBus::new(options.eventbus_buffer_size, options.eventbus_worker_count);
        let (bus, persistent_bus): (Arc<dyn EventBus>, Option<Arc<PersistentEventBus>>) =
            match self.event_store {
                Some(store) => {
                    let persistent = Arc::new(PersistentEventBus::new(
                        inner,
                        store,
                        options.eventbus_flush_period,
                        options.eventbus_retention,
                    ));
                    (Arc::clone(&persistent) as Arc<dyn EventBus>, Some(persistent))
                }
                None => (Arc::new(inner) as Arc<dyn EventBus>, None),
            };

        let registry = Arc::new(UnitRegistry::new());
        let envelope = UnitEnvelope::new(Arc::clone(&bus));
        let pipelines: Arc<PipelineStore> = Arc::new(PipelineStore::new());
        let runs: Arc<RunStore> = Arc::new(RunStore::new());
        let models: Arc<ModelStore> = Arc::new(ModelStore::new());

        let resources = Arc::new(ResourceManager::new(
            Arc::clone(&bus),
            self.probe,
            options.pressure_threshold,
        ));
        let executor = Arc::new(PipelineExecutor::new(
            Arc::clone(&pipelines),
            Arc::clone(&runs),
            Arc::clone(&registry),
            Arc::clone(&bus),
            options.max_concurrent_steps,
            options.step_timeout,
        ));

        crate::resource::units::register(&registry, &envelope, &resources)?;
        crate::pipeline::units::register(&registry, &envelope, &executor)?;
        crate::model::register(&registry, &envelope, &models)?;
        crate::engine::register(&registry, &envelope, self.engine_provider.as_ref())?;

        let gateway = Gateway::with_timeout(Arc::clone(&registry), options.request_timeout);

        Ok(CoreServices {
            registry,
            bus,
            persistent_bus,
            gateway,
            resources,
            executor,
            pipelines,
            runs,
            models,
        })
    }
}

// ============================================================================
// SECTION: Bundle
// ============================================================================

/// The wired control-plane core.
///
/// # Invariants
/// - Teardown order is executor → bus → stores; [`CoreServices::shutdown`]
///   is idempotent because the bus close is.
pub struct CoreServices {
    /// Unit registry.
    registry: Arc<UnitRegistry>,
    /// Event bus (in-memory or durable).
    bus: Arc<dyn EventBus>,
    /// Durable bus handle when an event store was injected.
    persistent_bus: Option<Arc<PersistentEventBus>>,
    /// Request gateway.
    gateway: Gateway,
    /// Resource slot manager.
    resources: Arc<ResourceManager>,
    /// Pipeline executor.
    executor: Arc<PipelineExecutor>,
    /// Pipeline definitions.
    pipelines: Arc<PipelineStore>,
    /// Run records.
    runs: Arc<RunStore>,
    /// Model catalog.
    models: Arc<ModelStore>,
}

impl CoreServices {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> CoreServicesBuilder {
        CoreServicesBuilder::new()
    }

    /// Dispatches one request through the gateway.
    #[must_use]
    pub fn handle(&self, ctx: &Context, request: Request) -> Response {
        self.gateway.handle(ctx, request)
    }

    /// Returns the unit registry.
    #[must_use]
    pub fn registry(&self) -> Arc<UnitRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns the event bus.
    #[must_use]
    pub fn bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.bus)
    }

    /// Returns the durable bus when one was configured.
    #[must_use]
    pub fn persistent_bus(&self) -> Option<Arc<PersistentEventBus>> {
        self.persistent_bus.as_ref().map(Arc::clone)
    }

    /// Returns the gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Returns the resource manager.
    #[must_use]
    pub fn resources(&self) -> Arc<ResourceManager> {
        Arc::clone(&self.resources)
    }

    /// Returns the pipeline executor.
    #[must_use]
    pub fn executor(&self) -> Arc<PipelineExecutor> {
        Arc::clone(&self.executor)
    }

    /// Returns the pipeline store.
    #[must_use]
    pub fn pipelines(&self) -> Arc<PipelineStore> {
        Arc::clone(&self.pipelines)
    }

    /// Returns the run store.
    #[must_use]
    pub fn runs(&self) -> Arc<RunStore> {
        Arc::clone(&self.runs)
    }

    /// Returns the model catalog.
    #[must_use]
    pub fn models(&self) -> Arc<ModelStore> {
        Arc::clone(&self.models)
    }

    /// Tears the core down: cancel in-flight runs, then drain and close the
    /// bus. Stores drop with the bundle.
    pub fn shutdown(&self) {
        self.executor.cancel_all();
        self.bus.close();
    }
}
