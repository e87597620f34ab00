// crates/modelhost-cli/src/main.rs
// ============================================================================
// Module: Modelhost CLI
// Description: Operator binary over config, core, and the durable store.
// Purpose: Validate configuration, dispatch one-shot requests, replay events.
// Dependencies: clap, modelhost-config, modelhost-core, modelhost-providers,
// modelhost-store-sqlite, serde_json, tracing-subscriber
// ============================================================================

//! ## Overview
//! `modelhost` wires an in-process core for one-shot operator commands:
//! `validate-config` checks a configuration file, `request` dispatches a
//! single command/query through the gateway against a freshly wired core,
//! and `events replay` reads the durable store by correlation id. Output is
//! JSON on stdout; diagnostics go to stderr via `tracing`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use modelhost_config::ConfigError;
use modelhost_config::ModelhostConfig;
use modelhost_core::Context;
use modelhost_core::CoreError;
use modelhost_core::CorrelationId;
use modelhost_core::Request;
use modelhost_core::interfaces::EventQuery;
use modelhost_core::interfaces::EventStore;
use modelhost_core::runtime::CoreServices;
use modelhost_providers::ProcfsBudgetProbe;
use modelhost_providers::ProcfsBudgetProbeConfig;
use modelhost_providers::StaticEngineProvider;
use modelhost_store_sqlite::SqliteEventStore;
use modelhost_store_sqlite::SqliteEventStoreConfig;
use modelhost_store_sqlite::SqliteEventStoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Operator CLI for the Modelhost control plane.
#[derive(Debug, Parser)]
#[command(name = "modelhost", version, about = "Modelhost control-plane operator tool")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a configuration file.
    ValidateConfig {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Dispatch one request through an in-process core.
    Request {
        /// Request kind (`command` or `query`).
        #[arg(long, default_value = "command")]
        kind: String,
        /// Target unit name.
        #[arg(long)]
        unit: String,
        /// JSON input mapping.
        #[arg(long, default_value = "{}")]
        input: String,
        /// Optional correlation identifier.
        #[arg(long)]
        correlation_id: Option<String>,
        /// Optional configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Optional durable event store path.
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Event store operations.
    Events {
        /// Event subcommand.
        #[command(subcommand)]
        command: EventsCommand,
    },
}

/// Event store subcommands.
#[derive(Debug, Subcommand)]
enum EventsCommand {
    /// Replay all stored events for one correlation id.
    Replay {
        /// Durable event store path.
        #[arg(long)]
        store: PathBuf,
        /// Correlation identifier to replay.
        #[arg(long)]
        correlation_id: String,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration failure.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// Core failure.
    #[error("core: {0}")]
    Core(#[from] CoreError),
    /// Store open failure.
    #[error("store: {0}")]
    StoreOpen(#[from] SqliteEventStoreError),
    /// Store query failure.
    #[error("store: {0}")]
    Store(#[from] modelhost_core::interfaces::EventStoreError),
    /// Input JSON failure.
    #[error("input: {0}")]
    Input(String),
    /// Output write failure.
    #[error("output: {0}")]
    Output(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Parses arguments and runs the selected subcommand.
fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the parsed subcommand.
fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::ValidateConfig {
            config,
        } => validate_config(&config),
        Command::Request {
            kind,
            unit,
            input,
            correlation_id,
            config,
            store,
        } => request(&kind, &unit, &input, correlation_id, config.as_deref(), store.as_deref()),
        Command::Events {
            command: EventsCommand::Replay {
                store,
                correlation_id,
            },
        } => replay(&store, &correlation_id),
    }
}

// ============================================================================
// SECTION: Subcommands
// ============================================================================

/// Validates a configuration file and reports the resolved values.
fn validate_config(path: &std::path::Path) -> Result<(), CliError> {
    let config = modelhost_config::load_with_env(path)?;
    emit(&serde_json::json!({ "valid": true, "config": config }))
}

/// Wires a one-shot core and dispatches a single request.
fn request(
    kind: &str,
    unit: &str,
    input: &str,
    correlation_id: Option<String>,
    config: Option<&std::path::Path>,
    store: Option<&std::path::Path>,
) -> Result<(), CliError> {
    let config = match config {
        Some(path) => modelhost_config::load_with_env(path)?,
        None => ModelhostConfig::default(),
    };
    let input: serde_json::Value =
        serde_json::from_str(input).map_err(|err| CliError::Input(err.to_string()))?;

    let mut builder = CoreServices::builder()
        .options(config.core_options())
        .budget_probe(Arc::new(ProcfsBudgetProbe::new(ProcfsBudgetProbeConfig::default())))
        .engine_provider(Arc::new(StaticEngineProvider::new()));
    if let Some(path) = store {
        let sqlite = SqliteEventStore::open(&SqliteEventStoreConfig::new(path))?;
        builder = builder.event_store(Arc::new(sqlite) as Arc<dyn EventStore>);
    }
    let core = builder.build()?;

    let mut request = Request {
        kind: kind.to_string(),
        unit: unit.into(),
        input,
        correlation_id: correlation_id.map(CorrelationId::new),
        deadline_ms: None,
    };
    if request.correlation_id.is_none() {
        request.correlation_id = Some(CorrelationId::generate());
    }
    let response = core.handle(&Context::background(), request);
    core.shutdown();
    emit(&serde_json::to_value(&response).map_err(|err| CliError::Output(err.to_string()))?)
}

/// Replays stored events for one correlation id in timestamp order.
fn replay(store: &std::path::Path, correlation_id: &str) -> Result<(), CliError> {
    let store = SqliteEventStore::open(&SqliteEventStoreConfig::new(store))?;
    let rows = store.query(&EventQuery::by_correlation(CorrelationId::new(correlation_id)))?;
    for row in &rows {
        emit(&serde_json::to_value(row).map_err(|err| CliError::Output(err.to_string()))?)?;
    }
    emit(&serde_json::json!({ "replayed": rows.len() }))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes one JSON line to stdout.
fn emit(value: &serde_json::Value) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{value}").map_err(|err| CliError::Output(err.to_string()))
}
