// crates/modelhost-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Event Store
// Description: Durable EventStore over one SQLite database file.
// Purpose: Persist events with indexed queries and transactional batches.
// Dependencies: modelhost-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One writer-serialized connection behind a mutex. Batches are written in a
//! single transaction; queries order by event timestamp ascending and honour
//! the zero-means-unlimited limit; retention pruning removes rows past the
//! configured age or beyond the newest row-count bound. Schema creation is
//! idempotent and versioned through `PRAGMA user_version`: an unexpected
//! version fails closed rather than migrating silently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use modelhost_core::CorrelationId;
use modelhost_core::Event;
use modelhost_core::EventId;
use modelhost_core::Timestamp;
use modelhost_core::interfaces::EventQuery;
use modelhost_core::interfaces::EventStore;
use modelhost_core::interfaces::EventStoreError;
use modelhost_core::interfaces::RetentionPolicy;
use modelhost_core::interfaces::StoredEvent;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the event store.
const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Normative events table and indices.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id             TEXT PRIMARY KEY,
    type           TEXT NOT NULL,
    domain         TEXT NOT NULL,
    correlation_id TEXT,
    payload        BLOB,
    timestamp      INTEGER NOT NULL,
    created_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_domain ON events (domain);
CREATE INDEX IF NOT EXISTS idx_events_type ON events (type);
CREATE INDEX IF NOT EXISTS idx_events_correlation ON events (correlation_id);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events (timestamp);
";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Construction and configuration errors for the `SQLite` event store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteEventStoreError {
    /// Database could not be opened.
    #[error("sqlite event store open error: {0}")]
    Open(String),
    /// Schema version on disk is incompatible.
    #[error("sqlite event store version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version found on disk.
        found: i64,
        /// Version this build expects.
        expected: i64,
    },
    /// Configuration is invalid.
    #[error("sqlite event store invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` event store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteEventStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteEventStoreConfig {
    /// Creates a configuration with defaults for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable event store over one `SQLite` database file.
///
/// # Invariants
/// - Writers are serialized by the connection mutex.
/// - `save_batch` is atomic: either every row of the batch is visible or
///   none is.
pub struct SqliteEventStore {
    /// Writer-serialized connection.
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Opens (creating if needed) the database and ensures the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteEventStoreError`] when the file cannot be opened,
    /// the pragmas fail, or the on-disk schema version is incompatible.
    pub fn open(config: &SqliteEventStoreConfig) -> Result<Self, SqliteEventStoreError> {
        if config.path.is_dir() {
            return Err(SqliteEventStoreError::Invalid(format!(
                "path is a directory: {}",
                config.path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;

        apply_pragmas(&conn, config)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] when the count query fails.
    pub fn len(&self) -> Result<u64, EventStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .map_err(io_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Returns true when no rows are stored.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError`] when the count query fails.
    pub fn is_empty(&self) -> Result<bool, EventStoreError> {
        self.len().map(|count| count == 0)
    }
}

impl EventStore for SqliteEventStore {
    fn save(&self, event: &StoredEvent) -> Result<(), EventStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        insert_row(&conn, event)
    }

    fn save_batch(&self, events: &[StoredEvent]) -> Result<(), EventStoreError> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction().map_err(io_error)?;
        for event in events {
            insert_row(&tx, event)?;
        }
        tx.commit().map_err(io_error)
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut sql = String::from(
            "SELECT id, type, domain, correlation_id, payload, timestamp, created_at \
             FROM events WHERE 1 = 1",
        );
        let mut bindings: Vec<SqlValue> = Vec::new();
        if let Some(event_type) = &query.event_type {
            sql.push_str(" AND type = ?");
            bindings.push(SqlValue::Text(event_type.clone()));
        }
        if let Some(domain) = &query.domain {
            sql.push_str(" AND domain = ?");
            bindings.push(SqlValue::Text(domain.clone()));
        }
        if let Some(correlation_id) = &query.correlation_id {
            sql.push_str(" AND correlation_id = ?");
            bindings.push(SqlValue::Text(correlation_id.as_str().to_string()));
        }
        if let Some(start) = query.start_time {
            sql.push_str(" AND timestamp >= ?");
            bindings.push(SqlValue::Integer(start.as_nanos()));
        }
        if let Some(end) = query.end_time {
            sql.push_str(" AND timestamp <= ?");
            bindings.push(SqlValue::Integer(end.as_nanos()));
        }
        sql.push_str(" ORDER BY timestamp ASC");
        if query.limit > 0 {
            sql.push_str(" LIMIT ?");
            bindings.push(SqlValue::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));
        }

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut statement = conn.prepare(&sql).map_err(io_error)?;
        let rows = statement
            .query_map(rusqlite::params_from_iter(bindings), row_to_event)
            .map_err(io_error)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(io_error)??);
        }
        Ok(events)
    }

    fn get_by_id(&self, id: &EventId) -> Result<StoredEvent, EventStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let row = conn
            .query_row(
                "SELECT id, type, domain, correlation_id, payload, timestamp, created_at \
                 FROM events WHERE id = ?1",
                params![id.as_str()],
                row_to_event,
            )
            .optional()
            .map_err(io_error)?;
        match row {
            Some(event) => event,
            None => Err(EventStoreError::NotFound(id.clone())),
        }
    }

    fn prune(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<u64, EventStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed: usize = 0;
        if let Some(max_age) = policy.max_age {
            let cutoff = now.saturating_sub(max_age);
            removed += conn
                .execute("DELETE FROM events WHERE timestamp < ?1", params![cutoff.as_nanos()])
                .map_err(io_error)?;
        }
        if let Some(max_events) = policy.max_events {
            let keep = i64::try_from(max_events).unwrap_or(i64::MAX);
            removed += conn
                .execute(
                    "DELETE FROM events WHERE id NOT IN \
                     (SELECT id FROM events ORDER BY timestamp DESC, id DESC LIMIT ?1)",
                    params![keep],
                )
                .map_err(io_error)?;
        }
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    conn: &Connection,
    config: &SqliteEventStoreConfig,
) -> Result<(), SqliteEventStoreError> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))
    .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;
    conn.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;
    Ok(())
}

/// Creates the schema on fresh databases and guards the version on others.
fn ensure_schema(conn: &Connection) -> Result<(), SqliteEventStoreError> {
    let found: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;
    match found {
        0 => {
            conn.execute_batch(SCHEMA_DDL)
                .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
                .map_err(|err| SqliteEventStoreError::Open(err.to_string()))?;
            Ok(())
        }
        version if version == SCHEMA_VERSION => Ok(()),
        version => Err(SqliteEventStoreError::VersionMismatch {
            found: version,
            expected: SCHEMA_VERSION,
        }),
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Inserts one row through the given connection.
fn insert_row(conn: &Connection, event: &StoredEvent) -> Result<(), EventStoreError> {
    let payload = serde_json::to_vec(&event.event.payload)
        .map_err(|err| EventStoreError::Serialization(err.to_string()))?;
    conn.execute(
        "INSERT INTO events (id, type, domain, correlation_id, payload, timestamp, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.id.as_str(),
            event.event.event_type,
            event.event.domain,
            event.event.correlation_id.as_ref().map(CorrelationId::as_str),
            payload,
            event.event.timestamp.as_nanos(),
            event.created_at.as_nanos(),
        ],
    )
    .map_err(io_error)?;
    Ok(())
}

/// Maps a result row onto a stored event.
///
/// Returns a nested result so payload decoding failures surface as store
/// errors rather than `rusqlite` errors.
fn row_to_event(row: &Row<'_>) -> Result<Result<StoredEvent, EventStoreError>, rusqlite::Error> {
    let id: String = row.get(0)?;
    let event_type: String = row.get(1)?;
    let domain: String = row.get(2)?;
    let correlation_id: Option<String> = row.get(3)?;
    let payload: Option<Vec<u8>> = row.get(4)?;
    let timestamp: i64 = row.get(5)?;
    let created_at: i64 = row.get(6)?;

    let payload = match payload {
        Some(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => return Ok(Err(EventStoreError::Serialization(err.to_string()))),
        },
        None => serde_json::Value::Null,
    };

    Ok(Ok(StoredEvent {
        id: EventId::new(id),
        event: Event {
            event_type,
            domain,
            payload,
            timestamp: Timestamp::from_nanos(timestamp),
            correlation_id: correlation_id.map(CorrelationId::new),
        },
        created_at: Timestamp::from_nanos(created_at),
    }))
}

/// Maps a `rusqlite` failure onto the store error type.
fn io_error(err: rusqlite::Error) -> EventStoreError {
    EventStoreError::Io(err.to_string())
}
