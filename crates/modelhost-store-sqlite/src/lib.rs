// crates/modelhost-store-sqlite/src/lib.rs
// ============================================================================
// Module: Modelhost SQLite Store
// Description: Durable event store backed by SQLite WAL.
// Purpose: Persist the event log with indexed replay by correlation id.
// Dependencies: modelhost-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `modelhost-store-sqlite` implements the core [`modelhost_core::interfaces::EventStore`]
//! over a single `SQLite` database file. The schema is the normative events
//! table with its four indices; the store owns schema creation and guards it
//! with the `user_version` pragma.

/// SQLite event store implementation.
pub mod store;

pub use store::SqliteEventStore;
pub use store::SqliteEventStoreConfig;
pub use store::SqliteEventStoreError;
pub use store::SqliteJournalMode;
pub use store::SqliteSyncMode;
