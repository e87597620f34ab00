// crates/modelhost-store-sqlite/tests/sqlite_event_store.rs
// ============================================================================
// Module: SQLite Event Store Tests
// Description: Schema, persistence, queries, retention, and concurrency.
// Purpose: Validate the durable store contract against a real database file.
// Dependencies: modelhost-core, modelhost-store-sqlite, tempfile
// ============================================================================

//! ## Overview
//! Exercises the durable store: round trips through a real database file,
//! timestamp-ascending filtered queries, transactional batches, retention
//! pruning, schema-version guarding, and use as the durable bus backend.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::time::Duration;

use modelhost_core::CorrelationId;
use modelhost_core::Event;
use modelhost_core::EventId;
use modelhost_core::Timestamp;
use modelhost_core::bus::EventBus;
use modelhost_core::bus::InMemoryEventBus;
use modelhost_core::bus::PersistentEventBus;
use modelhost_core::interfaces::EventQuery;
use modelhost_core::interfaces::EventStore;
use modelhost_core::interfaces::EventStoreError;
use modelhost_core::interfaces::RetentionPolicy;
use modelhost_core::interfaces::StoredEvent;
use modelhost_store_sqlite::SqliteEventStore;
use modelhost_store_sqlite::SqliteEventStoreConfig;
use modelhost_store_sqlite::SqliteEventStoreError;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens a fresh store in a temp directory, returning both.
fn fresh_store() -> (SqliteEventStore, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let config = SqliteEventStoreConfig::new(dir.path().join("events.db"));
    let store = SqliteEventStore::open(&config).expect("store opens");
    (store, dir)
}

/// Builds a stored event with explicit correlation and timestamp.
fn row(event_type: &str, correlation: &str, nanos: i64) -> StoredEvent {
    StoredEvent::wrap(
        Event::new(event_type, json!({ "at": nanos }), Some(CorrelationId::new(correlation)))
            .at(Timestamp::from_nanos(nanos)),
    )
}

// ============================================================================
// SECTION: Round Trips
// ============================================================================

#[test]
fn saved_rows_come_back_by_correlation() {
    let (store, _dir) = fresh_store();
    let saved = row("resource.allocated", "c-save", 100);
    store.save(&saved).expect("save");

    let rows = store
        .query(&EventQuery::by_correlation(CorrelationId::new("c-save")))
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, saved.id);
    assert_eq!(rows[0].event.event_type, "resource.allocated");
    assert_eq!(rows[0].event.domain, "resource");
    assert_eq!(rows[0].event.payload, json!({ "at": 100 }));
    assert_eq!(rows[0].event.timestamp.as_nanos(), 100);
}

#[test]
fn get_by_id_round_trips_and_types_missing_rows() {
    let (store, _dir) = fresh_store();
    let saved = row("demo.one", "c-id", 5);
    store.save(&saved).expect("save");

    let fetched = store.get_by_id(&saved.id).expect("found");
    assert_eq!(fetched.event.payload, saved.event.payload);

    let missing = store.get_by_id(&EventId::new("absent"));
    assert!(matches!(missing, Err(EventStoreError::NotFound(_))));
}

#[test]
fn save_batch_is_atomic_and_complete() {
    let (store, _dir) = fresh_store();
    let batch: Vec<StoredEvent> = (1..=10).map(|n| row("demo.batch", "c-batch", n)).collect();
    store.save_batch(&batch).expect("batch");
    assert_eq!(store.len().expect("len"), 10);

    // A duplicate primary key fails the whole batch.
    let mut conflicting = vec![row("demo.batch", "c-batch", 11)];
    conflicting.push(batch[0].clone());
    assert!(store.save_batch(&conflicting).is_err());
    assert_eq!(store.len().expect("len"), 10, "failed batch left no partial rows");
}

// ============================================================================
// SECTION: Queries
// ============================================================================

#[test]
fn queries_filter_and_order_by_timestamp() {
    let (store, _dir) = fresh_store();
    // Inserted out of timestamp order on purpose.
    store.save(&row("alpha.tick", "q", 300)).expect("save");
    store.save(&row("alpha.tick", "q", 100)).expect("save");
    store.save(&row("beta.tock", "q", 200)).expect("save");

    let all = store.query(&EventQuery::default()).expect("query");
    let order: Vec<i64> = all.iter().map(|r| r.event.timestamp.as_nanos()).collect();
    assert_eq!(order, vec![100, 200, 300]);

    let alphas = store
        .query(&EventQuery {
            event_type: Some("alpha.tick".to_string()),
            ..EventQuery::default()
        })
        .expect("query");
    assert_eq!(alphas.len(), 2);

    let betas = store
        .query(&EventQuery {
            domain: Some("beta".to_string()),
            ..EventQuery::default()
        })
        .expect("query");
    assert_eq!(betas.len(), 1);

    let windowed = store
        .query(&EventQuery {
            start_time: Some(Timestamp::from_nanos(150)),
            end_time: Some(Timestamp::from_nanos(300)),
            ..EventQuery::default()
        })
        .expect("query");
    assert_eq!(windowed.len(), 2);

    let limited = store
        .query(&EventQuery {
            limit: 1,
            ..EventQuery::default()
        })
        .expect("query");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].event.timestamp.as_nanos(), 100, "limit keeps the earliest");
}

// ============================================================================
// SECTION: Retention
// ============================================================================

#[test]
fn prune_enforces_row_count_keeping_newest() {
    let (store, _dir) = fresh_store();
    for nanos in 1..=6 {
        store.save(&row("demo.cap", "r", nanos)).expect("save");
    }
    let removed = store
        .prune(
            &RetentionPolicy {
                max_age: None,
                max_events: Some(2),
            },
            Timestamp::now(),
        )
        .expect("prune");
    assert_eq!(removed, 4);
    let rows = store.query(&EventQuery::default()).expect("query");
    let kept: Vec<i64> = rows.iter().map(|r| r.event.timestamp.as_nanos()).collect();
    assert_eq!(kept, vec![5, 6]);
}

#[test]
fn prune_enforces_max_age() {
    let (store, _dir) = fresh_store();
    let now = Timestamp::now();
    let stale = StoredEvent::wrap(
        Event::new("demo.stale", json!({}), None)
            .at(now.saturating_sub(Duration::from_secs(7_200))),
    );
    let fresh = StoredEvent::wrap(Event::new("demo.fresh", json!({}), None).at(now));
    store.save(&stale).expect("save");
    store.save(&fresh).expect("save");

    let removed = store
        .prune(
            &RetentionPolicy {
                max_age: Some(Duration::from_secs(60)),
                max_events: None,
            },
            now,
        )
        .expect("prune");
    assert_eq!(removed, 1);
    let rows = store.query(&EventQuery::default()).expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event.event_type, "demo.fresh");
}

// ============================================================================
// SECTION: Schema Guard
// ============================================================================

#[test]
fn reopening_an_existing_database_succeeds() {
    let dir = TempDir::new().expect("temp dir");
    let config = SqliteEventStoreConfig::new(dir.path().join("events.db"));
    {
        let store = SqliteEventStore::open(&config).expect("first open");
        store.save(&row("demo.persisted", "c", 1)).expect("save");
    }
    let reopened = SqliteEventStore::open(&config).expect("second open");
    assert_eq!(reopened.len().expect("len"), 1);
}

#[test]
fn directory_paths_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let config = SqliteEventStoreConfig::new(dir.path());
    let result = SqliteEventStore::open(&config);
    assert!(matches!(result, Err(SqliteEventStoreError::Invalid(_))));
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn concurrent_writers_never_lose_rows() {
    let (store, _dir) = fresh_store();
    let store = Arc::new(store);
    let mut handles = Vec::new();
    for writer in 0..4_i64 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            for n in 0..25_i64 {
                store
                    .save(&row("demo.parallel", &format!("w{writer}"), writer * 1_000 + n))
                    .expect("save");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("writer thread");
    }
    assert_eq!(store.len().expect("len"), 100);
}

// ============================================================================
// SECTION: Durable Bus Backend
// ============================================================================

#[test]
fn persistent_bus_replays_from_the_sqlite_store() {
    let dir = TempDir::new().expect("temp dir");
    let config = SqliteEventStoreConfig::new(dir.path().join("events.db"));
    let store = Arc::new(SqliteEventStore::open(&config).expect("store opens"));
    let bus = PersistentEventBus::new(
        InMemoryEventBus::new(32, 2),
        Arc::clone(&store) as Arc<dyn EventStore>,
        Duration::from_millis(50),
        RetentionPolicy::default(),
    );

    for nanos in [30_i64, 10, 20] {
        bus.publish(
            Event::new("demo.replayed", json!({ "at": nanos }), Some(CorrelationId::new("c1")))
                .at(Timestamp::from_nanos(nanos)),
        )
        .expect("publish");
    }
    bus.publish(Event::new("demo.other", json!({}), Some(CorrelationId::new("c2"))))
        .expect("publish");

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let delivered = bus
        .replay(&CorrelationId::new("c1"), &move |replayed: &StoredEvent| {
            sink.lock().expect("lock").push(replayed.event.timestamp.as_nanos());
            Ok(())
        })
        .expect("replay");
    assert_eq!(delivered, 3);
    assert_eq!(*seen.lock().expect("lock"), vec![10, 20, 30]);
    bus.close();
}
