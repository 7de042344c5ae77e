use crate::common::{calls, record, recording_unit, ScriptedSource};
use bson::doc;
use mongo2sql::blocking::{SqlSyncer, SyncOptions};
use mongo2sql::config::UnknownOpPolicy;
use mongo2sql::state::{CheckpointStore, MemoryStore};
use mongo2sql::transform::{Registry, INSERT_HANDLER, UPDATE_HANDLER};
use mongo2sql::{Operation, Position, SyncError};
use std::sync::Arc;

fn options() -> SyncOptions {
    SyncOptions {
        bootstrap_concurrent: 2,
        unknown_operation: UnknownOpPolicy::Fail,
    }
}

#[test]
fn test_bootstrap_then_tail() {
    let source = ScriptedSource::new(Position::new(900, 0), Position::new(1000, 0))
        .with_collection(
            "shop.orders",
            vec![
                doc! {"_id": "X", "total": 9.5},
                doc! {"_id": "Y", "total": 3.0},
            ],
        )
        .with_changes(vec![
            // written during the scan, already covered by the cut-over.
            record(
                "shop.orders",
                Operation::Insert,
                Position::new(999, 0),
                doc! {"_id": "Y", "total": 3.0},
                None,
            ),
            record(
                "shop.orders",
                Operation::Update,
                Position::new(1001, 0),
                doc! {"$set": {"total": 12.0}},
                Some(doc! {"_id": "X"}),
            ),
        ]);
    let store = Arc::new(MemoryStore::new());
    let calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.orders", &calls, None))
        .unwrap();

    let syncer = SqlSyncer::new(source, Box::new(store.clone()), registry, options());
    let result = syncer.sync();

    // scripted oplog ends, a real tail never does.
    assert!(matches!(result, Err(SyncError::StreamClosed)));
    let calls = calls.lock().unwrap();
    let names: Vec<&str> = calls.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec![INSERT_HANDLER, INSERT_HANDLER, UPDATE_HANDLER]);
    assert_eq!(
        store.get_position("shop.orders").unwrap(),
        Position::new(1001, 0)
    );
}

#[test]
fn test_failed_bootstrap_is_not_tailed() {
    let source = ScriptedSource::new(Position::new(900, 0), Position::new(1000, 0))
        .with_collection("shop.orders", vec![doc! {"_id": "X"}])
        .with_collection("shop.users", vec![doc! {"_id": 1, "tags": ["a"]}])
        .with_changes(vec![
            record(
                "shop.users",
                Operation::Insert,
                Position::new(1001, 0),
                doc! {"_id": 2},
                None,
            ),
            record(
                "shop.orders",
                Operation::Insert,
                Position::new(1002, 0),
                doc! {"_id": "Z"},
                None,
            ),
        ]);
    let store = Arc::new(MemoryStore::new());
    let order_calls = calls();
    let user_calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.orders", &order_calls, None))
        .unwrap();
    registry
        .register(recording_unit("shop.users", &user_calls, None))
        .unwrap();

    let syncer = SqlSyncer::new(&source, Box::new(store.clone()), registry, options());
    let result = syncer.sync();

    assert!(matches!(result, Err(SyncError::StreamClosed)));
    assert_eq!(*source.tailed.lock().unwrap(), vec!["shop.orders".to_string()]);
    assert_eq!(order_calls.lock().unwrap().len(), 2);
    assert!(user_calls.lock().unwrap().is_empty());
    assert!(!store.exists("shop.users").unwrap());
    assert_eq!(
        store.get_position("shop.orders").unwrap(),
        Position::new(1002, 0)
    );
}

#[test]
fn test_nothing_to_sync() {
    let source = ScriptedSource::new(Position::new(900, 0), Position::new(1000, 0));
    let syncer = SqlSyncer::new(
        source,
        Box::new(MemoryStore::new()),
        Registry::new(),
        options(),
    );
    assert!(matches!(syncer.sync(), Err(SyncError::NothingToSync)));
}

#[test]
fn test_nothing_bootstrapped() {
    let source = ScriptedSource::new(Position::new(900, 0), Position::new(1000, 0))
        .with_collection("shop.users", vec![doc! {"_id": 1, "tags": ["a"]}]);
    let calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.users", &calls, None))
        .unwrap();

    let syncer = SqlSyncer::new(&source, Box::new(MemoryStore::new()), registry, options());
    assert!(matches!(syncer.sync(), Err(SyncError::NothingToSync)));
    assert!(source.tailed.lock().unwrap().is_empty());
}

#[test]
fn test_shutdown_before_tail() {
    let source = ScriptedSource::new(Position::new(900, 0), Position::new(1000, 0))
        .with_collection("shop.orders", vec![doc! {"_id": "X"}])
        .with_changes(vec![record(
            "shop.orders",
            Operation::Insert,
            Position::new(1001, 0),
            doc! {"_id": "Z"},
            None,
        )]);
    let store = Arc::new(MemoryStore::new());
    let calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.orders", &calls, None))
        .unwrap();

    let syncer = SqlSyncer::new(&source, Box::new(store.clone()), registry, options());
    syncer
        .shutdown_handle()
        .store(true, std::sync::atomic::Ordering::SeqCst);
    syncer.sync().unwrap();

    // bootstrap always completes, only the tail is stopped.
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert_eq!(
        store.get_position("shop.orders").unwrap(),
        Position::new(1000, 0)
    );
}
