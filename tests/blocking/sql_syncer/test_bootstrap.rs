use crate::common::{calls, recording_unit, ScriptedSource};
use bson::doc;
use mongo2sql::blocking::{bootstrap_one, Bootstrapper};
use mongo2sql::state::{CheckpointStore, MemoryStore};
use mongo2sql::transform::{NativeValue, Registry, INSERT_HANDLER};
use mongo2sql::{Position, SyncError};

fn orders_source() -> ScriptedSource {
    ScriptedSource::new(Position::new(900, 0), Position::new(1000, 0)).with_collection(
        "shop.orders",
        vec![
            doc! {"_id": "X", "total": 9.5},
            doc! {"_id": "Y", "total": 3.0},
        ],
    )
}

#[test]
fn test_bootstrap_scans_then_adds_checkpoint() {
    let source = orders_source();
    let store = MemoryStore::new();
    let calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.orders", &calls, None))
        .unwrap();

    let ready = Bootstrapper::new(2)
        .unwrap()
        .bootstrap_all(&source, &store, &mut registry);

    assert_eq!(ready, vec!["shop.orders".to_string()]);
    assert!(store.exists("shop.orders").unwrap());
    assert_eq!(
        store.get_position("shop.orders").unwrap(),
        Position::new(1000, 0)
    );

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(name, _)| *name == INSERT_HANDLER));
    assert_eq!(
        calls[0].1[0].lookup(["_id"]),
        Some(&NativeValue::String("X".to_string()))
    );
    assert_eq!(
        calls[1].1[0].lookup(["total"]),
        Some(&NativeValue::Number(3.0))
    );
}

#[test]
fn test_bootstrap_twice_is_noop() {
    let source = orders_source();
    let store = MemoryStore::new();
    let calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.orders", &calls, None))
        .unwrap();
    let bootstrapper = Bootstrapper::new(1).unwrap();

    bootstrapper.bootstrap_all(&source, &store, &mut registry);
    assert_eq!(calls.lock().unwrap().len(), 2);

    let ready = bootstrapper.bootstrap_all(&source, &store, &mut registry);
    assert_eq!(ready, vec!["shop.orders".to_string()]);
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert_eq!(
        store.get_position("shop.orders").unwrap(),
        Position::new(1000, 0)
    );
}

#[test]
fn test_existing_checkpoint_is_kept() {
    let source = orders_source();
    let store = MemoryStore::new();
    store.add("shop.orders", Position::new(1200, 3)).unwrap();
    let calls = calls();
    let mut unit = recording_unit("shop.orders", &calls, None);

    let result = bootstrap_one(&source, &store, &mut unit).unwrap();
    assert_eq!(result, None);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(
        store.get_position("shop.orders").unwrap(),
        Position::new(1200, 3)
    );
}

#[test]
fn test_failed_namespace_does_not_block_others() {
    // arrays are not supported, the first users document fails translation.
    let source = orders_source().with_collection(
        "shop.users",
        vec![doc! {"_id": 1, "tags": ["a", "b"]}, doc! {"_id": 2}],
    );
    let store = MemoryStore::new();
    let order_calls = calls();
    let user_calls = calls();
    let mut registry = Registry::new();
    registry
        .register(recording_unit("shop.orders", &order_calls, None))
        .unwrap();
    registry
        .register(recording_unit("shop.users", &user_calls, None))
        .unwrap();

    let ready = Bootstrapper::new(2)
        .unwrap()
        .bootstrap_all(&source, &store, &mut registry);

    assert_eq!(ready, vec!["shop.orders".to_string()]);
    assert!(store.exists("shop.orders").unwrap());
    assert!(!store.exists("shop.users").unwrap());
    assert_eq!(order_calls.lock().unwrap().len(), 2);
    // scan stops at the first failure.
    assert!(user_calls.lock().unwrap().is_empty());
}

#[test]
fn test_handler_failure_leaves_no_checkpoint() {
    let source = orders_source();
    let store = MemoryStore::new();
    let calls = calls();
    let mut unit = recording_unit("shop.orders", &calls, Some(INSERT_HANDLER));

    let result = bootstrap_one(&source, &store, &mut unit);
    assert!(matches!(result, Err(SyncError::Handler { .. })));
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert!(!store.exists("shop.orders").unwrap());
}

#[test]
fn test_oplog_rolled_over_during_scan() {
    // oldest retained oplog is already after the cut-over when the scan ends.
    let mut source = orders_source();
    source.earliest = Position::new(1000, 1);
    let store = MemoryStore::new();
    let calls = calls();
    let mut unit = recording_unit("shop.orders", &calls, None);

    let result = bootstrap_one(&source, &store, &mut unit);
    match result {
        Err(SyncError::OplogWindowLost {
            namespace,
            position,
            earliest,
        }) => {
            assert_eq!(namespace, "shop.orders");
            assert_eq!(position, Position::new(1000, 0));
            assert_eq!(earliest, Position::new(1000, 1));
        }
        other => panic!("expect oplog window lost, get {:?}", other),
    }
    assert!(!store.exists("shop.orders").unwrap());
}

#[test]
fn test_empty_collection_still_gets_checkpoint() {
    let source = ScriptedSource::new(Position::new(10, 0), Position::new(20, 5));
    let store = MemoryStore::new();
    let calls = calls();
    let mut unit = recording_unit("shop.empty", &calls, None);

    let result = bootstrap_one(&source, &store, &mut unit).unwrap();
    assert_eq!(result, Some(Position::new(20, 5)));
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(
        store.get_position("shop.empty").unwrap(),
        Position::new(20, 5)
    );
}
