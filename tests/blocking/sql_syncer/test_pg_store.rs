// Needs a running postgres, run with `cargo test -- --ignored --test-threads=1`.

use mongo2sql::state::{CheckpointStore, PgStore};
use mongo2sql::{Position, SyncError};
use postgres::{Client, NoTls};

fn sink_url() -> &'static str {
    option_env!("SYNCER_TEST_SINK").unwrap_or("postgres://postgres@localhost/postgres")
}

struct Context {
    store: PgStore,
    namespace: String,
}

impl Context {
    fn new(namespace: &str) -> Self {
        let context = Context {
            store: PgStore::connect(sink_url()).unwrap(),
            namespace: namespace.to_string(),
        };
        context.cleanup();
        context
    }

    fn cleanup(&self) {
        let mut client = Client::connect(sink_url(), NoTls).unwrap();
        client
            .execute(
                "DELETE FROM collection_states WHERE name = $1",
                &[&self.namespace],
            )
            .unwrap();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[test]
#[ignore]
fn test_add_then_get() {
    let context = Context::new("syncer_test.add_get");
    let store = &context.store;
    assert!(!store.exists(&context.namespace).unwrap());

    store
        .add(&context.namespace, Position::new(1_600_000_000, 7))
        .unwrap();
    assert!(store.exists(&context.namespace).unwrap());
    assert_eq!(
        store.get_position(&context.namespace).unwrap(),
        Position::new(1_600_000_000, 7)
    );
    assert!(matches!(
        store.add(&context.namespace, Position::new(1_600_000_001, 0)),
        Err(SyncError::CheckpointExists(_))
    ));
}

#[test]
#[ignore]
fn test_update_is_monotonic() {
    let context = Context::new("syncer_test.update");
    let store = &context.store;
    assert!(matches!(
        store.update_position(&context.namespace, Position::new(1000, 0)),
        Err(SyncError::CheckpointNotFound(_))
    ));

    store.add(&context.namespace, Position::new(1000, 0)).unwrap();
    store
        .update_position(&context.namespace, Position::new(1000, 1))
        .unwrap();
    store
        .update_position(&context.namespace, Position::new(1001, 0))
        .unwrap();
    assert!(matches!(
        store.update_position(&context.namespace, Position::new(1000, 5)),
        Err(SyncError::CheckpointNotAdvanced { .. })
    ));
    assert!(matches!(
        store.update_position(&context.namespace, Position::new(1001, 0)),
        Err(SyncError::CheckpointNotAdvanced { .. })
    ));
    assert_eq!(
        store.get_position(&context.namespace).unwrap(),
        Position::new(1001, 0)
    );
}

#[test]
#[ignore]
fn test_closed_store() {
    let context = Context::new("syncer_test.closed");
    context.store.close().unwrap();
    assert!(matches!(
        context.store.exists(&context.namespace),
        Err(SyncError::StoreClosed)
    ));
    context.store.close().unwrap();
}
