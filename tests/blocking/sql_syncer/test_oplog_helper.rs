// Needs a running mongodb, run with `cargo test -- --ignored`.

use bson::{doc, Document, Timestamp};
use mongodb::options::CreateCollectionOptions;
use mongodb::sync::{Client, Collection};

use mongo2sql::blocking::sql_syncer::oplog_helper::{get_earliest_position, get_latest_position};
use mongo2sql::{Position, SyncError};

struct Context {
    pub client: Client,
    pub capped_coll: Collection<Document>,
}

impl Context {
    pub fn new(db_name: &str) -> Self {
        let client = Client::with_uri_str(
            option_env!("SYNCER_TEST_SOURCE").unwrap_or("mongodb://localhost:27017"),
        )
        .unwrap();
        let db = client.database(db_name);
        db.create_collection(
            "syncer_test_capped",
            CreateCollectionOptions::builder()
                .capped(true)
                .size(4096)
                .build(),
        )
        .unwrap();
        let capped_coll = db.collection::<Document>("syncer_test_capped");
        Context {
            client,
            capped_coll,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let db_name = self.capped_coll.namespace().db;
        self.client.database(&db_name).drop(None).unwrap();
    }
}

fn insert_two(coll: &Collection<Document>) {
    coll.insert_many(
        vec![
            doc! {"a": 1, "ts": Timestamp{time: 10, increment: 0}},
            doc! {"b": 3, "ts": Timestamp{time: 13, increment: 10}},
        ],
        None,
    )
    .unwrap();
}

#[test]
#[ignore]
fn test_get_earliest_position() {
    let context = Context::new("syncer_test_earliest");
    insert_two(&context.capped_coll);
    let earliest = get_earliest_position(&context.capped_coll).unwrap();
    assert_eq!(earliest, Position::new(10, 0));
}

#[test]
#[ignore]
fn test_get_latest_position() {
    let context = Context::new("syncer_test_latest");
    insert_two(&context.capped_coll);
    let latest = get_latest_position(&context.capped_coll).unwrap();
    assert_eq!(latest, Position::new(13, 10));
}

#[test]
#[ignore]
fn test_get_position_when_oplog_not_exists() {
    let context = Context::new("syncer_test_empty");
    assert!(matches!(
        get_earliest_position(&context.capped_coll),
        Err(SyncError::EmptyDocError)
    ));
    assert!(matches!(
        get_latest_position(&context.capped_coll),
        Err(SyncError::EmptyDocError)
    ));
}
