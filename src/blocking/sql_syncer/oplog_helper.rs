use crate::{Position, Result, SyncError, TIMESTAMP_KEY};
use bson::{doc, Document};
use mongodb::options::FindOneOptions;
use mongodb::sync::Collection;

enum Natural {
    Earliest,
    Latest,
}

/// position of the oldest entry still retained in oplog collection `coll`.
pub fn get_earliest_position(coll: &Collection<Document>) -> Result<Position> {
    get_one_oplog_position(coll, Natural::Earliest)
}

/// position of the newest entry in oplog collection `coll`.
pub fn get_latest_position(coll: &Collection<Document>) -> Result<Position> {
    get_one_oplog_position(coll, Natural::Latest)
}

fn get_one_oplog_position(coll: &Collection<Document>, natural: Natural) -> Result<Position> {
    let sorted_doc = match natural {
        Natural::Earliest => doc! {"$natural": 1},
        Natural::Latest => doc! {"$natural": -1},
    };

    coll.find_one(None, FindOneOptions::builder().sort(sorted_doc).build())?
        .map(|d| {
            d.get_timestamp(TIMESTAMP_KEY)
                .map(Position::from)
                .map_err(SyncError::BsonError)
        })
        .unwrap_or(Err(SyncError::EmptyDocError))
}
