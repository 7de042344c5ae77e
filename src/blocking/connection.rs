use crate::blocking::sql_syncer::oplog_helper;
use crate::blocking::sql_syncer::{
    ChangeSource, ChangeStream, DocStream, OplogWindow, SnapshotSource,
};
use crate::config::TailStart;
use crate::transform::Namespace;
use crate::{ChangeRecord, Position, Result, SyncError};
use crate::{NAMESPACE_KEY, OPLOG_COLL, OPLOG_DB, TIMESTAMP_KEY};
use bson::{doc, Document};
use mongodb::options::{CursorType, FindOptions};
use mongodb::sync::{Client, Collection, Cursor};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const SCAN_BATCH_SIZE: u32 = 10000;
/// wait before re-opening a tail which was closed by server.
const REOPEN_DELAY: Duration = Duration::from_secs(3);
/// how often shutdown flag is checked while waiting to re-open.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
/// Source mongodb connection, reads oplog and collections for the syncer.
pub struct Connection {
    inner: ConnectionInner,
}

impl Connection {
    /// connect to source mongodb `uri`, oplog is read from `local.oplog.rs`.
    pub fn new(uri: &str) -> Result<Connection> {
        Connection::with_oplog_coll(uri, OPLOG_COLL, TailStart::Earliest)
    }

    /// connect to source mongodb `uri`, read oplog from `local.<oplog_coll>` and tail from
    /// `tail_start`.
    pub fn with_oplog_coll(uri: &str, oplog_coll: &str, tail_start: TailStart) -> Result<Connection> {
        let source_conn = Client::with_uri_str(uri)?;
        Ok(Connection {
            inner: ConnectionInner {
                source_conn,
                uri: uri.to_string(),
                oplog_coll: oplog_coll.to_string(),
                tail_start,
            },
        })
    }

    /// Check if we can read oplog and the databases of given `namespaces`.
    pub fn check_permissions(&self, namespaces: &[String]) -> Result<()> {
        let mut db_names: HashSet<&str> = HashSet::new();
        db_names.insert(OPLOG_DB);
        for ns in namespaces.iter() {
            db_names.insert(ns.split_once('.').map_or(ns.as_str(), |(db, _)| db));
        }

        for db_name in db_names {
            if let Err(e) = self
                .inner
                .source_conn
                .database(db_name)
                .list_collection_names(None)
            {
                return Err(SyncError::PermissionError {
                    uri: self.inner.uri.clone(),
                    db: db_name.to_string(),
                    detail: e,
                });
            }
        }
        Ok(())
    }

    /// return collection which saves oplog.
    pub fn oplog_coll(&self) -> Collection<Document> {
        self.inner
            .source_conn
            .database(OPLOG_DB)
            .collection(&self.inner.oplog_coll)
    }
}

#[derive(Clone, Debug)]
struct ConnectionInner {
    source_conn: Client,
    uri: String,
    oplog_coll: String,
    tail_start: TailStart,
}

impl OplogWindow for Connection {
    fn earliest_position(&self) -> Result<Position> {
        oplog_helper::get_earliest_position(&self.oplog_coll())
    }

    fn latest_position(&self) -> Result<Position> {
        oplog_helper::get_latest_position(&self.oplog_coll())
    }
}

impl ChangeSource for Connection {
    fn tail(
        &self,
        namespaces: &[String],
        shutdown: &Arc<AtomicBool>,
    ) -> Result<ChangeStream<'_>> {
        let start = match self.inner.tail_start {
            TailStart::Earliest => self.earliest_position()?,
            TailStart::Latest => self.latest_position()?,
        };
        info!(%start, ?namespaces, "Begin to tail oplog. ");
        let tail = OplogTail {
            coll: self.oplog_coll(),
            namespaces: namespaces.to_vec(),
            last_seen: start,
            inclusive: true,
            cursor: None,
            shutdown: shutdown.clone(),
        };
        Ok(Box::new(tail))
    }
}

impl SnapshotSource for Connection {
    fn scan(&self, namespace: &Namespace) -> Result<DocStream<'_>> {
        let coll = self
            .inner
            .source_conn
            .database(namespace.db_name())
            .collection::<Document>(namespace.coll_name());
        let cursor = coll.find(
            None,
            FindOptions::builder().batch_size(SCAN_BATCH_SIZE).build(),
        )?;
        Ok(Box::new(cursor.map(|doc| doc.map_err(SyncError::from))))
    }
}

/// Tailable oplog cursor which re-opens itself after the last seen entry when the server kills it.
struct OplogTail {
    coll: Collection<Document>,
    namespaces: Vec<String>,
    last_seen: Position,
    // the first cursor includes the start entry.
    inclusive: bool,
    cursor: Option<Cursor<Document>>,
    shutdown: Arc<AtomicBool>,
}

impl OplogTail {
    fn open(&self) -> Result<Cursor<Document>> {
        let ts = bson::Timestamp {
            time: self.last_seen.seconds as u32,
            increment: self.last_seen.ordinal as u32,
        };
        let ts_filter = if self.inclusive {
            doc! {"$gte": ts}
        } else {
            doc! {"$gt": ts}
        };
        let cursor = self.coll.find(
            doc! {
                NAMESPACE_KEY: {"$in": self.namespaces.clone()},
                TIMESTAMP_KEY: ts_filter,
            },
            FindOptions::builder()
                .cursor_type(CursorType::TailableAwait)
                .no_cursor_timeout(true)
                .build(),
        )?;
        Ok(cursor)
    }

    /// Sleep `REOPEN_DELAY`, wake up early when shutdown is requested.
    fn wait_reopen(&self) {
        let deadline = Instant::now() + REOPEN_DELAY;
        while Instant::now() < deadline && !self.shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(SHUTDOWN_POLL);
        }
    }
}

impl Iterator for OplogTail {
    type Item = Result<ChangeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!(last_seen = %self.last_seen, "Shutdown requested, stop tailing oplog.");
                return None;
            }
            if self.cursor.is_none() {
                match self.open() {
                    Ok(cursor) => self.cursor = Some(cursor),
                    Err(e) => return Some(Err(e)),
                }
            }

            let cursor = match self.cursor.as_mut() {
                Some(cursor) => cursor,
                None => continue,
            };
            match cursor.next() {
                Some(Ok(doc)) => {
                    let record = ChangeRecord::from_oplog_doc(doc);
                    if let Ok(r) = &record {
                        self.last_seen = r.position;
                        self.inclusive = false;
                    }
                    return Some(record);
                }
                Some(Err(e)) => return Some(Err(SyncError::from(e))),
                None => {
                    warn!(last_seen = %self.last_seen, "Oplog cursor closed, re-open it later.");
                    self.cursor = None;
                    self.wait_reopen();
                }
            }
        }
    }
}
