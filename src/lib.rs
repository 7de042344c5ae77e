//! Mongo to sql sync lib, which keeps tables of a relational database up to date with mongodb
//! collections by tailing the oplog.
//!
//! Every synced collection owns a transformation unit, which turns inserted, updated and
//! deleted documents into sql statements, and a checkpoint, which remembers the last applied
//! oplog position.  A collection without checkpoint is bootstrapped by a full scan before its
//! oplog is tailed.
//!
//! # SqlSyncer example:
//! ```no_run
//! use mongo2sql::sink::{PgSink, Sink};
//! use mongo2sql::state::new_store;
//! use mongo2sql::transform::Registry;
//! use mongo2sql::{Connection, SqlSyncer, SyncOptions};
//! use std::path::Path;
//!
//! let sink_url = "postgres://app@localhost/app";
//! let registry = Registry::load_dir(Path::new("converters"), || {
//!     Ok(Box::new(PgSink::connect(sink_url)?) as Box<dyn Sink>)
//! })
//! .unwrap();
//! let store = new_store("postgres", sink_url).unwrap();
//! let conn = Connection::new("mongodb://localhost:27017").unwrap();
//! let syncer = SqlSyncer::new(conn, store, registry, SyncOptions::default());
//! syncer.sync().unwrap();
//! ```

#[doc(hidden)]
pub mod blocking;
mod change;
pub mod config;
mod error;
pub mod migrations;
mod position;
pub mod sink;
pub mod state;
pub mod transform;
mod value;

/// mongodb internal database which saves oplogs.
const OPLOG_DB: &str = "local";
/// mongodb internal collection which saves oplogs.
const OPLOG_COLL: &str = "oplog.rs";

/// oplog namespace key name.
const NAMESPACE_KEY: &str = "ns";
/// oplog timestamp key name.
const TIMESTAMP_KEY: &str = "ts";
/// oplog operation key name.
const OP_KEY: &str = "op";
/// oplog operation object key name.
const OBJ_KEY: &str = "o";
/// oplog secondary object key name, update operation saves the target `_id` here.
const OBJ2_KEY: &str = "o2";

pub use blocking::{Connection, SqlSyncer, SyncOptions};
pub use change::{ChangeRecord, Operation, DELETE_OP, INSERT_OP, UPDATE_OP};
pub use config::SyncerConfig;
pub use error::{Result, SyncError};
pub use position::Position;
pub use value::{to_fields, Fields, Value};
