/// provide mongodb to sql sync blocking apis.
mod connection;
#[doc(hidden)]
pub mod sql_syncer;

pub use connection::Connection;
pub use sql_syncer::{
    bootstrap_one, Bootstrapper, ChangeSource, ChangeStream, DocStream, OplogProcessor,
    OplogWindow, Outcome, SnapshotSource, SqlSyncer, SyncOptions,
};
