mod bootstrap;
#[doc(hidden)]
pub mod oplog_helper;
mod processor;
mod source;
mod syncer;

pub use bootstrap::{bootstrap_one, BootstrapStatus, Bootstrapper};
pub use processor::{OplogProcessor, Outcome};
pub use source::{ChangeSource, ChangeStream, DocStream, OplogWindow, SnapshotSource};
pub use syncer::{SqlSyncer, SyncOptions};
