//! Checkpoint storage, one row per replicated namespace.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::{Position, Result, SyncError};
use std::sync::Arc;

/// Persist how far each namespace has been applied to the sink.
///
/// A checkpoint is created once, when the namespace finishes bootstrap, and only moves forward
/// after that.  Implementations are shared between bootstrap workers, so they take `&self`.
pub trait CheckpointStore: Send + Sync {
    /// Return true if a checkpoint exists for `namespace`.
    fn exists(&self, namespace: &str) -> Result<bool>;

    /// Create the checkpoint for `namespace`.
    ///
    /// Fails with [SyncError::CheckpointExists] when it's already there.
    fn add(&self, namespace: &str, position: Position) -> Result<()>;

    /// Last applied position of `namespace`.
    ///
    /// Fails with [SyncError::CheckpointNotFound] when no checkpoint exists.
    fn get_position(&self, namespace: &str) -> Result<Position>;

    /// Move the checkpoint of `namespace` to `position`.
    ///
    /// Fails with [SyncError::CheckpointNotFound] when no checkpoint exists, and with
    /// [SyncError::CheckpointNotAdvanced] when `position` is not after the stored one.
    fn update_position(&self, namespace: &str, position: Position) -> Result<()>;

    /// Release underlying resources.
    fn close(&self) -> Result<()>;
}

impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    fn exists(&self, namespace: &str) -> Result<bool> {
        (**self).exists(namespace)
    }

    fn add(&self, namespace: &str, position: Position) -> Result<()> {
        (**self).add(namespace, position)
    }

    fn get_position(&self, namespace: &str) -> Result<Position> {
        (**self).get_position(namespace)
    }

    fn update_position(&self, namespace: &str, position: Position) -> Result<()> {
        (**self).update_position(namespace, position)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Create checkpoint store by `driver` name.
pub fn new_store(driver: &str, url: &str) -> Result<Box<dyn CheckpointStore>> {
    match driver {
        "postgres" => Ok(Box::new(PgStore::connect(url)?)),
        "memory" => Ok(Box::new(MemoryStore::new())),
        other => Err(SyncError::Config(format!(
            "unknown checkpoint store driver: {}",
            other
        ))),
    }
}
