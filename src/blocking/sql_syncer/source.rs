//! Collaborators the sync engine reads from.

use bson::Document;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::transform::Namespace;
use crate::{ChangeRecord, Position, Result};

/// Lazy stream of change records, ordered by position.
pub type ChangeStream<'a> = Box<dyn Iterator<Item = Result<ChangeRecord>> + 'a>;
/// Finite stream of documents of one collection.
pub type DocStream<'a> = Box<dyn Iterator<Item = Result<Document>> + 'a>;

/// Range of positions the source still retains.
pub trait OplogWindow {
    /// oldest retained position.
    fn earliest_position(&self) -> Result<Position>;
    /// newest position, the head of the stream.
    fn latest_position(&self) -> Result<Position>;
}

/// Source of live changes.
pub trait ChangeSource: OplogWindow {
    /// Tail changes of `namespaces`.
    ///
    /// The stream has no natural end, it only stops on error, or ends when `shutdown` is set
    /// while it's waiting for new changes.  It can't be rewound to a given position, already
    /// applied changes are filtered by the caller.
    fn tail(
        &self,
        namespaces: &[String],
        shutdown: &Arc<AtomicBool>,
    ) -> Result<ChangeStream<'_>>;
}

/// Source of current collection contents, used by bootstrap.
pub trait SnapshotSource: OplogWindow + Sync {
    /// Scan every document of `namespace`, in the source natural order.
    fn scan(&self, namespace: &Namespace) -> Result<DocStream<'_>>;
}

impl<T: OplogWindow + ?Sized> OplogWindow for &T {
    fn earliest_position(&self) -> Result<Position> {
        (**self).earliest_position()
    }

    fn latest_position(&self) -> Result<Position> {
        (**self).latest_position()
    }
}

impl<T: ChangeSource + ?Sized> ChangeSource for &T {
    fn tail(
        &self,
        namespaces: &[String],
        shutdown: &Arc<AtomicBool>,
    ) -> Result<ChangeStream<'_>> {
        (**self).tail(namespaces, shutdown)
    }
}

impl<T: SnapshotSource + ?Sized> SnapshotSource for &T {
    fn scan(&self, namespace: &Namespace) -> Result<DocStream<'_>> {
        (**self).scan(namespace)
    }
}
