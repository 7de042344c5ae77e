use super::source::{ChangeStream, OplogWindow};
use crate::config::UnknownOpPolicy;
use crate::state::CheckpointStore;
use crate::transform::Registry;
use crate::{ChangeRecord, Operation, Result, SyncError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// handler succeeded and the checkpoint moved to the record position.
    Applied,
    /// record is not after the checkpoint, it's already applied.
    Replayed,
    /// unknown operation skipped by policy, checkpoint is unchanged.
    Skipped,
}

/// Applies change records of every registered namespace, one by one in stream order.
pub struct OplogProcessor<'a> {
    store: &'a dyn CheckpointStore,
    unknown_op: UnknownOpPolicy,
    shutdown: Arc<AtomicBool>,
}

impl<'a> OplogProcessor<'a> {
    pub fn new(
        store: &'a dyn CheckpointStore,
        unknown_op: UnknownOpPolicy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        OplogProcessor {
            store,
            unknown_op,
            shutdown,
        }
    }

    /// Consume `stream` until shutdown is requested or an error happens.
    ///
    /// The shutdown flag is checked before pulling the next record, a record which is already
    /// pulled is always handled.  A stream which ends by itself is an error, the oplog tail
    /// only ends early when it sees the shutdown flag while waiting.
    pub fn run(&self, mut stream: ChangeStream<'_>, registry: &mut Registry) -> Result<()> {
        let mut applied: u64 = 0;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!(applied, "Incr state: shutdown requested, stop syncing.");
                return Ok(());
            }

            let record = match stream.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    error!(error = %e, "Incr state: read oplog failed.");
                    return Err(e);
                }
                None if self.shutdown.load(Ordering::SeqCst) => {
                    info!(applied, "Incr state: shutdown requested while waiting oplog, stop syncing.");
                    return Ok(());
                }
                None => {
                    error!(applied, "Incr state: oplog stream is closed.");
                    return Err(SyncError::StreamClosed);
                }
            };

            let namespace = record.namespace.clone();
            let position = record.position;
            let op = record.operation.name().to_string();
            match self.process(record, registry) {
                Ok(Outcome::Applied) => applied += 1,
                Ok(_) => {}
                Err(e) => {
                    error!(%namespace, %position, %op, error = %e, "Incr state: apply oplog failed, stop syncing.");
                    return Err(e);
                }
            }
        }
    }

    /// Apply one change record.
    pub fn process(&self, record: ChangeRecord, registry: &mut Registry) -> Result<Outcome> {
        let ChangeRecord {
            namespace,
            operation,
            position,
            document,
            filter,
        } = record;

        let unit = registry
            .get_mut(&namespace)
            .ok_or_else(|| SyncError::UnknownNamespace(namespace.clone()))?;

        let last_position = self.store.get_position(&namespace)?;
        if !position.is_after(&last_position) {
            debug!(%namespace, %position, %last_position, "Incr state: oplog already applied, skip.");
            return Ok(Outcome::Replayed);
        }

        match operation {
            Operation::Insert => unit.handle_insert(document)?,
            Operation::Update => {
                let filter = filter.ok_or_else(|| SyncError::MissingFilter {
                    namespace: namespace.clone(),
                    op: "update",
                    position,
                })?;
                unit.handle_update(filter, document)?
            }
            Operation::Delete => {
                let filter = filter.ok_or_else(|| SyncError::MissingFilter {
                    namespace: namespace.clone(),
                    op: "delete",
                    position,
                })?;
                unit.handle_delete(filter)?
            }
            Operation::Other(op) => match self.unknown_op {
                UnknownOpPolicy::Fail => {
                    return Err(SyncError::UnknownOperation {
                        namespace,
                        op,
                        position,
                    })
                }
                UnknownOpPolicy::Skip => {
                    warn!(%namespace, %position, %op, "Incr state: unknown oplog operation, skip.");
                    return Ok(Outcome::Skipped);
                }
            },
        }

        self.store.update_position(&namespace, position)?;
        debug!(%namespace, %position, "Incr state: checkpoint advanced.");
        Ok(Outcome::Applied)
    }

    /// Warn about namespaces whose checkpoint fell out of the retained oplog.
    ///
    /// A collection without writes keeps an old checkpoint while oplog rolls over, so it's
    /// not treated as an error.
    pub fn warn_window<W>(&self, source: &W, namespaces: &[String]) -> Result<()>
    where
        W: OplogWindow + ?Sized,
    {
        let earliest = match source.earliest_position() {
            Ok(earliest) => earliest,
            Err(e) => {
                warn!(error = %e, "Incr state: can't read earliest oplog position.");
                return Ok(());
            }
        };
        for ns in namespaces {
            let position = self.store.get_position(ns)?;
            if position < earliest {
                warn!(
                    namespace = %ns,
                    %position,
                    %earliest,
                    "Incr state: checkpoint is older than the oldest oplog, changes may be lost."
                );
            }
        }
        Ok(())
    }
}
