use super::source::SnapshotSource;
use crate::state::CheckpointStore;
use crate::transform::{Registry, TransformationUnit};
use crate::{Position, Result, SyncError};
use crossbeam::channel;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{error, info};

/// Result of bootstrapping one namespace, sent back from pool workers.
pub enum BootstrapStatus {
    /// checkpoint was already there, nothing to do.
    Existing(String),
    /// collection is scanned and the checkpoint is added at the cut-over position.
    Done(String, Position),
    Failed(String, SyncError),
}

/// Seeds the sink with current collection contents for namespaces which have no checkpoint.
pub struct Bootstrapper {
    pool: ThreadPool,
}

impl Bootstrapper {
    /// Create bootstrapper which handles at most `concurrent` namespaces at the same time.
    pub fn new(concurrent: usize) -> Result<Bootstrapper> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrent.max(1))
            .thread_name(|i| format!("bootstrap-{}", i))
            .build()
            .map_err(|e| SyncError::Config(format!("can't build bootstrap pool: {}", e)))?;
        Ok(Bootstrapper { pool })
    }

    /// Bootstrap every namespace of `registry`, return the namespaces which own a checkpoint
    /// afterwards, sorted.
    ///
    /// A failed namespace is logged and left without checkpoint, so it's bootstrapped again on
    /// next start.  It never stops other namespaces.
    pub fn bootstrap_all<S>(
        &self,
        source: &S,
        store: &dyn CheckpointStore,
        registry: &mut Registry,
    ) -> Vec<String>
    where
        S: SnapshotSource + ?Sized,
    {
        let (sender, receiver) = channel::unbounded();
        self.pool.scope(|s| {
            for unit in registry.units_mut() {
                let sender = sender.clone();
                s.spawn(move |_| {
                    let ns = unit.full_name().to_string();
                    let status = match bootstrap_one(source, store, unit) {
                        Ok(Some(position)) => BootstrapStatus::Done(ns, position),
                        Ok(None) => BootstrapStatus::Existing(ns),
                        Err(e) => BootstrapStatus::Failed(ns, e),
                    };
                    let _ = sender.send(status);
                });
            }
        });
        drop(sender);

        let mut ready = vec![];
        for status in receiver.iter() {
            match status {
                BootstrapStatus::Existing(ns) => ready.push(ns),
                BootstrapStatus::Done(ns, position) => {
                    info!(namespace = %ns, %position, "Bootstrap: checkpoint added.");
                    ready.push(ns);
                }
                BootstrapStatus::Failed(ns, e) => {
                    error!(namespace = %ns, error = %e, "Bootstrap: failed, will retry on next start.");
                }
            }
        }
        ready.sort();
        ready
    }
}

/// Bootstrap a single namespace.
///
/// Return `None` when the namespace already has a checkpoint, otherwise the cut-over position
/// which is written as the checkpoint.  Changes which happen during the scan are after the
/// cut-over, they are applied again by the sync loop.
pub fn bootstrap_one<S>(
    source: &S,
    store: &dyn CheckpointStore,
    unit: &mut TransformationUnit,
) -> Result<Option<Position>>
where
    S: SnapshotSource + ?Sized,
{
    let ns = unit.full_name().to_string();
    if store.exists(&ns)? {
        info!(namespace = %ns, "Bootstrap: checkpoint exists, skip.");
        return Ok(None);
    }

    let cut_over = source.latest_position()?;
    let start_time = cut_over.to_datetime();
    info!(namespace = %ns, ?start_time, "Bootstrap: begin to scan collection.");
    let mut count: u64 = 0;
    for doc in source.scan(unit.namespace())? {
        unit.handle_insert(doc?)?;
        count += 1;
    }
    info!(namespace = %ns, count, "Bootstrap: scan complete, check oplog and write checkpoint.");

    // everything after the cut-over must still be in oplog, or it can't be replayed.
    let earliest = source.earliest_position()?;
    if cut_over < earliest {
        return Err(SyncError::OplogWindowLost {
            namespace: ns,
            position: cut_over,
            earliest,
        });
    }
    store.add(&ns, cut_over)?;
    Ok(Some(cut_over))
}
