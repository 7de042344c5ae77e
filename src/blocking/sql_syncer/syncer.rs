use super::bootstrap::Bootstrapper;
use super::processor::OplogProcessor;
use super::source::{ChangeSource, SnapshotSource};
use crate::config::{SyncerConfig, UnknownOpPolicy};
use crate::state::CheckpointStore;
use crate::transform::Registry;
use crate::{Result, SyncError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Tunables of [SqlSyncer].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// how many namespaces are bootstrapped concurrently.
    pub bootstrap_concurrent: usize,
    pub unknown_operation: UnknownOpPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            bootstrap_concurrent: num_cpus::get(),
            unknown_operation: UnknownOpPolicy::Fail,
        }
    }
}

impl From<&SyncerConfig> for SyncOptions {
    fn from(conf: &SyncerConfig) -> Self {
        SyncOptions {
            bootstrap_concurrent: conf.get_bootstrap_concurrent(),
            unknown_operation: conf.get_unknown_operation(),
        }
    }
}

/// Sync mongodb collections into sql database.
///
/// First bootstrap every registered namespace without checkpoint, then tail oplog of the
/// bootstrapped namespaces forever.
pub struct SqlSyncer<S> {
    source: S,
    store: Box<dyn CheckpointStore>,
    registry: Registry,
    options: SyncOptions,
    shutdown: Arc<AtomicBool>,
}

impl<S> SqlSyncer<S>
where
    S: ChangeSource + SnapshotSource,
{
    pub fn new(
        source: S,
        store: Box<dyn CheckpointStore>,
        registry: Registry,
        options: SyncOptions,
    ) -> SqlSyncer<S> {
        SqlSyncer {
            source,
            store,
            registry,
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag which stops the sync loop before the next oplog is pulled once it's set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Bootstrap namespaces without checkpoint, return namespaces which are ready to tail.
    pub fn bootstrap(&mut self) -> Result<Vec<String>> {
        let bootstrapper = Bootstrapper::new(self.options.bootstrap_concurrent)?;
        info!(namespaces = ?self.registry.names(), "Full state: begin to bootstrap.");
        let ready = bootstrapper.bootstrap_all(&self.source, &*self.store, &mut self.registry);
        info!(?ready, "Full state: bootstrap complete.");
        Ok(ready)
    }

    /// Run bootstrap and the oplog sync loop, the checkpoint store is closed when it returns.
    pub fn sync(mut self) -> Result<()> {
        let result = self.sync_inner();
        let closed = self.store.close();
        match (result, closed) {
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Close checkpoint store failed.");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), closed) => closed,
        }
    }

    fn sync_inner(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            return Err(SyncError::NothingToSync);
        }
        let ready = self.bootstrap()?;
        if ready.is_empty() {
            return Err(SyncError::NothingToSync);
        }
        if self.shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested after bootstrap.");
            return Ok(());
        }

        let processor = OplogProcessor::new(
            &*self.store,
            self.options.unknown_operation,
            self.shutdown.clone(),
        );
        processor.warn_window(&self.source, &ready)?;
        let stream = self.source.tail(&ready, &self.shutdown)?;
        processor.run(stream, &mut self.registry)
    }
}
