use super::CheckpointStore;
use crate::{Position, Result, SyncError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Checkpoint store which lives in process memory, checkpoints are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: Mutex<HashMap<String, Position>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn positions(&self) -> MutexGuard<'_, HashMap<String, Position>> {
        // a poisoned map is still consistent, every write is a single insert.
        self.positions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CheckpointStore for MemoryStore {
    fn exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.positions().contains_key(namespace))
    }

    fn add(&self, namespace: &str, position: Position) -> Result<()> {
        let mut positions = self.positions();
        if positions.contains_key(namespace) {
            return Err(SyncError::CheckpointExists(namespace.to_string()));
        }
        positions.insert(namespace.to_string(), position);
        Ok(())
    }

    fn get_position(&self, namespace: &str) -> Result<Position> {
        self.positions()
            .get(namespace)
            .copied()
            .ok_or_else(|| SyncError::CheckpointNotFound(namespace.to_string()))
    }

    fn update_position(&self, namespace: &str, position: Position) -> Result<()> {
        let mut positions = self.positions();
        let current = positions
            .get_mut(namespace)
            .ok_or_else(|| SyncError::CheckpointNotFound(namespace.to_string()))?;
        if !position.is_after(current) {
            return Err(SyncError::CheckpointNotAdvanced {
                namespace: namespace.to_string(),
                current: *current,
                requested: position,
            });
        }
        *current = position;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
