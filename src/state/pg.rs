use super::CheckpointStore;
use crate::{Position, Result, SyncError};
use chrono::NaiveDateTime;
use postgres::{Client, NoTls};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS collection_states(
        name VARCHAR NOT NULL,
        last_timestamp TIMESTAMP NOT NULL,
        last_ordinal INTEGER NOT NULL,
        PRIMARY KEY (name)
    )";

/// Checkpoint store saved in postgres table `collection_states`.
pub struct PgStore {
    // None after close.
    client: Mutex<Option<Client>>,
}

impl PgStore {
    /// connect to postgres `url` and make sure the state table exists.
    pub fn connect(url: &str) -> Result<PgStore> {
        let client = Client::connect(url, NoTls)?;
        PgStore::with_client(client)
    }

    /// build the store on an existing postgres connection.
    pub fn with_client(mut client: Client) -> Result<PgStore> {
        client.batch_execute(CREATE_TABLE)?;
        info!("Checkpoint table collection_states is ready.");
        Ok(PgStore {
            client: Mutex::new(Some(client)),
        })
    }

    fn client(&self) -> MutexGuard<'_, Option<Client>> {
        self.client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn to_timestamp(position: Position) -> Result<NaiveDateTime> {
    position
        .to_naive()
        .ok_or(SyncError::PositionOutOfRange(position))
}

fn query_position(client: &mut Client, namespace: &str) -> Result<Option<Position>> {
    let row = client.query_opt(
        "SELECT last_timestamp, last_ordinal FROM collection_states WHERE name = $1",
        &[&namespace],
    )?;
    Ok(row.map(|row| Position::from_naive(row.get(0), row.get(1))))
}

impl CheckpointStore for PgStore {
    fn exists(&self, namespace: &str) -> Result<bool> {
        let mut guard = self.client();
        let client = guard.as_mut().ok_or(SyncError::StoreClosed)?;
        let row = client.query_opt(
            "SELECT 1 FROM collection_states WHERE name = $1",
            &[&namespace],
        )?;
        Ok(row.is_some())
    }

    fn add(&self, namespace: &str, position: Position) -> Result<()> {
        let timestamp = to_timestamp(position)?;
        let mut guard = self.client();
        let client = guard.as_mut().ok_or(SyncError::StoreClosed)?;
        let inserted = client.execute(
            "INSERT INTO collection_states(name, last_timestamp, last_ordinal) VALUES($1, $2, $3)
             ON CONFLICT (name) DO NOTHING",
            &[&namespace, &timestamp, &position.ordinal],
        )?;
        if inserted == 0 {
            return Err(SyncError::CheckpointExists(namespace.to_string()));
        }
        Ok(())
    }

    fn get_position(&self, namespace: &str) -> Result<Position> {
        let mut guard = self.client();
        let client = guard.as_mut().ok_or(SyncError::StoreClosed)?;
        query_position(client, namespace)?
            .ok_or_else(|| SyncError::CheckpointNotFound(namespace.to_string()))
    }

    fn update_position(&self, namespace: &str, position: Position) -> Result<()> {
        let timestamp = to_timestamp(position)?;
        let mut guard = self.client();
        let client = guard.as_mut().ok_or(SyncError::StoreClosed)?;
        let updated = client.execute(
            "UPDATE collection_states SET last_timestamp = $1, last_ordinal = $2
             WHERE name = $3 AND (last_timestamp, last_ordinal) < ($1, $2)",
            &[&timestamp, &position.ordinal, &namespace],
        )?;
        if updated == 1 {
            return Ok(());
        }

        // nothing updated, either the row is missing or the position doesn't move forward.
        match query_position(client, namespace)? {
            None => Err(SyncError::CheckpointNotFound(namespace.to_string())),
            Some(current) => Err(SyncError::CheckpointNotAdvanced {
                namespace: namespace.to_string(),
                current,
                requested: position,
            }),
        }
    }

    fn close(&self) -> Result<()> {
        match self.client().take() {
            Some(client) => client.close().map_err(SyncError::from),
            None => Ok(()),
        }
    }
}
