//! Schema migrations for the sink database.
//!
//! Migration files live in one directory, named `<version>_<description>.toml`:
//! ```toml
//! script = """
//! CREATE TABLE orders(id VARCHAR PRIMARY KEY, total DOUBLE PRECISION)
//! """
//! ```
//! They are applied in version order, each one inside its own transaction, and recorded in the
//! `sink_migrations` table so a version is never applied twice.

use postgres::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::{Result, SyncError};

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS sink_migrations(
        version BIGINT NOT NULL,
        description VARCHAR NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT now(),
        PRIMARY KEY (version)
    )";

#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub script: String,
}

#[derive(Deserialize)]
struct MigrationFile {
    script: String,
}

/// Split `<version>_<description>.toml` file name.
fn parse_file_name(name: &str) -> Option<(i64, &str)> {
    let stem = name.strip_suffix(".toml")?;
    let (version, description) = stem.split_once('_')?;
    if description.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((version.parse().ok()?, description))
}

/// Load migrations under `dir`, sorted by version.
///
/// Files which don't look like `<version>_<description>.toml` are ignored.
pub fn load_migrations(dir: &Path) -> Result<Vec<Migration>> {
    let io_err = |detail| SyncError::Io {
        path: dir.display().to_string(),
        detail,
    };

    let mut migrations: Vec<Migration> = vec![];
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        let (version, description) = match parse_file_name(name) {
            Some(parsed) => parsed,
            None => continue,
        };

        let data = std::fs::read_to_string(&path).map_err(|detail| SyncError::Io {
            path: path.display().to_string(),
            detail,
        })?;
        let file: MigrationFile = toml::from_str(&data).map_err(|detail| SyncError::Toml {
            path: path.display().to_string(),
            detail,
        })?;
        migrations.push(Migration {
            version,
            description: description.to_string(),
            script: file.script,
        });
    }

    migrations.sort_by_key(|m| m.version);
    for pair in migrations.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(SyncError::Config(format!(
                "migration version {} is defined twice",
                pair[0].version
            )));
        }
    }
    Ok(migrations)
}

/// Apply `migrations` which are not recorded yet, return how many were applied.
pub fn apply_migrations(client: &mut Client, migrations: &[Migration]) -> Result<usize> {
    client.batch_execute(CREATE_TABLE)?;
    let applied: HashSet<i64> = client
        .query("SELECT version FROM sink_migrations", &[])?
        .iter()
        .map(|row| row.get(0))
        .collect();

    info!("Migration is started");
    let mut count = 0;
    for migration in migrations.iter() {
        if applied.contains(&migration.version) {
            continue;
        }
        let mut tx = client.transaction()?;
        tx.batch_execute(&migration.script)?;
        tx.execute(
            "INSERT INTO sink_migrations(version, description) VALUES ($1, $2)",
            &[&migration.version, &migration.description],
        )?;
        tx.commit()?;
        info!(version = migration.version, description = %migration.description, "Migration applied.");
        count += 1;
    }
    info!(count, "Migration is ended");
    Ok(count)
}
