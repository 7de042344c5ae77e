use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::{RuleDefinition, TransformationUnit};
use crate::sink::Sink;
use crate::{Result, SyncError};

const DEFINITION_EXT: &str = "toml";

/// All transformation units, keyed by namespace.
#[derive(Default)]
pub struct Registry {
    units: HashMap<String, TransformationUnit>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<database>.<collection>.toml` definition under `dir`.
    ///
    /// `new_sink` is called once per unit, each unit gets its own sink connection.  Any invalid
    /// definition fails the whole load.
    pub fn load_dir<F>(dir: &Path, mut new_sink: F) -> Result<Registry>
    where
        F: FnMut() -> Result<Box<dyn Sink>>,
    {
        let entries = std::fs::read_dir(dir).map_err(|detail| SyncError::Io {
            path: dir.display().to_string(),
            detail,
        })?;

        let mut paths = vec![];
        for entry in entries {
            let path = entry
                .map_err(|detail| SyncError::Io {
                    path: dir.display().to_string(),
                    detail,
                })?
                .path();
            if path.extension().map_or(false, |ext| ext == DEFINITION_EXT) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Registry::new();
        for path in paths {
            let ns = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| {
                    SyncError::Config(format!("invalid definition file name {:?}", path))
                })?
                .to_string();
            let mut def = RuleDefinition::load(&path)?;
            let unit = TransformationUnit::load(&ns, &mut def, new_sink()?)?;
            info!(namespace = %ns, path = %path.display(), "Load transformation.");
            registry.register(unit)?;
        }
        Ok(registry)
    }

    /// Add `unit`, fails when its namespace is already registered.
    pub fn register(&mut self, unit: TransformationUnit) -> Result<()> {
        let ns = unit.full_name().to_string();
        if self.units.contains_key(&ns) {
            return Err(SyncError::Config(format!(
                "transformation for {} registered twice",
                ns
            )));
        }
        self.units.insert(ns, unit);
        Ok(())
    }

    /// Registered namespaces, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_mut(&mut self, ns: &str) -> Option<&mut TransformationUnit> {
        self.units.get_mut(ns)
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut TransformationUnit> {
        self.units.values_mut()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
