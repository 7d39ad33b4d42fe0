//! The persisted position catalog.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use ivd_types::Hash;

use crate::error::{HistoryError, HistoryResult};
use crate::names::{Aliases, MemorableNames};
use crate::position::{Iterations, Position};

const CATALOG_VERSION: u32 = 1;

/// Everything the position system knows, persisted as one JSON document
/// (`.ivaldi/position.json`).
pub struct Catalog {
    path: PathBuf,
    pub position: Position,
    pub names: MemorableNames,
    pub aliases: Aliases,
    pub iterations: Iterations,
}

#[derive(Serialize, Deserialize)]
struct PersistedCatalog {
    version: u32,
    position: Position,
    names: MemorableNames,
    aliases: Aliases,
    iterations: Iterations,
}

impl Catalog {
    /// Create an empty catalog that will persist at
    /// `<ivaldi_dir>/position.json`.
    pub fn new(ivaldi_dir: &Path) -> Self {
        Self {
            path: ivaldi_dir.join("position.json"),
            position: Position::new(),
            names: MemorableNames::new(),
            aliases: Aliases::new(),
            iterations: Iterations::new(),
        }
    }

    /// Load the catalog, or start empty if none was saved yet.
    pub fn load(ivaldi_dir: &Path) -> HistoryResult<Self> {
        let path = ivaldi_dir.join("position.json");
        match fs::read(&path) {
            Ok(bytes) => {
                let persisted: PersistedCatalog = serde_json::from_slice(&bytes)
                    .map_err(|e| HistoryError::State(e.to_string()))?;
                Ok(Self {
                    path,
                    position: persisted.position,
                    names: persisted.names,
                    aliases: persisted.aliases,
                    iterations: persisted.iterations,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new(ivaldi_dir)),
            Err(e) => Err(HistoryError::io("read", path, e)),
        }
    }

    /// Persist the catalog atomically.
    pub fn save(&self) -> HistoryResult<()> {
        let parent = self.path.parent().expect("catalog path has a parent");
        fs::create_dir_all(parent).map_err(|e| HistoryError::io("create_dir", parent, e))?;

        let persisted = PersistedCatalog {
            version: CATALOG_VERSION,
            position: self.position.clone(),
            names: self.names.clone(),
            aliases: self.aliases.clone(),
            iterations: self.iterations.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| HistoryError::State(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| HistoryError::io("create_temp", parent, e))?;
        tmp.write_all(&json)
            .map_err(|e| HistoryError::io("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| HistoryError::io("rename", &self.path, e.error))?;
        Ok(())
    }

    /// Record a freshly created seal: append to history, bump the iteration
    /// counter, and assign a memorable name. Returns `(iteration, name)`.
    pub fn record_seal(&mut self, timeline: &str, seal: Hash) -> (u64, String) {
        self.position.advance(timeline, seal);
        let iteration = self.iterations.next(timeline);
        let name = self.names.assign(seal);
        debug!(timeline, iteration, name = %name, seal = %seal.short(), "seal recorded");
        (iteration, name)
    }
}
