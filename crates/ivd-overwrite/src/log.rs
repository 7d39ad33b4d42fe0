use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ivd_types::{now_nanos, Hash, Identity};

use crate::error::{OverwriteError, OverwriteResult};
use crate::record::{OverwriteCategory, OverwriteRecord};

/// Append-only overwrite log plus the protected-seal set, persisted at
/// `.ivaldi/overwrites.json`.
pub struct OverwriteLog {
    path: PathBuf,
    records: Vec<OverwriteRecord>,
    protected: BTreeSet<Hash>,
}

#[derive(Serialize, Deserialize)]
struct PersistedLog {
    records: Vec<OverwriteRecord>,
    protected: BTreeSet<Hash>,
}

impl OverwriteLog {
    /// Create an empty log persisting at `<ivaldi_dir>/overwrites.json`.
    pub fn new(ivaldi_dir: &Path) -> Self {
        Self {
            path: ivaldi_dir.join("overwrites.json"),
            records: Vec::new(),
            protected: BTreeSet::new(),
        }
    }

    /// Load the log, or start empty if none was saved yet.
    pub fn load(ivaldi_dir: &Path) -> OverwriteResult<Self> {
        let path = ivaldi_dir.join("overwrites.json");
        match fs::read(&path) {
            Ok(bytes) => {
                let persisted: PersistedLog = serde_json::from_slice(&bytes)
                    .map_err(|e| OverwriteError::State(e.to_string()))?;
                Ok(Self {
                    path,
                    records: persisted.records,
                    protected: persisted.protected,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self {
                path,
                records: Vec::new(),
                protected: BTreeSet::new(),
            }),
            Err(e) => Err(OverwriteError::io("read", path, e)),
        }
    }

    /// Persist the log atomically.
    pub fn save(&self) -> OverwriteResult<()> {
        let parent = self.path.parent().expect("log path has a parent");
        fs::create_dir_all(parent).map_err(|e| OverwriteError::io("create_dir", parent, e))?;
        let persisted = PersistedLog {
            records: self.records.clone(),
            protected: self.protected.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| OverwriteError::State(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| OverwriteError::io("create_temp", parent, e))?;
        tmp.write_all(&json)
            .map_err(|e| OverwriteError::io("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| OverwriteError::io("rename", &self.path, e.error))?;
        Ok(())
    }

    /// Record a history rewrite. Must be called before the new head is
    /// written. Returns the record id.
    ///
    /// Rejects an empty (or whitespace-only) justification and any attempt
    /// to overwrite a protected seal.
    pub fn record(
        &mut self,
        original: Hash,
        replacement: Hash,
        category: OverwriteCategory,
        justification: impl Into<String>,
        author: Identity,
    ) -> OverwriteResult<Uuid> {
        let justification = justification.into();
        if justification.trim().is_empty() {
            return Err(OverwriteError::EmptyJustification);
        }
        if self.protected.contains(&original) {
            return Err(OverwriteError::ProtectedSeal(original));
        }

        let record = OverwriteRecord {
            id: Uuid::now_v7(),
            original,
            replacement,
            category,
            justification,
            author,
            timestamp: now_nanos(),
        };
        let id = record.id;
        info!(
            original = %original.short(),
            replacement = %replacement.short(),
            %category,
            "overwrite recorded"
        );
        self.records.push(record);
        self.save()?;
        Ok(id)
    }

    /// Mark a seal non-overwritable.
    pub fn protect(&mut self, seal: Hash) -> OverwriteResult<()> {
        self.protected.insert(seal);
        self.save()
    }

    /// Remove protection from a seal. Returns `true` if it was protected.
    pub fn unprotect(&mut self, seal: &Hash) -> OverwriteResult<bool> {
        let was = self.protected.remove(seal);
        self.save()?;
        Ok(was)
    }

    /// Returns `true` if a seal is protected.
    pub fn is_protected(&self, seal: &Hash) -> bool {
        self.protected.contains(seal)
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[OverwriteRecord] {
        &self.records
    }

    /// Look up a record by id.
    pub fn get(&self, id: &Uuid) -> Option<&OverwriteRecord> {
        self.records.iter().find(|r| r.id == *id)
    }

    /// Records touching a seal, as original or replacement.
    pub fn records_for(&self, seal: &Hash) -> Vec<&OverwriteRecord> {
        self.records
            .iter()
            .filter(|r| r.original == *seal || r.replacement == *seal)
            .collect()
    }
}
