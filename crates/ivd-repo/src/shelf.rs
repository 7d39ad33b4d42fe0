//! Shelves: named snapshots of uncommitted work.
//!
//! A shelf is the same stash machinery timeline switching uses, persisted
//! under a user-chosen name. Shelving captures the divergence from the
//! current head and restores a clean working tree; unshelving reapplies it
//! (with the usual conflict files if the base moved).

use std::fs;

use tracing::info;

use ivd_types::validate_timeline_name;
use ivd_worktree::{checkout, Stash};

use crate::error::{RepoError, RepoResult};
use crate::repository::Repository;

impl Repository {
    /// Capture uncommitted work under `name` and reset the working tree to
    /// the current head.
    pub fn shelve(&mut self, name: &str) -> RepoResult<()> {
        validate_timeline_name(name)?;
        if name.contains('/') {
            return Err(ivd_types::TypeError::InvalidName {
                name: name.to_string(),
                reason: "shelf names cannot contain '/'".into(),
            }
            .into());
        }
        let path = self.shelf_path(name);
        if path.exists() {
            return Err(RepoError::ShelfAlreadyExists(name.to_string()));
        }

        let head_tree = self.tree_of_head(self.head())?;
        let stash = Stash::build(self.store.as_ref(), &head_tree, self.root())?;

        let parent = path.parent().expect("shelf path has a parent");
        fs::create_dir_all(parent).map_err(|e| RepoError::io("create_dir", parent, e))?;
        let json =
            serde_json::to_vec_pretty(&stash).map_err(|e| RepoError::State(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| RepoError::io("create_temp", parent, e))?;
        std::io::Write::write_all(&mut tmp, &json)
            .map_err(|e| RepoError::io("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(&path)
            .map_err(|e| RepoError::io("rename", &path, e.error))?;

        checkout(self.store.as_ref(), &head_tree, self.root())?;
        self.workspace.scan()?;
        self.workspace.save()?;

        info!(shelf = name, entries = stash.entries.len(), "work shelved");
        Ok(())
    }

    /// Reapply a shelf onto the working tree and delete it. Returns any
    /// conflict paths.
    pub fn unshelve(&mut self, name: &str) -> RepoResult<Vec<String>> {
        let path = self.shelf_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepoError::ShelfNotFound(name.to_string()))
            }
            Err(e) => return Err(RepoError::io("read", &path, e)),
        };
        let stash: Stash =
            serde_json::from_slice(&bytes).map_err(|e| RepoError::State(e.to_string()))?;

        let head_tree = self.tree_of_head(self.head())?;
        let report = stash.reapply(self.store.as_ref(), &head_tree, self.root())?;

        fs::remove_file(&path).map_err(|e| RepoError::io("remove", &path, e))?;
        self.workspace.scan()?;
        self.workspace.save()?;

        info!(shelf = name, conflicts = report.conflicts.len(), "shelf reapplied");
        Ok(report.conflicts)
    }

    /// Names of all shelves, sorted.
    pub fn shelves(&self) -> RepoResult<Vec<String>> {
        let dir = self.ivaldi_dir().join("shelves");
        let mut names = Vec::new();
        match fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if let Some(name) = entry
                        .file_name()
                        .to_str()
                        .and_then(|n| n.strip_suffix(".json"))
                    {
                        names.push(name.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RepoError::io("read_dir", &dir, e)),
        }
        names.sort();
        Ok(names)
    }

    fn shelf_path(&self, name: &str) -> std::path::PathBuf {
        self.ivaldi_dir().join("shelves").join(format!("{name}.json"))
    }
}
