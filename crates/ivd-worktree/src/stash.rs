//! Stash build and reapply: work preservation across checkouts.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ivd_objects::{ObjectKind, Tree};
use ivd_store::ObjectStore;
use ivd_types::Hash;

use crate::checkout::{remove_empty_parents, tracked_paths};
use crate::error::{WorktreeError, WorktreeResult};

/// One divergence between the working directory and a base tree.
///
/// `new = None` means the file was deleted; `base = None` means it is new.
/// The `new` bytes are persisted as a blob before any checkout runs, so the
/// stash survives a crash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    /// Repository-relative POSIX path.
    pub path: String,
    /// Blob in the base tree, if the path existed there.
    pub base: Option<Hash>,
    /// Blob holding the working-directory bytes, if the path still exists.
    pub new: Option<Hash>,
}

/// Uncommitted work captured relative to a base tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    pub entries: Vec<StashEntry>,
}

/// What a reapply did: cleanly applied paths and conflict files written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReapplyReport {
    /// Paths restored without conflict.
    pub applied: Vec<String>,
    /// Paths where a conflict file was written instead.
    pub conflicts: Vec<String>,
}

impl ReapplyReport {
    /// Returns `true` if no conflict files were written.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

impl Stash {
    /// Returns `true` if nothing diverged from the base tree.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diff the working directory against `base`, persisting changed bytes
    /// as blobs.
    pub fn build(store: &dyn ObjectStore, base: &Tree, root: &Path) -> WorktreeResult<Self> {
        let mut entries = Vec::new();
        let on_disk = tracked_paths(root);

        for rel in &on_disk {
            let path = root.join(rel);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(WorktreeError::io("read", path, e)),
            };
            let content = Hash::compute(&bytes, store.algo());
            match base.get(rel) {
                Some(entry) if entry.hash == content => {}
                Some(entry) => {
                    let blob = store.put(&bytes, ObjectKind::Blob)?;
                    entries.push(StashEntry {
                        path: rel.clone(),
                        base: Some(entry.hash),
                        new: Some(blob),
                    });
                }
                None => {
                    let blob = store.put(&bytes, ObjectKind::Blob)?;
                    entries.push(StashEntry {
                        path: rel.clone(),
                        base: None,
                        new: Some(blob),
                    });
                }
            }
        }

        // Base entries missing from disk are deletions.
        for entry in base.entries() {
            if !on_disk.contains(&entry.name) {
                entries.push(StashEntry {
                    path: entry.name.clone(),
                    base: Some(entry.hash),
                    new: None,
                });
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(entries = entries.len(), "stash built");
        Ok(Self { entries })
    }

    /// Reapply this stash on top of `target` in `root`.
    ///
    /// A stashed change applies cleanly when the target tree still carries
    /// the stash's base content for that path. Otherwise a conflict file is
    /// written with the template
    /// `<<<<<<< target\n{target}=======\n{new}>>>>>>> your_changes\n`.
    /// Conflicts are reported, never fatal.
    pub fn reapply(
        &self,
        store: &dyn ObjectStore,
        target: &Tree,
        root: &Path,
    ) -> WorktreeResult<ReapplyReport> {
        let mut report = ReapplyReport::default();

        for entry in &self.entries {
            let dst = root.join(&entry.path);
            let target_hash = target.get(&entry.path).map(|e| e.hash);

            let Some(new_blob) = entry.new else {
                // Stashed deletion: drop the file wherever it came from.
                match fs::remove_file(&dst) {
                    Ok(()) => remove_empty_parents(root, &dst),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(WorktreeError::io("remove", dst, e)),
                }
                report.applied.push(entry.path.clone());
                continue;
            };

            if target_hash == Some(new_blob) {
                // Target already carries the stashed content.
                report.applied.push(entry.path.clone());
                continue;
            }

            if target_hash == entry.base {
                let (bytes, _) = store.get(&new_blob)?;
                write_file(&dst, &bytes)?;
                report.applied.push(entry.path.clone());
            } else {
                let target_bytes = match target_hash {
                    Some(hash) => store.get(&hash)?.0,
                    None => Vec::new(),
                };
                let (new_bytes, _) = store.get(&new_blob)?;
                let mut conflict =
                    Vec::with_capacity(target_bytes.len() + new_bytes.len() + 64);
                conflict.extend_from_slice(b"<<<<<<< target\n");
                conflict.extend_from_slice(&target_bytes);
                conflict.extend_from_slice(b"=======\n");
                conflict.extend_from_slice(&new_bytes);
                conflict.extend_from_slice(b">>>>>>> your_changes\n");
                write_file(&dst, &conflict)?;
                warn!(path = %entry.path, "stash reapply conflict");
                report.conflicts.push(entry.path.clone());
            }
        }

        debug!(
            applied = report.applied.len(),
            conflicts = report.conflicts.len(),
            "stash reapplied"
        );
        Ok(report)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> WorktreeResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WorktreeError::io("create_dir", parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| WorktreeError::io("write", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::checkout;
    use ivd_objects::{EntryMode, TreeEntry};
    use ivd_store::InMemoryObjectStore;

    fn tree_of(store: &dyn ObjectStore, files: &[(&str, &str)]) -> Tree {
        let entries = files
            .iter()
            .map(|(name, contents)| {
                let blob = store.put(contents.as_bytes(), ObjectKind::Blob).unwrap();
                TreeEntry::new(EntryMode::Regular, *name, ObjectKind::Blob, blob)
            })
            .collect();
        Tree::new(entries).unwrap()
    }

    #[test]
    fn clean_workdir_builds_empty_stash() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let base = tree_of(&store, &[("a.txt", "A\n")]);
        checkout(&store, &base, dir.path()).unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        assert!(stash.is_empty());
    }

    #[test]
    fn stash_captures_modification_addition_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let base = tree_of(&store, &[("mod.txt", "old\n"), ("del.txt", "bye\n")]);
        checkout(&store, &base, dir.path()).unwrap();

        fs::write(dir.path().join("mod.txt"), "new\n").unwrap();
        fs::write(dir.path().join("add.txt"), "fresh\n").unwrap();
        fs::remove_file(dir.path().join("del.txt")).unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        assert_eq!(stash.entries.len(), 3);

        let by_path = |p: &str| stash.entries.iter().find(|e| e.path == p).unwrap();
        assert!(by_path("add.txt").base.is_none());
        assert!(by_path("add.txt").new.is_some());
        assert!(by_path("del.txt").new.is_none());
        assert!(by_path("mod.txt").base.is_some());
        assert!(by_path("mod.txt").new.is_some());
    }

    #[test]
    fn reapply_clean_when_base_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        // Base and target share a.txt, so the local edit carries over.
        let base = tree_of(&store, &[("a.txt", "shared\n")]);
        checkout(&store, &base, dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "WIP\n").unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        let target = tree_of(&store, &[("a.txt", "shared\n"), ("extra.txt", "E\n")]);
        checkout(&store, &target, dir.path()).unwrap();
        let report = stash.reapply(&store, &target, dir.path()).unwrap();

        assert!(report.is_clean());
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "WIP\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("extra.txt")).unwrap(),
            "E\n"
        );
    }

    #[test]
    fn reapply_writes_conflict_template() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let base = tree_of(&store, &[("a.txt", "F1\n")]);
        checkout(&store, &base, dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "LOCAL\n").unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        let target = tree_of(&store, &[("a.txt", "M1\n")]);
        checkout(&store, &target, dir.path()).unwrap();
        let report = stash.reapply(&store, &target, dir.path()).unwrap();

        assert_eq!(report.conflicts, vec!["a.txt".to_string()]);
        let contents = fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(
            contents,
            "<<<<<<< target\nM1\n=======\nLOCAL\n>>>>>>> your_changes\n"
        );
    }

    #[test]
    fn reapply_restores_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let base = Tree::empty();
        fs::write(dir.path().join("untracked.txt"), "mine\n").unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        let target = tree_of(&store, &[("other.txt", "O\n")]);
        checkout(&store, &target, dir.path()).unwrap();
        let report = stash.reapply(&store, &target, dir.path()).unwrap();

        assert!(report.is_clean());
        assert_eq!(
            fs::read_to_string(dir.path().join("untracked.txt")).unwrap(),
            "mine\n"
        );
    }

    #[test]
    fn reapply_carries_deletions() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let base = tree_of(&store, &[("doomed.txt", "D\n")]);
        checkout(&store, &base, dir.path()).unwrap();
        fs::remove_file(dir.path().join("doomed.txt")).unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        // Target still contains the file; the stashed deletion removes it.
        let target = tree_of(&store, &[("doomed.txt", "D\n")]);
        checkout(&store, &target, dir.path()).unwrap();
        let report = stash.reapply(&store, &target, dir.path()).unwrap();

        assert!(report.is_clean());
        assert!(!dir.path().join("doomed.txt").exists());
    }

    #[test]
    fn conflict_against_absent_target_has_empty_target_section() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let base = tree_of(&store, &[("a.txt", "base\n")]);
        checkout(&store, &base, dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "local\n").unwrap();

        let stash = Stash::build(&store, &base, dir.path()).unwrap();
        let target = Tree::empty();
        checkout(&store, &target, dir.path()).unwrap();
        let report = stash.reapply(&store, &target, dir.path()).unwrap();

        assert_eq!(report.conflicts, vec!["a.txt".to_string()]);
        let contents = fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(
            contents,
            "<<<<<<< target\n=======\nlocal\n>>>>>>> your_changes\n"
        );
    }

    #[test]
    fn stash_serde_roundtrip() {
        let stash = Stash {
            entries: vec![StashEntry {
                path: "a.txt".into(),
                base: Some(Hash::blake3(b"base")),
                new: None,
            }],
        };
        let json = serde_json::to_string(&stash).unwrap();
        let back: Stash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stash);
    }
}
