//! Atomic checkout of a tree into the working directory.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use ivd_objects::{EntryMode, Tree};
use ivd_store::ObjectStore;
use ivd_types::CancelToken;

use crate::error::{WorktreeError, WorktreeResult};

/// Directories the worktree never touches.
const SKIP_DIRS: &[&str] = &[".ivaldi", ".git", "build"];

/// Replace the tracked contents of `root` with `tree`.
///
/// Algorithm:
/// 1. Materialize every target blob into `.ivaldi/tmp/overlay`.
/// 2. Walk the working tree for the current file set outside metadata.
/// 3. Delete files in current − target, longest path first, pruning empty
///    parents.
/// 4. Move each overlay file into place via `overlay -> <dst>.swp -> <dst>`
///    so every file transitions atomically.
/// 5. Remove the overlay directory.
pub fn checkout(store: &dyn ObjectStore, tree: &Tree, root: &Path) -> WorktreeResult<()> {
    checkout_with_cancel(store, tree, root, &CancelToken::new())
}

/// [`checkout`], checking `cancel` while the overlay is being staged.
///
/// Cancellation can only land before the working tree is touched; once the
/// destructive phases begin the checkout runs to completion.
pub fn checkout_with_cancel(
    store: &dyn ObjectStore,
    tree: &Tree,
    root: &Path,
    cancel: &CancelToken,
) -> WorktreeResult<()> {
    let overlay = root.join(".ivaldi").join("tmp").join("overlay");
    if overlay.exists() {
        fs::remove_dir_all(&overlay).map_err(|e| WorktreeError::io("remove_dir", &overlay, e))?;
    }
    fs::create_dir_all(&overlay).map_err(|e| WorktreeError::io("create_dir", &overlay, e))?;

    // Phase 1: materialize target bytes into the overlay.
    for entry in tree.entries() {
        if cancel.is_cancelled() {
            let _ = fs::remove_dir_all(&overlay);
            return Err(WorktreeError::Cancelled);
        }
        let (bytes, _) = store.get(&entry.hash)?;
        let staged = overlay.join(&entry.name);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).map_err(|e| WorktreeError::io("create_dir", parent, e))?;
        }
        fs::write(&staged, &bytes).map_err(|e| WorktreeError::io("write", &staged, e))?;
        apply_mode(&staged, entry.mode)?;
    }

    // Phase 2: current tracked file set.
    let current = tracked_paths(root);
    let target: BTreeSet<String> = tree.entries().iter().map(|e| e.name.clone()).collect();

    // Phase 3: delete current − target, longest path first so emptied
    // directories can be pruned as we go.
    let mut doomed: Vec<&String> = current.difference(&target).collect();
    doomed.sort_by_key(|p| std::cmp::Reverse(p.len()));
    for rel in doomed {
        let path = root.join(rel);
        match fs::remove_file(&path) {
            Ok(()) => remove_empty_parents(root, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorktreeError::io("remove", path, e)),
        }
    }

    // Phase 4: move overlay files into place with a rename pair.
    for entry in tree.entries() {
        let staged = overlay.join(&entry.name);
        let dst = root.join(&entry.name);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| WorktreeError::io("create_dir", parent, e))?;
        }
        let swap = swap_path(&dst);
        fs::rename(&staged, &swap).map_err(|e| WorktreeError::io("rename", &swap, e))?;
        fs::rename(&swap, &dst).map_err(|e| WorktreeError::io("rename", &dst, e))?;
    }

    // Phase 5: drop the overlay.
    fs::remove_dir_all(&overlay).map_err(|e| WorktreeError::io("remove_dir", &overlay, e))?;

    debug!(files = tree.len(), "checkout complete");
    Ok(())
}

fn swap_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().unwrap_or_default().to_os_string();
    name.push(".swp");
    dst.with_file_name(name)
}

fn apply_mode(path: &Path, mode: EntryMode) -> WorktreeResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if mode == EntryMode::Executable {
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
                .map_err(|e| WorktreeError::io("chmod", path, e))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// Every file under `root` outside the metadata directories, as
/// repository-relative POSIX paths.
pub(crate) fn tracked_paths(root: &Path) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| keep_entry(e, root));
    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_posix(root, entry.path()) {
            paths.insert(rel);
        }
    }
    paths
}

pub(crate) fn keep_entry(entry: &walkdir::DirEntry, root: &Path) -> bool {
    if !entry.file_type().is_dir() || entry.path() == root {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if SKIP_DIRS.iter().any(|d| *d == name) {
        return false;
    }
    let p = entry.path();
    if p.join(".ivaldi").exists() || p.join(".git").exists() {
        return false;
    }
    true
}

pub(crate) fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Remove now-empty directories between a deleted file and the root.
pub(crate) fn remove_empty_parents(root: &Path, deleted: &Path) {
    let mut dir = deleted.parent();
    while let Some(d) = dir {
        if d == root {
            break;
        }
        // remove_dir fails on non-empty directories, which ends the climb.
        if fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivd_objects::{ObjectKind, TreeEntry};
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
    fn checkout_materializes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let tree = tree_of(&store, &[("a.txt", "A\n"), ("sub/b.txt", "B\n")]);

        checkout(&store, &tree, dir.path()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "A\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(),
            "B\n"
        );
        assert!(!dir.path().join(".ivaldi/tmp/overlay").exists());
    }

    #[test]
    fn checkout_removes_files_not_in_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();

        fs::create_dir_all(dir.path().join("old/deep")).unwrap();
        fs::write(dir.path().join("old/deep/file.txt"), "stale").unwrap();
        fs::write(dir.path().join("keep.txt"), "old contents").unwrap();

        let tree = tree_of(&store, &[("keep.txt", "new contents")]);
        checkout(&store, &tree, dir.path()).unwrap();

        assert!(!dir.path().join("old").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
            "new contents"
        );
    }

    #[test]
    fn checkout_preserves_metadata_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        fs::create_dir_all(dir.path().join(".ivaldi")).unwrap();
        fs::write(dir.path().join(".ivaldi/HEADS.json"), "{}").unwrap();

        let tree = tree_of(&store, &[("a.txt", "A")]);
        checkout(&store, &tree, dir.path()).unwrap();
        assert!(dir.path().join(".ivaldi/HEADS.json").exists());
    }

    #[test]
    fn checkout_empty_tree_clears_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        checkout(&store, &Tree::empty(), dir.path()).unwrap();
        assert!(!dir.path().join("a.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn checkout_sets_executable_bit() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let blob = store.put(b"#!/bin/sh\n", ObjectKind::Blob).unwrap();
        let tree = Tree::new(vec![TreeEntry::new(
            EntryMode::Executable,
            "run.sh",
            ObjectKind::Blob,
            blob,
        )])
        .unwrap();

        checkout(&store, &tree, dir.path()).unwrap();
        let mode = fs::metadata(dir.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert!(mode & 0o111 != 0);
    }

    #[test]
    fn cancelled_checkout_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        fs::write(dir.path().join("existing.txt"), "untouched").unwrap();
        let tree = tree_of(&store, &[("a.txt", "new")]);

        let token = CancelToken::new();
        token.cancel();
        let err = checkout_with_cancel(&store, &tree, dir.path(), &token).unwrap_err();
        assert!(matches!(err, WorktreeError::Cancelled));
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("existing.txt")).unwrap(),
            "untouched"
        );
    }

    #[test]
    fn checkout_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let tree = tree_of(&store, &[("a.txt", "stable")]);

        checkout(&store, &tree, dir.path()).unwrap();
        checkout(&store, &tree, dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "stable"
        );
    }
}
