//! The workspace: scanning, the anvil, and candidate tree construction.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use ivd_objects::{EntryMode, ObjectKind, Tree, TreeEntry};
use ivd_store::ObjectStore;
use ivd_types::{normalize_path, CancelToken, Hash, HashAlgo, HashWriter};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::ignore::IgnoreEngine;
use crate::state::{FileState, FileStatus, ScanReport};
use crate::STREAMING_THRESHOLD;

/// Directories never entered by the scanner.
const SKIP_DIRS: &[&str] = &[".ivaldi", ".git", "build"];

const STATE_VERSION: u32 = 1;

/// Per-timeline working tree tracker.
///
/// Owns the [`FileState`] map and the candidate tree pointer. The object
/// store handle is re-bound on load and never serialized.
pub struct Workspace {
    root: PathBuf,
    timeline: String,
    states: BTreeMap<String, FileState>,
    candidate: Option<Hash>,
    store: Arc<dyn ObjectStore>,
}

/// On-disk shape of `.ivaldi/workspace/<timeline>/state.json`.
#[derive(Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    states: BTreeMap<String, FileState>,
    candidate: Option<Hash>,
}

impl Workspace {
    /// Create an empty workspace for a timeline.
    pub fn new(root: impl Into<PathBuf>, timeline: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            root: root.into(),
            timeline: timeline.into(),
            states: BTreeMap::new(),
            candidate: None,
            store,
        }
    }

    /// Load a workspace from its state file, or create an empty one if the
    /// timeline has no saved state yet.
    pub fn load(
        root: impl Into<PathBuf>,
        timeline: impl Into<String>,
        store: Arc<dyn ObjectStore>,
    ) -> WorkspaceResult<Self> {
        let root = root.into();
        let timeline = timeline.into();
        let path = Self::state_path(&root, &timeline);
        let persisted: PersistedState = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| WorkspaceError::State(e.to_string()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::new(root, timeline, store))
            }
            Err(e) => return Err(WorkspaceError::io("read", path, e)),
        };
        Ok(Self {
            root,
            timeline,
            states: persisted.states,
            candidate: persisted.candidate,
            store,
        })
    }

    /// Build a workspace whose baseline is the given sealed tree.
    ///
    /// Used when a timeline is first materialized: every tree entry starts
    /// Unmodified with its blob as the baseline. Sizes and mtimes are zero
    /// until the next scan.
    pub fn from_tree(
        root: impl Into<PathBuf>,
        timeline: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        tree: &Tree,
    ) -> Self {
        let mut ws = Self::new(root, timeline, store);
        for entry in tree.entries() {
            ws.states.insert(
                entry.name.clone(),
                FileState {
                    path: entry.name.clone(),
                    status: FileStatus::Unmodified,
                    content_hash: entry.hash,
                    size: 0,
                    mtime_nanos: 0,
                    on_anvil: false,
                    blob_hash: Some(entry.hash),
                    mode: entry.mode,
                },
            );
        }
        ws
    }

    fn state_path(root: &Path, timeline: &str) -> PathBuf {
        root.join(".ivaldi")
            .join("workspace")
            .join(timeline)
            .join("state.json")
    }

    /// Persist the state file atomically.
    pub fn save(&self) -> WorkspaceResult<()> {
        let path = Self::state_path(&self.root, &self.timeline);
        let parent = path.parent().expect("state path always has a parent");
        fs::create_dir_all(parent).map_err(|e| WorkspaceError::io("create_dir", parent, e))?;

        let persisted = PersistedState {
            version: STATE_VERSION,
            states: self.states.clone(),
            candidate: self.candidate,
        };
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| WorkspaceError::State(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| WorkspaceError::io("create_temp", parent, e))?;
        io::Write::write_all(&mut tmp, &json)
            .map_err(|e| WorkspaceError::io("write", tmp.path().to_path_buf(), e))?;
        tmp.persist(&path)
            .map_err(|e| WorkspaceError::io("rename", &path, e.error))?;
        Ok(())
    }

    /// The timeline this workspace tracks.
    pub fn timeline(&self) -> &str {
        &self.timeline
    }

    /// The working-tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All tracked file states, keyed by path.
    pub fn states(&self) -> &BTreeMap<String, FileState> {
        &self.states
    }

    /// State of a single path, if tracked.
    pub fn state_of(&self, path: &str) -> Option<&FileState> {
        self.states.get(path)
    }

    /// The cached candidate tree hash, if one has been built since the last
    /// anvil change.
    pub fn candidate(&self) -> Option<Hash> {
        self.candidate
    }

    /// Returns `true` if any file is on the anvil.
    pub fn has_gathered(&self) -> bool {
        self.states.values().any(|s| s.on_anvil)
    }

    // ---------------------------------------------------------------
    // Scan
    // ---------------------------------------------------------------

    /// Walk the working tree and reclassify every file against its sealed
    /// baseline.
    pub fn scan(&mut self) -> WorkspaceResult<ScanReport> {
        self.scan_with_cancel(&CancelToken::new())
    }

    /// [`Self::scan`], checking `cancel` between files. A cancelled scan
    /// leaves the previous state map untouched.
    pub fn scan_with_cancel(&mut self, cancel: &CancelToken) -> WorkspaceResult<ScanReport> {
        let ignore = IgnoreEngine::load(&self.root)?;
        let algo = self.store.algo();
        let mut next: BTreeMap<String, FileState> = BTreeMap::new();

        let root = self.root.clone();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| keep_entry(e, &root));

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(WorkspaceError::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_posix(&root, entry.path()) else {
                continue;
            };
            if ignore.is_ignored(&rel) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(_) => {
                    // The file may have vanished mid-walk; retry via fs and
                    // let a true deletion fall out of the absence pass.
                    match fs::metadata(entry.path()) {
                        Ok(meta) => meta,
                        Err(_) => continue,
                    }
                }
            };
            let size = meta.len();
            let mtime_nanos = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            let mode = detect_mode(&meta);

            let prev = self.states.get(&rel);
            let content_hash = match prev {
                Some(p)
                    if p.status != FileStatus::Deleted
                        && p.size == size
                        && p.mtime_nanos == mtime_nanos
                        && p.mtime_nanos != 0 =>
                {
                    p.content_hash
                }
                _ => match hash_file_with_retry(entry.path(), size, algo) {
                    Some(hash) => hash,
                    None => continue,
                },
            };

            let blob_hash = prev.and_then(|p| p.blob_hash);
            let on_anvil = prev.map(|p| p.on_anvil).unwrap_or(false);
            let mut status = match blob_hash {
                None => FileStatus::Added,
                Some(b) if b == content_hash => FileStatus::Unmodified,
                Some(_) => FileStatus::Modified,
            };
            if on_anvil && matches!(status, FileStatus::Added | FileStatus::Modified) {
                status = FileStatus::Gathered;
            }

            next.insert(
                rel.clone(),
                FileState {
                    path: rel,
                    status,
                    content_hash,
                    size,
                    mtime_nanos,
                    on_anvil,
                    blob_hash,
                    mode,
                },
            );
        }

        // Previously known paths absent from this walk are deletions.
        for (path, prev) in &self.states {
            if !next.contains_key(path) {
                let mut state = prev.clone();
                state.status = FileStatus::Deleted;
                next.insert(path.clone(), state);
            }
        }

        self.states = next;
        self.candidate = None;

        let mut report = ScanReport::default();
        for (path, state) in &self.states {
            match state.status {
                FileStatus::Added => report.added.push(path.clone()),
                FileStatus::Modified => report.modified.push(path.clone()),
                FileStatus::Deleted => report.deleted.push(path.clone()),
                FileStatus::Gathered => report.gathered.push(path.clone()),
                FileStatus::Unmodified => {}
            }
        }
        debug!(
            timeline = %self.timeline,
            tracked = self.states.len(),
            changed = report.change_count(),
            "scan complete"
        );
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Gather / discard
    // ---------------------------------------------------------------

    /// Stage paths onto the anvil. Patterns may be exact paths, directories,
    /// or globs; the special token `.` gathers every changed file.
    /// Gathering is idempotent.
    pub fn gather<S: AsRef<str>>(&mut self, patterns: &[S]) -> WorkspaceResult<usize> {
        let matched = self.resolve_patterns(patterns, true)?;
        for path in &matched {
            let state = self.states.get_mut(path).expect("resolved path is tracked");
            state.on_anvil = true;
            if matches!(state.status, FileStatus::Added | FileStatus::Modified) {
                state.status = FileStatus::Gathered;
            }
        }
        self.candidate = None;
        Ok(matched.len())
    }

    /// Take paths off the anvil without touching the working tree. The
    /// special token `.` discards everything currently gathered.
    pub fn discard<S: AsRef<str>>(&mut self, patterns: &[S]) -> WorkspaceResult<usize> {
        let matched = self.resolve_patterns(patterns, false)?;
        for path in &matched {
            let state = self.states.get_mut(path).expect("resolved path is tracked");
            state.on_anvil = false;
            if state.status == FileStatus::Gathered {
                state.status = match state.blob_hash {
                    None => FileStatus::Added,
                    Some(b) if b == state.content_hash => FileStatus::Unmodified,
                    Some(_) => FileStatus::Modified,
                };
            }
        }
        self.candidate = None;
        Ok(matched.len())
    }

    /// Resolve gather/discard patterns to tracked paths.
    ///
    /// `changed_for_dot` selects what `.` means: changed files (gather) or
    /// on-anvil files (discard).
    fn resolve_patterns<S: AsRef<str>>(
        &self,
        patterns: &[S],
        changed_for_dot: bool,
    ) -> WorkspaceResult<Vec<String>> {
        let mut matched = std::collections::BTreeSet::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern == "." {
                for (path, state) in &self.states {
                    let hit = if changed_for_dot {
                        state.is_changed()
                    } else {
                        state.on_anvil
                    };
                    if hit {
                        matched.insert(path.clone());
                    }
                }
                continue;
            }

            let norm = normalize_path(pattern)?;
            let mut hit = false;
            if self.states.contains_key(&norm) {
                matched.insert(norm.clone());
                hit = true;
            } else {
                let dir_prefix = format!("{norm}/");
                for path in self.states.keys() {
                    if path.starts_with(&dir_prefix) {
                        matched.insert(path.clone());
                        hit = true;
                    }
                }
            }
            if !hit && norm.contains(['*', '?', '[']) {
                let glob = GlobBuilder::new(&norm)
                    .literal_separator(false)
                    .build()
                    .map_err(|e| WorkspaceError::Pattern {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })?
                    .compile_matcher();
                for path in self.states.keys() {
                    if glob.is_match(path) {
                        matched.insert(path.clone());
                        hit = true;
                    }
                }
            }
            if !hit {
                return Err(WorkspaceError::NoMatch(pattern.to_string()));
            }
        }
        Ok(matched.into_iter().collect())
    }

    // ---------------------------------------------------------------
    // Candidate tree
    // ---------------------------------------------------------------

    /// Build the candidate tree from the anvil and persist it to the store.
    ///
    /// Collects every on-anvil, non-deleted state, makes sure its blob is
    /// persisted (streaming for large files), and writes a single flat tree
    /// mapping paths to blob hashes. Deterministic: the same anvil contents
    /// always produce the same tree hash.
    pub fn build_candidate_tree(&mut self) -> WorkspaceResult<Hash> {
        let mut entries = Vec::new();
        let mut rehashed: Vec<(String, Hash, u64)> = Vec::new();

        for (path, state) in &self.states {
            if !state.on_anvil || state.status == FileStatus::Deleted {
                continue;
            }
            let blob = ensure_blob(&self.root, self.store.as_ref(), state)?;
            if blob != state.content_hash {
                let size = fs::metadata(self.root.join(path)).map(|m| m.len()).unwrap_or(state.size);
                rehashed.push((path.clone(), blob, size));
            }
            entries.push(TreeEntry::new(state.mode, path.clone(), ObjectKind::Blob, blob));
        }

        if entries.is_empty() {
            return Err(WorkspaceError::NothingGathered);
        }

        // Content moved under us between scan and gather; track what was
        // actually persisted.
        for (path, blob, size) in rehashed {
            if let Some(state) = self.states.get_mut(&path) {
                state.content_hash = blob;
                state.size = size;
            }
        }

        let tree = Tree::new(entries)?;
        let encoded = tree.encode()?;
        let hash = self.store.put(&encoded, ObjectKind::Tree)?;
        self.candidate = Some(hash);
        debug!(tree = %hash.short(), "candidate tree built");
        Ok(hash)
    }

    /// Fold a successful seal back into the state map: sealed deletions are
    /// dropped, sealed contents become the new baseline, and the anvil is
    /// cleared.
    pub fn mark_sealed(&mut self) {
        let mut remove = Vec::new();
        for (path, state) in self.states.iter_mut() {
            if state.on_anvil {
                if state.status == FileStatus::Deleted {
                    remove.push(path.clone());
                } else {
                    state.blob_hash = Some(state.content_hash);
                    state.status = FileStatus::Unmodified;
                }
            }
            state.on_anvil = false;
        }
        for path in remove {
            self.states.remove(&path);
        }
        self.candidate = None;
    }
}

fn keep_entry(entry: &walkdir::DirEntry, root: &Path) -> bool {
    if !entry.file_type().is_dir() || entry.path() == root {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if SKIP_DIRS.iter().any(|d| *d == name) {
        return false;
    }
    // A nested repository root is a submodule; leave it alone.
    let p = entry.path();
    if p.join(".ivaldi").exists() || p.join(".git").exists() {
        return false;
    }
    true
}

fn relative_posix(root: &Path, path: &Path) -> Option<String> {
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

fn detect_mode(meta: &fs::Metadata) -> EntryMode {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 != 0 {
            return EntryMode::Executable;
        }
    }
    let _ = meta;
    EntryMode::Regular
}

/// Hash a file, retrying once if it vanishes mid-read (editor rename races).
fn hash_file_with_retry(path: &Path, size: u64, algo: HashAlgo) -> Option<Hash> {
    for attempt in 0..2 {
        match hash_file(path, size, algo) {
            Ok(hash) => return Some(hash),
            Err(e) if e.kind() == io::ErrorKind::NotFound && attempt == 0 => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to hash file; skipping");
                return None;
            }
        }
    }
    None
}

fn hash_file(path: &Path, size: u64, algo: HashAlgo) -> io::Result<Hash> {
    if size <= STREAMING_THRESHOLD {
        Ok(Hash::compute(&fs::read(path)?, algo))
    } else {
        let mut file = File::open(path)?;
        let mut hasher = HashWriter::new(algo);
        io::copy(&mut file, &mut hasher)?;
        Ok(hasher.finalize())
    }
}

/// Make sure the blob for a state's current content is in the store,
/// returning its hash.
fn ensure_blob(
    root: &Path,
    store: &dyn ObjectStore,
    state: &FileState,
) -> WorkspaceResult<Hash> {
    if store.exists(&state.content_hash)? {
        return Ok(state.content_hash);
    }
    let path = root.join(&state.path);
    let size = fs::metadata(&path)
        .map(|m| m.len())
        .map_err(|e| WorkspaceError::io("stat", &path, e))?;
    if size <= STREAMING_THRESHOLD {
        let bytes = fs::read(&path).map_err(|e| WorkspaceError::io("read", &path, e))?;
        Ok(store.put(&bytes, ObjectKind::Blob)?)
    } else {
        let mut file = File::open(&path).map_err(|e| WorkspaceError::io("open", &path, e))?;
        Ok(store.put_stream(&mut file, ObjectKind::Blob)?)
    }
}
