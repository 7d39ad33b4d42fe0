//! The repository facade.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use ivd_history::Catalog;
use ivd_objects::{ObjectKind, Seal, Tree};
use ivd_overwrite::OverwriteLog;
use ivd_resolve::Resolver;
use ivd_store::{FsObjectStore, ObjectStore, StoreError};
use ivd_timeline::TimelineManager;
use ivd_types::{now_nanos, Hash, Identity};
use ivd_workspace::{ScanReport, Workspace};

use crate::config::RepoConfig;
use crate::error::{RepoError, RepoResult};
use crate::lock::RepoLock;
use crate::portal::DiffSummary;

/// One Ivaldi repository rooted at a working directory.
///
/// Owns every subsystem handle. Cross-component references are always by
/// hash; the facade is what turns a hash into loaded objects and back.
pub struct Repository {
    root: PathBuf,
    ivaldi_dir: PathBuf,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) timelines: TimelineManager,
    pub(crate) catalog: Catalog,
    pub(crate) overwrites: OverwriteLog,
    pub(crate) workspace: Workspace,
    pub(crate) config: RepoConfig,
    _lock: RepoLock,
}

impl Repository {
    /// Forge (initialize) a repository in `root`.
    pub fn forge(root: impl Into<PathBuf>, user: Identity) -> RepoResult<Self> {
        let root = root.into();
        let ivaldi_dir = root.join(".ivaldi");
        if ivaldi_dir.exists() {
            return Err(RepoError::AlreadyForged(root));
        }
        fs::create_dir_all(&ivaldi_dir)
            .map_err(|e| RepoError::io("create_dir", &ivaldi_dir, e))?;

        let config = RepoConfig { user };
        config.save(&ivaldi_dir)?;

        let lock = RepoLock::acquire(&ivaldi_dir)?;
        let store: Arc<dyn ObjectStore> =
            Arc::new(FsObjectStore::open(ivaldi_dir.join("objects"))?);
        let timelines = TimelineManager::init(&ivaldi_dir)?;
        let catalog = Catalog::new(&ivaldi_dir);
        catalog.save()?;
        let overwrites = OverwriteLog::new(&ivaldi_dir);
        overwrites.save()?;
        let workspace = Workspace::new(&root, "main", Arc::clone(&store));

        info!(root = %root.display(), "repository forged");
        Ok(Self {
            root,
            ivaldi_dir,
            store,
            timelines,
            catalog,
            overwrites,
            workspace,
            config,
            _lock: lock,
        })
    }

    /// Open an existing repository, running switch-journal recovery before
    /// anything else touches the working tree.
    pub fn open(root: impl Into<PathBuf>) -> RepoResult<Self> {
        let root = root.into();
        let ivaldi_dir = root.join(".ivaldi");
        if !ivaldi_dir.is_dir() {
            return Err(RepoError::NotARepository(root));
        }

        let lock = RepoLock::acquire(&ivaldi_dir)?;
        let config = RepoConfig::load(&ivaldi_dir)?;
        let store: Arc<dyn ObjectStore> =
            Arc::new(FsObjectStore::open(ivaldi_dir.join("objects"))?);
        let timelines = TimelineManager::load(&ivaldi_dir)?;
        let catalog = Catalog::load(&ivaldi_dir)?;
        let overwrites = OverwriteLog::load(&ivaldi_dir)?;
        let workspace = Workspace::load(&root, timelines.current(), Arc::clone(&store))?;

        let mut repo = Self {
            root,
            ivaldi_dir,
            store,
            timelines,
            catalog,
            overwrites,
            workspace,
            config,
            _lock: lock,
        };
        repo.recover_pending_switch()?;
        Ok(repo)
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// Working-tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.ivaldi` directory.
    pub(crate) fn ivaldi_dir(&self) -> &Path {
        &self.ivaldi_dir
    }

    /// Name of the current timeline.
    pub fn current_timeline(&self) -> &str {
        self.timelines.current()
    }

    /// Head seal of the current timeline (zero before the first seal).
    pub fn head(&self) -> Hash {
        self.timelines.current_head()
    }

    /// Head of a named timeline.
    pub fn head_of(&self, timeline: &str) -> RepoResult<Hash> {
        Ok(self.timelines.head_of(timeline)?)
    }

    /// All timeline names.
    pub fn timeline_names(&self) -> Vec<&str> {
        self.timelines.names()
    }

    /// The configured identity.
    pub fn user(&self) -> &Identity {
        &self.config.user
    }

    /// Direct access to the object store, for embedding and tooling.
    pub fn objects(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Iteration number of the latest seal on a timeline.
    pub fn iteration(&self, timeline: &str) -> u64 {
        self.catalog.iterations.latest(timeline)
    }

    /// Memorable name of a seal, if assigned.
    pub fn memorable_name_of(&self, seal: &Hash) -> Option<&str> {
        self.catalog.names.name_of(seal)
    }

    // ---------------------------------------------------------------
    // Workspace operations
    // ---------------------------------------------------------------

    /// Rescan the working tree and persist the state.
    pub fn status(&mut self) -> RepoResult<ScanReport> {
        let report = self.workspace.scan()?;
        self.workspace.save()?;
        Ok(report)
    }

    /// Stage paths onto the anvil. Rescans first so fresh edits are seen.
    pub fn gather<S: AsRef<str>>(&mut self, patterns: &[S]) -> RepoResult<usize> {
        self.workspace.scan()?;
        let count = self.workspace.gather(patterns)?;
        self.workspace.save()?;
        debug!(count, "gathered onto the anvil");
        Ok(count)
    }

    /// Take paths off the anvil.
    pub fn discard<S: AsRef<str>>(&mut self, patterns: &[S]) -> RepoResult<usize> {
        let count = self.workspace.discard(patterns)?;
        self.workspace.save()?;
        Ok(count)
    }

    /// Summary of the gathered changes, for message generators.
    pub fn diff_summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for (path, state) in self.workspace.states() {
            if !state.on_anvil {
                continue;
            }
            use ivd_workspace::FileStatus;
            match state.status {
                FileStatus::Deleted => summary.deleted.push(path.clone()),
                FileStatus::Gathered | FileStatus::Added | FileStatus::Modified => {
                    if state.blob_hash.is_none() {
                        summary.added.push(path.clone());
                    } else {
                        summary.modified.push(path.clone());
                    }
                }
                FileStatus::Unmodified => {}
            }
        }
        summary
    }

    // ---------------------------------------------------------------
    // Timelines
    // ---------------------------------------------------------------

    /// Create a timeline branching from here.
    ///
    /// A timeline created before anything was sealed gets an
    /// initial-snapshot seal (empty tree) as its head, so every timeline
    /// head names a real object.
    pub fn create_timeline(
        &mut self,
        name: &str,
        description: impl Into<String>,
    ) -> RepoResult<()> {
        if self.head().is_zero() {
            let snapshot = self.initial_snapshot_seal()?;
            self.timelines.create(name, description)?;
            self.timelines.update_head(name, snapshot)?;
        } else {
            self.timelines.create(name, description)?;
        }
        // Give the new timeline a workspace baseline matching this one.
        self.workspace.save()?;
        Ok(())
    }

    /// Delete a timeline (never `main`, never the current one). Its seals
    /// stay addressable in the store.
    pub fn delete_timeline(&mut self, name: &str) -> RepoResult<()> {
        self.timelines.delete(name)?;
        let state_dir = self.ivaldi_dir.join("workspace").join(name);
        if state_dir.exists() {
            fs::remove_dir_all(&state_dir)
                .map_err(|e| RepoError::io("remove_dir", &state_dir, e))?;
        }
        Ok(())
    }

    fn initial_snapshot_seal(&mut self) -> RepoResult<Hash> {
        let tree = Tree::empty();
        let tree_hash = self.store.put(&tree.encode()?, ObjectKind::Tree)?;
        let seal = Seal {
            tree: tree_hash,
            parents: Vec::new(),
            author: self.config.user.clone(),
            committer: self.config.user.clone(),
            message: "initial snapshot".to_string(),
            timestamp: now_nanos(),
        };
        Ok(self.store.put(&seal.encode()?, ObjectKind::Seal)?)
    }

    // ---------------------------------------------------------------
    // Reference resolution and aliases
    // ---------------------------------------------------------------

    /// Resolve a user reference to a seal hash.
    pub fn resolve(&self, input: &str) -> RepoResult<Hash> {
        let resolver = Resolver::new(&self.catalog, self.store.as_ref(), self.timelines.current());
        Ok(resolver.resolve(input)?)
    }

    /// Assign a user alias to a seal.
    pub fn set_alias(&mut self, name: &str, target: Hash) -> RepoResult<()> {
        self.catalog.aliases.set(name, target);
        self.catalog.save()?;
        Ok(())
    }

    /// Remove a user alias.
    pub fn remove_alias(&mut self, name: &str) -> RepoResult<Option<Hash>> {
        let removed = self.catalog.aliases.remove(name);
        self.catalog.save()?;
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // History walks
    // ---------------------------------------------------------------

    /// Linearized history from the current head, newest first, following
    /// primary parents only.
    pub fn history(&self) -> RepoResult<Vec<(Hash, Seal)>> {
        self.history_from(self.head())
    }

    /// Linearized history from a given head.
    pub fn history_from(&self, head: Hash) -> RepoResult<Vec<(Hash, Seal)>> {
        let mut walk = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = head;
        while !cursor.is_zero() && visited.insert(cursor) {
            let seal = self.load_seal(&cursor, "history walk")?;
            let next = seal.primary_parent().copied().unwrap_or(Hash::ZERO);
            walk.push((cursor, seal));
            cursor = next;
        }
        Ok(walk)
    }

    /// All parents of a seal, for merge-aware traversals.
    pub fn parents_of(&self, seal: &Hash) -> RepoResult<Vec<Hash>> {
        Ok(self.load_seal(seal, "parent lookup")?.parents)
    }

    // ---------------------------------------------------------------
    // Object access (internal)
    // ---------------------------------------------------------------

    pub(crate) fn load_seal(&self, hash: &Hash, context: &str) -> RepoResult<Seal> {
        match self.store.get(hash) {
            Ok((payload, ObjectKind::Seal)) => Ok(Seal::decode(&payload)?),
            Ok((_, kind)) => Err(RepoError::MissingObject {
                hash: *hash,
                context: format!("{context}: expected seal, found {kind}"),
            }),
            Err(StoreError::NotFound(_)) => Err(RepoError::MissingObject {
                hash: *hash,
                context: context.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn load_tree(&self, hash: &Hash, context: &str) -> RepoResult<Tree> {
        match self.store.get(hash) {
            Ok((payload, ObjectKind::Tree)) => Ok(Tree::decode(&payload)?),
            Ok((_, kind)) => Err(RepoError::MissingObject {
                hash: *hash,
                context: format!("{context}: expected tree, found {kind}"),
            }),
            Err(StoreError::NotFound(_)) => Err(RepoError::MissingObject {
                hash: *hash,
                context: context.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// The tree a head points at; a zero head yields the empty tree.
    pub(crate) fn tree_of_head(&self, head: Hash) -> RepoResult<Tree> {
        if head.is_zero() {
            return Ok(Tree::empty());
        }
        let seal = self.load_seal(&head, "head tree lookup")?;
        self.load_tree(&seal.tree, "head tree lookup")
    }

    /// Reload the workspace for a (possibly different) timeline, deriving a
    /// baseline from its head tree when no saved state exists.
    pub(crate) fn rebind_workspace(&mut self, timeline: &str) -> RepoResult<()> {
        let loaded = Workspace::load(&self.root, timeline, Arc::clone(&self.store))?;
        self.workspace = if loaded.states().is_empty() {
            let head = self.timelines.head_of(timeline)?;
            let tree = self.tree_of_head(head)?;
            Workspace::from_tree(&self.root, timeline, Arc::clone(&self.store), &tree)
        } else {
            loaded
        };
        self.workspace.scan()?;
        self.workspace.save()?;
        Ok(())
    }
}
