//! Reachability analysis and garbage collection.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use ivd_chunk::{Chunker, DedupIndex};
use ivd_objects::ObjectKind;
use ivd_types::{CancelToken, Hash};
use ivd_workspace::Workspace;

use crate::error::{RepoError, RepoResult};
use crate::repository::Repository;

/// What a GC sweep did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Objects found reachable.
    pub reachable: usize,
    /// Objects removed from the store.
    pub removed: usize,
}

/// Content-defined deduplication statistics over the stored blobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Blobs examined.
    pub blobs: usize,
    /// Total chunks cut across all blobs.
    pub chunks: usize,
    /// Distinct chunk contents.
    pub unique_chunks: usize,
    /// Bytes across all chunks.
    pub total_bytes: u64,
    /// Bytes after deduplication.
    pub unique_bytes: u64,
}

impl Repository {
    /// Remove every object unreachable from the repository's roots.
    ///
    /// Roots: all timeline heads, all position histories, overwrite
    /// originals and replacements, protected seals, every timeline's
    /// persisted workspace state (candidate trees and uncommitted blobs),
    /// and any in-flight switch stash. Seals pull in their trees and blobs.
    pub fn gc(&mut self) -> RepoResult<GcReport> {
        let reachable = self.reachable_set()?;
        let removed = self.store.gc(&reachable)?;
        info!(reachable = reachable.len(), removed, "garbage collection complete");
        Ok(GcReport {
            reachable: reachable.len(),
            removed,
        })
    }

    /// [`Self::gc`], checking `cancel` during the sweep. A cancelled sweep
    /// has removed only unreachable objects and can be rerun.
    pub fn gc_with_cancel(&mut self, cancel: &CancelToken) -> RepoResult<GcReport> {
        let reachable = self.reachable_set()?;
        let removed = self.store.gc_with_cancel(&reachable, cancel)?;
        Ok(GcReport {
            reachable: reachable.len(),
            removed,
        })
    }

    /// Measure how much the stored blobs would deduplicate under
    /// content-defined chunking.
    ///
    /// Read-only maintenance statistics: every blob is cut with the
    /// default FastCDC configuration and chunk references are counted.
    pub fn dedup_statistics(&self) -> RepoResult<DedupStats> {
        let chunker = Chunker::new();
        let mut index = DedupIndex::new();
        let mut stats = DedupStats::default();
        let mut unique_sizes: std::collections::HashMap<Hash, u64> =
            std::collections::HashMap::new();

        for hash in self.store.list(ObjectKind::Blob)? {
            let (payload, _) = self.store.get(&hash)?;
            stats.blobs += 1;
            for chunk in chunker.chunk(&payload) {
                stats.chunks += 1;
                stats.total_bytes += chunk.length as u64;
                index.insert(chunk.hash);
                unique_sizes.entry(chunk.hash).or_insert(chunk.length as u64);
            }
        }
        stats.unique_chunks = index.len();
        stats.unique_bytes = unique_sizes.values().sum();
        Ok(stats)
    }

    /// Verify every stored object's payload against its hash. Returns the
    /// corrupt hashes (empty means the store is sound).
    pub fn verify_objects(&self) -> RepoResult<Vec<Hash>> {
        let mut corrupt = Vec::new();
        for hash in self.store.list_all()? {
            if self.store.verify(&hash).is_err() {
                corrupt.push(hash);
            }
        }
        Ok(corrupt)
    }

    fn reachable_set(&self) -> RepoResult<HashSet<Hash>> {
        let mut reachable: HashSet<Hash> = HashSet::new();
        let mut seal_queue: Vec<Hash> = Vec::new();

        // Timeline heads and every history entry.
        for name in self.timelines.names() {
            let head = self.timelines.head_of(name)?;
            if !head.is_zero() {
                seal_queue.push(head);
            }
        }
        for timeline in self.catalog.position.timelines() {
            seal_queue.extend(self.catalog.position.history(timeline).iter().copied());
        }

        // Displaced seals stay addressable as long as their record exists.
        for record in self.overwrites.records() {
            seal_queue.push(record.original);
            seal_queue.push(record.replacement);
        }

        // Workspace states across all timelines: candidate trees plus
        // gathered-but-unsealed blobs.
        for name in self.timelines.names() {
            let ws = Workspace::load(self.root(), name, Arc::clone(&self.store))?;
            if let Some(candidate) = ws.candidate() {
                self.mark_tree(candidate, &mut reachable)?;
            }
            for state in ws.states().values() {
                reachable.insert(state.content_hash);
                if let Some(blob) = state.blob_hash {
                    reachable.insert(blob);
                }
            }
        }

        // An in-flight switch protects its stash blobs and target.
        if let Some(stash) = self.load_stash()? {
            for entry in &stash.entries {
                reachable.extend(entry.base);
                reachable.extend(entry.new);
            }
        }

        // Walk seals through parents, trees, and blobs.
        while let Some(seal_hash) = seal_queue.pop() {
            if !reachable.insert(seal_hash) {
                continue;
            }
            let seal = self
                .load_seal(&seal_hash, "gc reachability walk")
                .map_err(|e| match e {
                    RepoError::MissingObject { hash, .. } => RepoError::MissingObject {
                        hash,
                        context: "gc reachability walk (run verify)".to_string(),
                    },
                    other => other,
                })?;
            seal_queue.extend(seal.parents.iter().copied());
            self.mark_tree(seal.tree, &mut reachable)?;
        }

        Ok(reachable)
    }

    /// Mark a tree and everything under it.
    fn mark_tree(&self, tree_hash: Hash, reachable: &mut HashSet<Hash>) -> RepoResult<()> {
        if !reachable.insert(tree_hash) {
            return Ok(());
        }
        let tree = self.load_tree(&tree_hash, "gc reachability walk")?;
        for entry in tree.entries() {
            match entry.kind {
                ObjectKind::Tree => self.mark_tree(entry.hash, reachable)?,
                _ => {
                    reachable.insert(entry.hash);
                }
            }
        }
        Ok(())
    }
}
