use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ivd_types::Hash;

use crate::error::{ChunkError, ChunkResult};

/// Reference counts per chunk hash.
///
/// Every file stored in chunked form holds one reference on each of its
/// chunks. When a file version becomes unreachable its references are
/// released; chunks that reach zero are eligible for GC.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupIndex {
    counts: BTreeMap<Hash, u64>,
}

impl DedupIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reference to `hash`. Returns the new count.
    pub fn insert(&mut self, hash: Hash) -> u64 {
        let count = self.counts.entry(hash).or_insert(0);
        *count += 1;
        *count
    }

    /// Release one reference. Returns the remaining count; the entry is
    /// removed when it reaches zero.
    pub fn release(&mut self, hash: &Hash) -> ChunkResult<u64> {
        let Some(count) = self.counts.get_mut(hash) else {
            return Err(ChunkError::NotReferenced(hash.to_string()));
        };
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.counts.remove(hash);
        }
        Ok(remaining)
    }

    /// Current reference count for a chunk (zero if unknown).
    pub fn count(&self, hash: &Hash) -> u64 {
        self.counts.get(hash).copied().unwrap_or(0)
    }

    /// Returns `true` if `hash` has at least one reference.
    pub fn is_referenced(&self, hash: &Hash) -> bool {
        self.counts.contains_key(hash)
    }

    /// Number of distinct referenced chunks.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if no chunks are referenced.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Of the given candidates, the ones with no outstanding references.
    pub fn unreferenced<'a>(&self, candidates: impl IntoIterator<Item = &'a Hash>) -> Vec<Hash> {
        candidates
            .into_iter()
            .filter(|h| !self.is_referenced(h))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(data: &[u8]) -> Hash {
        Hash::blake3(data)
    }

    #[test]
    fn insert_counts_up() {
        let mut index = DedupIndex::new();
        let chunk = h(b"chunk");
        assert_eq!(index.insert(chunk), 1);
        assert_eq!(index.insert(chunk), 2);
        assert_eq!(index.count(&chunk), 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn release_counts_down_and_removes_at_zero() {
        let mut index = DedupIndex::new();
        let chunk = h(b"chunk");
        index.insert(chunk);
        index.insert(chunk);

        assert_eq!(index.release(&chunk).unwrap(), 1);
        assert!(index.is_referenced(&chunk));
        assert_eq!(index.release(&chunk).unwrap(), 0);
        assert!(!index.is_referenced(&chunk));
        assert!(index.is_empty());
    }

    #[test]
    fn release_unknown_fails() {
        let mut index = DedupIndex::new();
        assert!(matches!(
            index.release(&h(b"never inserted")),
            Err(ChunkError::NotReferenced(_))
        ));
    }

    #[test]
    fn unreferenced_filters_candidates() {
        let mut index = DedupIndex::new();
        let live = h(b"live");
        let dead = h(b"dead");
        index.insert(live);

        let candidates = [live, dead];
        assert_eq!(index.unreferenced(candidates.iter()), vec![dead]);
    }

    #[test]
    fn serde_roundtrip() {
        let mut index = DedupIndex::new();
        index.insert(h(b"a"));
        index.insert(h(b"a"));
        index.insert(h(b"b"));

        let json = serde_json::to_string(&index).unwrap();
        let back: DedupIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}
