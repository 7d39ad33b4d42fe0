use std::collections::HashMap;
use std::sync::RwLock;

use ivd_objects::ObjectKind;
use ivd_types::{Hash, HashAlgo};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// `HashMap`-backed object store for tests and embedding.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Hash, (ObjectKind, Vec<u8>)>>,
    algo: HashAlgo,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    /// Create an empty store hashing with BLAKE3.
    pub fn new() -> Self {
        Self::with_algo(HashAlgo::Blake3)
    }

    /// Create an empty store with an explicit algorithm.
    pub fn with_algo(algo: HashAlgo) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            algo,
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().expect("store lock poisoned").len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn algo(&self) -> HashAlgo {
        self.algo
    }

    fn put(&self, data: &[u8], kind: ObjectKind) -> StoreResult<Hash> {
        let hash = Hash::compute(data, self.algo);
        let mut objects = self.objects.write().expect("store lock poisoned");
        objects.entry(hash).or_insert_with(|| (kind, data.to_vec()));
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> StoreResult<(Vec<u8>, ObjectKind)> {
        if hash.is_zero() {
            return Err(StoreError::ZeroHash);
        }
        let objects = self.objects.read().expect("store lock poisoned");
        objects
            .get(hash)
            .map(|(kind, data)| (data.clone(), *kind))
            .ok_or(StoreError::NotFound(*hash))
    }

    fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        if hash.is_zero() {
            return Ok(false);
        }
        let objects = self.objects.read().expect("store lock poisoned");
        Ok(objects.contains_key(hash))
    }

    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<Hash>> {
        let objects = self.objects.read().expect("store lock poisoned");
        Ok(objects
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(h, _)| *h)
            .collect())
    }

    fn delete(&self, hash: &Hash) -> StoreResult<bool> {
        let mut objects = self.objects.write().expect("store lock poisoned");
        Ok(objects.remove(hash).is_some())
    }
}
