use std::collections::HashSet;
use std::io::Read;

use ivd_objects::ObjectKind;
use ivd_types::{CancelToken, Hash, HashAlgo};

use crate::error::{StoreError, StoreResult};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same payload always produces
///   the same hash and re-putting it is a no-op.
/// - `put` is linearizable per hash: the first writer wins, later identical
///   writes observe the existing object.
/// - Concurrent reads are always safe; `put`, `delete`, and `gc` exclude
///   other operations.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// The algorithm this store hashes new objects with.
    fn algo(&self) -> HashAlgo;

    /// Write an object and return its content address.
    fn put(&self, data: &[u8], kind: ObjectKind) -> StoreResult<Hash>;

    /// Write an object from a reader without buffering it whole.
    ///
    /// The default implementation buffers; [`crate::FsObjectStore`] overrides
    /// it to hash and spill to the temp file incrementally.
    fn put_stream(&self, reader: &mut dyn Read, kind: ObjectKind) -> StoreResult<Hash> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| StoreError::io("read", "<stream>", e))?;
        self.put(&data, kind)
    }

    /// Read an object's payload and kind. Fails with
    /// [`StoreError::NotFound`] if absent.
    fn get(&self, hash: &Hash) -> StoreResult<(Vec<u8>, ObjectKind)>;

    /// Check whether an object exists.
    fn exists(&self, hash: &Hash) -> StoreResult<bool>;

    /// Read the object and check that its payload still hashes to `hash`.
    fn verify(&self, hash: &Hash) -> StoreResult<()> {
        let (data, _) = self.get(hash)?;
        let computed = Hash::compute(&data, hash.algo());
        if computed == *hash {
            Ok(())
        } else {
            Err(StoreError::HashMismatch {
                expected: *hash,
                computed,
            })
        }
    }

    /// Enumerate stored objects of one kind, discarding unreadable entries.
    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<Hash>>;

    /// Enumerate every stored object.
    fn list_all(&self) -> StoreResult<Vec<Hash>> {
        let mut all = Vec::new();
        for kind in ObjectKind::all() {
            all.extend(self.list(kind)?);
        }
        Ok(all)
    }

    /// Delete an object. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only; deleting a referenced object
    /// corrupts the repository.
    fn delete(&self, hash: &Hash) -> StoreResult<bool>;

    /// Remove every object whose hash is not in `reachable`.
    ///
    /// Safe to run while no writer holds outstanding puts. Returns the
    /// number of objects removed.
    fn gc(&self, reachable: &HashSet<Hash>) -> StoreResult<usize> {
        let mut removed = 0;
        for hash in self.list_all()? {
            if !reachable.contains(&hash) && self.delete(&hash)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// [`Self::gc`], checking `cancel` between objects.
    ///
    /// Deletes one object at a time rather than holding the writer side
    /// for the whole sweep, so cancellation can land promptly. Objects
    /// already removed stay gone; the sweep can simply be rerun.
    fn gc_with_cancel(
        &self,
        reachable: &HashSet<Hash>,
        cancel: &CancelToken,
    ) -> StoreResult<usize> {
        let mut removed = 0;
        for hash in self.list_all()? {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            if !reachable.contains(&hash) && self.delete(&hash)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
