use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use ivd_objects::ObjectKind;
use ivd_types::{Hash, HashAlgo, HashWriter};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// Buffer size for streaming puts.
const STREAM_BUF: usize = 64 * 1024;

/// Durable content-addressed store rooted at an object directory.
///
/// Objects live at `<root>/<algo>/<hh>/<rest>` where `hh` is the first two
/// hex characters of the hash. Each file is one kind byte followed by the
/// payload. Writes go through a temp file in the object directory, are
/// fsynced, renamed into place, and the parent directory is fsynced, so a
/// crash never leaves a partially visible object. Rename atomicity also
/// makes concurrent puts of identical content safe.
pub struct FsObjectStore {
    root: PathBuf,
    algo: HashAlgo,
    // Writes and GC take the write side; reads share the read side.
    lock: RwLock<()>,
}

impl FsObjectStore {
    /// Open (or create) an object store rooted at `root`, hashing new
    /// objects with BLAKE3.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with_algo(root, HashAlgo::Blake3)
    }

    /// Open (or create) an object store with an explicit hash algorithm.
    pub fn open_with_algo(root: impl Into<PathBuf>, algo: HashAlgo) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io("create_dir", &root, e))?;
        Ok(Self {
            root,
            algo,
            lock: RwLock::new(()),
        })
    }

    /// The object directory this store is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash.to_hex();
        self.root
            .join(hash.algo().as_str())
            .join(&hex[..2])
            .join(&hex[2..])
    }

    /// Write `kind` byte + payload bytes from `fill` into place for `hash`.
    ///
    /// Caller must hold the write lock. No-op if the object already exists.
    fn install<F>(&self, hash: &Hash, kind: ObjectKind, fill: F) -> StoreResult<()>
    where
        F: FnOnce(&mut NamedTempFile) -> StoreResult<()>,
    {
        let final_path = self.object_path(hash);
        if final_path.exists() {
            return Ok(());
        }
        let parent = final_path
            .parent()
            .expect("object path always has a parent");
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create_dir", parent, e))?;

        // Temp file lives in the object root so the rename stays on one
        // filesystem. Dropping it on any error removes the file.
        let mut tmp = NamedTempFile::new_in(&self.root)
            .map_err(|e| StoreError::io("create_temp", &self.root, e))?;
        tmp.write_all(&[kind.kind_byte()])
            .map_err(|e| StoreError::io("write", tmp.path().to_path_buf(), e))?;
        fill(&mut tmp)?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io("fsync", tmp.path().to_path_buf(), e))?;
        tmp.persist(&final_path)
            .map_err(|e| StoreError::io("rename", &final_path, e.error))?;
        sync_dir(parent)?;

        debug!(hash = %hash.short(), %kind, "stored object");
        Ok(())
    }

    fn read_object_file(&self, hash: &Hash) -> StoreResult<(Vec<u8>, ObjectKind)> {
        let path = self.object_path(hash);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*hash))
            }
            Err(e) => return Err(StoreError::io("read", path, e)),
        };
        let Some((&kind_byte, payload)) = bytes.split_first() else {
            return Err(StoreError::Corrupt {
                hash: *hash,
                reason: "object file is empty".into(),
            });
        };
        let kind = ObjectKind::from_kind_byte(kind_byte).ok_or(StoreError::Corrupt {
            hash: *hash,
            reason: format!("unknown kind byte: {kind_byte}"),
        })?;
        Ok((payload.to_vec(), kind))
    }

    /// Enumerate object files on disk, reconstructing hashes from the path
    /// layout. Entries that do not parse are skipped.
    fn scan_objects(&self) -> Vec<(Hash, PathBuf)> {
        let mut found = Vec::new();
        for algo in [HashAlgo::Blake3, HashAlgo::Sha256] {
            let algo_dir = self.root.join(algo.as_str());
            let Ok(shards) = fs::read_dir(&algo_dir) else {
                continue;
            };
            for shard in shards.flatten() {
                let prefix = shard.file_name();
                let Some(prefix) = prefix.to_str().map(str::to_owned) else {
                    continue;
                };
                let Ok(files) = fs::read_dir(shard.path()) else {
                    continue;
                };
                for file in files.flatten() {
                    let Some(rest) = file.file_name().to_str().map(str::to_owned) else {
                        continue;
                    };
                    match Hash::parse(&format!("{}:{}{}", algo.as_str(), prefix, rest)) {
                        Ok(hash) => found.push((hash, file.path())),
                        Err(_) => {
                            warn!(path = %file.path().display(), "skipping unreadable object entry");
                        }
                    }
                }
            }
        }
        found
    }
}

fn sync_dir(dir: &Path) -> StoreResult<()> {
    #[cfg(unix)]
    {
        File::open(dir)
            .and_then(|f| f.sync_all())
            .map_err(|e| StoreError::io("fsync_dir", dir, e))?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

impl ObjectStore for FsObjectStore {
    fn algo(&self) -> HashAlgo {
        self.algo
    }

    fn put(&self, data: &[u8], kind: ObjectKind) -> StoreResult<Hash> {
        let hash = Hash::compute(data, self.algo);
        let _guard = self.lock.write().expect("store lock poisoned");
        self.install(&hash, kind, |tmp| {
            tmp.write_all(data)
                .map_err(|e| StoreError::io("write", tmp.path().to_path_buf(), e))
        })?;
        Ok(hash)
    }

    fn put_stream(&self, reader: &mut dyn Read, kind: ObjectKind) -> StoreResult<Hash> {
        // Spill to a temp file while hashing so large blobs never sit in
        // memory; the hash is only known at the end, so the temp is renamed
        // (or discarded, if the object already exists) afterwards.
        let _guard = self.lock.write().expect("store lock poisoned");

        let mut tmp = NamedTempFile::new_in(&self.root)
            .map_err(|e| StoreError::io("create_temp", &self.root, e))?;
        tmp.write_all(&[kind.kind_byte()])
            .map_err(|e| StoreError::io("write", tmp.path().to_path_buf(), e))?;

        let mut hasher = HashWriter::new(self.algo);
        let mut buf = vec![0u8; STREAM_BUF];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| StoreError::io("read", tmp.path().to_path_buf(), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])
                .map_err(|e| StoreError::io("write", tmp.path().to_path_buf(), e))?;
        }
        let hash = hasher.finalize();

        let final_path = self.object_path(&hash);
        if final_path.exists() {
            return Ok(hash);
        }
        let parent = final_path
            .parent()
            .expect("object path always has a parent");
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create_dir", parent, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io("fsync", tmp.path().to_path_buf(), e))?;
        tmp.persist(&final_path)
            .map_err(|e| StoreError::io("rename", &final_path, e.error))?;
        sync_dir(parent)?;

        debug!(hash = %hash.short(), %kind, "stored streamed object");
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> StoreResult<(Vec<u8>, ObjectKind)> {
        if hash.is_zero() {
            return Err(StoreError::ZeroHash);
        }
        let _guard = self.lock.read().expect("store lock poisoned");
        self.read_object_file(hash)
    }

    fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        if hash.is_zero() {
            return Ok(false);
        }
        let _guard = self.lock.read().expect("store lock poisoned");
        Ok(self.object_path(hash).exists())
    }

    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<Hash>> {
        let _guard = self.lock.read().expect("store lock poisoned");
        let mut hashes = Vec::new();
        for (hash, path) in self.scan_objects() {
            let mut first = [0u8; 1];
            let readable = File::open(&path)
                .and_then(|mut f| f.read_exact(&mut first))
                .is_ok();
            if !readable {
                warn!(path = %path.display(), "skipping unreadable object entry");
                continue;
            }
            if ObjectKind::from_kind_byte(first[0]) == Some(kind) {
                hashes.push(hash);
            }
        }
        Ok(hashes)
    }

    fn list_all(&self) -> StoreResult<Vec<Hash>> {
        let _guard = self.lock.read().expect("store lock poisoned");
        Ok(self.scan_objects().into_iter().map(|(h, _)| h).collect())
    }

    fn delete(&self, hash: &Hash) -> StoreResult<bool> {
        let _guard = self.lock.write().expect("store lock poisoned");
        let path = self.object_path(hash);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("remove", path, e)),
        }
    }

    fn gc(&self, reachable: &HashSet<Hash>) -> StoreResult<usize> {
        // Hold the write side across the whole sweep so no reader observes
        // a half-collected store.
        let _guard = self.lock.write().expect("store lock poisoned");
        let mut removed = 0;
        for (hash, path) in self.scan_objects() {
            if reachable.contains(&hash) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io("remove", path, e)),
            }
        }
        debug!(removed, "GC sweep complete");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_roundtrip() {
        let (_dir, store) = open_store();
        let hash = store.put(b"hello", ObjectKind::Blob).unwrap();
        let (data, kind) = store.get(&hash).unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(kind, ObjectKind::Blob);
        assert!(store.exists(&hash).unwrap());
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, store) = open_store();
        let h1 = store.put(b"same", ObjectKind::Blob).unwrap();
        let h2 = store.put(b"same", ObjectKind::Blob).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, store) = open_store();
        let missing = Hash::blake3(b"never stored");
        assert!(matches!(
            store.get(&missing),
            Err(StoreError::NotFound(h)) if h == missing
        ));
        assert!(!store.exists(&missing).unwrap());
    }

    #[test]
    fn zero_hash_is_rejected() {
        let (_dir, store) = open_store();
        assert!(matches!(store.get(&Hash::ZERO), Err(StoreError::ZeroHash)));
        assert!(!store.exists(&Hash::ZERO).unwrap());
    }

    #[test]
    fn object_file_layout() {
        let (_dir, store) = open_store();
        let hash = store.put(b"layout", ObjectKind::Tree).unwrap();
        let hex = hash.to_hex();
        let path = store
            .root()
            .join("blake3")
            .join(&hex[..2])
            .join(&hex[2..]);
        let bytes = fs::read(path).unwrap();
        assert_eq!(bytes[0], ObjectKind::Tree.kind_byte());
        assert_eq!(&bytes[1..], b"layout");
    }

    #[test]
    fn verify_detects_corruption() {
        let (_dir, store) = open_store();
        let hash = store.put(b"pristine", ObjectKind::Blob).unwrap();
        store.verify(&hash).unwrap();

        // Flip a payload byte on disk behind the store's back.
        let hex = hash.to_hex();
        let path = store.root().join("blake3").join(&hex[..2]).join(&hex[2..]);
        let mut bytes = fs::read(&path).unwrap();
        bytes[1] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.verify(&hash),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn list_filters_by_kind() {
        let (_dir, store) = open_store();
        let blob = store.put(b"a blob", ObjectKind::Blob).unwrap();
        let tree = store.put(b"a tree", ObjectKind::Tree).unwrap();
        let seal = store.put(b"a seal", ObjectKind::Seal).unwrap();

        assert_eq!(store.list(ObjectKind::Blob).unwrap(), vec![blob]);
        assert_eq!(store.list(ObjectKind::Tree).unwrap(), vec![tree]);
        assert_eq!(store.list(ObjectKind::Seal).unwrap(), vec![seal]);
        assert_eq!(store.list_all().unwrap().len(), 3);
    }

    #[test]
    fn delete_and_gc() {
        let (_dir, store) = open_store();
        let keep = store.put(b"keep me", ObjectKind::Blob).unwrap();
        let drop1 = store.put(b"drop one", ObjectKind::Blob).unwrap();
        let drop2 = store.put(b"drop two", ObjectKind::Tree).unwrap();

        let reachable: HashSet<Hash> = [keep].into_iter().collect();
        let removed = store.gc(&reachable).unwrap();
        assert_eq!(removed, 2);
        assert!(store.exists(&keep).unwrap());
        assert!(!store.exists(&drop1).unwrap());
        assert!(!store.exists(&drop2).unwrap());

        assert!(store.delete(&keep).unwrap());
        assert!(!store.delete(&keep).unwrap());
    }

    #[test]
    fn put_stream_matches_put() {
        let (_dir, store) = open_store();
        let data = vec![0xabu8; 200_000];
        let streamed = store
            .put_stream(&mut std::io::Cursor::new(&data), ObjectKind::Blob)
            .unwrap();
        let direct = Hash::blake3(&data);
        assert_eq!(streamed, direct);
        let (back, kind) = store.get(&streamed).unwrap();
        assert_eq!(back, data);
        assert_eq!(kind, ObjectKind::Blob);
    }

    #[test]
    fn sha256_store_tags_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FsObjectStore::open_with_algo(dir.path().join("objects"), HashAlgo::Sha256).unwrap();
        let hash = store.put(b"interop", ObjectKind::Blob).unwrap();
        assert_eq!(hash.algo(), HashAlgo::Sha256);
        assert!(store.exists(&hash).unwrap());
        assert_eq!(store.list(ObjectKind::Blob).unwrap(), vec![hash]);
    }

    #[test]
    fn corrupt_empty_file_is_reported() {
        let (_dir, store) = open_store();
        let hash = store.put(b"will truncate", ObjectKind::Blob).unwrap();
        let hex = hash.to_hex();
        let path = store.root().join("blake3").join(&hex[..2]).join(&hex[2..]);
        fs::write(&path, b"").unwrap();
        assert!(matches!(store.get(&hash), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn concurrent_identical_puts_are_safe() {
        use std::sync::Arc;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::open(dir.path().join("objects")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.put(b"racing bytes", ObjectKind::Blob).unwrap())
            })
            .collect();
        let hashes: Vec<Hash> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
        let (data, _) = store.get(&hashes[0]).unwrap();
        assert_eq!(data, b"racing bytes");
    }
}
