//! Content-addressed object storage for Ivaldi.
//!
//! Every piece of data -- blobs, trees, seals, tags -- is stored as an
//! immutable object identified by its content hash. On disk an object lives
//! at `<objdir>/<algo>/<hh>/<rest>` and its file is a single kind byte
//! followed by the payload.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FsObjectStore`] -- the durable backend: temp-file + fsync + rename
//!   writes, reader/writer locking, GC sweep
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. `put` is idempotent: re-putting identical bytes is a no-op.
//! 3. Concurrent reads are always safe; writes and GC exclude everything else.
//! 4. The store never interprets object payloads.
//! 5. All I/O errors are propagated with operation and path context.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
