//! Foundation types for Ivaldi.
//!
//! This crate provides the hash, identity, and validation primitives used
//! throughout the Ivaldi system. Every other `ivd-*` crate depends on
//! `ivd-types`.
//!
//! # Key Types
//!
//! - [`Hash`] — Algorithm-tagged content address (BLAKE3 default, SHA-256 alt)
//! - [`HashAlgo`] — The hash algorithm tag
//! - [`HashWriter`] — Incremental hasher for streaming large files
//! - [`Identity`] — Author/committer name and email
//! - [`TypeError`] — Validation failures at the system boundary

pub mod cancel;
pub mod error;
pub mod hash;
pub mod identity;
pub mod time;
pub mod validate;

pub use cancel::CancelToken;
pub use error::{TypeError, TypeResult};
pub use hash::{Hash, HashAlgo, HashWriter};
pub use identity::Identity;
pub use time::now_nanos;
pub use validate::{
    normalize_path, validate_message, validate_timeline_name, RESERVED_TIMELINE_NAMES,
};
