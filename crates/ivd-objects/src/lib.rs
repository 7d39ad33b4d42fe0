//! Object model for Ivaldi: trees, seals, and tags.
//!
//! Every object kind has a deterministic binary encoding: encoding the same
//! logical content always yields byte-identical output, so content addresses
//! are stable across implementations. Decoding then re-encoding is
//! byte-identical as well.
//!
//! # Object Kinds
//!
//! - [`ObjectKind::Blob`] — raw bytes, no framing beyond the store's kind byte
//! - [`Tree`] — ordered directory listing, entries strictly ascending by name
//! - [`Seal`] — an immutable commit: tree, parents, identities, message
//! - [`Tag`] — a named, annotated pointer at another object

pub mod error;
mod cursor;
pub mod kind;
pub mod seal;
pub mod tag;
pub mod tree;

pub use error::{ObjectError, ObjectResult};
pub use kind::ObjectKind;
pub use seal::Seal;
pub use tag::Tag;
pub use tree::{EntryMode, Tree, TreeEntry};
