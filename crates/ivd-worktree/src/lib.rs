//! Working directory materialization for Ivaldi.
//!
//! Two cooperating pieces:
//!
//! - [`checkout`] replaces the tracked contents of a working directory with
//!   a target tree, atomically per file: bytes are staged in an overlay
//!   directory and moved into place with a rename pair, so a crash never
//!   leaves a half-written file visible.
//! - [`Stash`] captures uncommitted work relative to a base tree before a
//!   checkout and reapplies it afterwards, writing conflict files where the
//!   base moved underneath the change.
//!
//! Timeline switching composes the two; shelves reuse the same stash
//! machinery under a user-chosen name.

pub mod checkout;
pub mod error;
pub mod stash;

pub use checkout::{checkout, checkout_with_cancel};
pub use error::{WorktreeError, WorktreeResult};
pub use stash::{ReapplyReport, Stash, StashEntry};
