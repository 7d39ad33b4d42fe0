//! Working tree tracking for Ivaldi.
//!
//! The workspace scans the working directory, classifies every file against
//! its sealed baseline, and maintains the anvil: the set of files marked for
//! inclusion in the next seal. From the anvil it builds the candidate tree
//! that [`ivd-store`] persists and a seal captures.
//!
//! # Key Types
//!
//! - [`Workspace`] — scan / gather / discard / candidate tree / persistence
//! - [`FileState`] — one tracked file with its classification and anvil flag
//! - [`IgnoreEngine`] — `.ivaldiignore` pattern evaluation

pub mod error;
pub mod ignore;
pub mod state;
pub mod workspace;

pub use error::{WorkspaceError, WorkspaceResult};
pub use ignore::IgnoreEngine;
pub use state::{FileState, FileStatus, ScanReport};
pub use workspace::Workspace;

/// Files up to this size are hashed with a single read; larger files are
/// hashed incrementally.
pub const STREAMING_THRESHOLD: u64 = 5 * 1024 * 1024;
