//! Timeline management for Ivaldi.
//!
//! A timeline is a named line of history with an independent head. This
//! crate owns the heads map (`HEADS.json`), the timeline metadata
//! (`timelines/config.json`), and the write-ahead log that makes timeline
//! switching crash-safe (`journal/switch.json`).
//!
//! The switch orchestration itself lives in `ivd-repo`, which holds the
//! workspace, worktree, and store handles a switch needs; this crate
//! provides the rules (creation, deletion, current tracking) and the WAL
//! primitives it builds on.

pub mod error;
pub mod manager;
pub mod types;
pub mod wal;

pub use error::{TimelineError, TimelineResult};
pub use manager::TimelineManager;
pub use types::Timeline;
pub use wal::{RecoveryAction, SwitchJournal, SwitchPhase, SwitchRecord};
