//! Position tracking for Ivaldi.
//!
//! The position catalog answers "where am I and what has happened here":
//! the per-timeline history of seals, the current head, the memorable name
//! assigned to every seal, user aliases, and the per-timeline iteration
//! counters. The whole catalog persists as a single JSON document
//! (`position.json`) reloaded on startup.

pub mod catalog;
pub mod error;
pub mod names;
pub mod position;

pub use catalog::Catalog;
pub use error::{HistoryError, HistoryResult};
pub use names::{Aliases, MemorableNames};
pub use position::{Iterations, Position};
