//! History-rewrite accounting for Ivaldi.
//!
//! Any operation that displaces a previously committed seal from a
//! timeline's head history must record an [`OverwriteRecord`] carrying a
//! non-empty justification before the new head is written. The displaced
//! seal stays in the object store and addressable by hash; the record is
//! the audit trail that says why it was displaced.
//!
//! Seals can be protected: a protected seal rejects every overwrite.

pub mod error;
pub mod log;
pub mod record;

pub use error::{OverwriteError, OverwriteResult};
pub use log::OverwriteLog;
pub use record::{OverwriteCategory, OverwriteRecord};
