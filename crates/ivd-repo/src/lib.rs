//! High-level repository API for Ivaldi.
//!
//! [`Repository`] ties the subsystem crates together: the object store, the
//! workspace and its anvil, timelines with their crash-safe switch WAL, the
//! position catalog, and the overwrite log. Forging, gathering, sealing,
//! switching, resolving, and garbage collection all go through it.
//!
//! External collaborators (remote portals, message generation, credential
//! storage) are consumed through the traits in [`portal`]; the core never
//! implements them.

pub mod config;
pub mod error;
pub mod gc;
pub mod lock;
pub mod portal;
pub mod repository;
pub mod seal;
pub mod shelf;
pub mod switch;

pub use config::RepoConfig;
pub use error::{RepoError, RepoResult};
pub use gc::{DedupStats, GcReport};
pub use portal::{
    CredentialStore, DiffSummary, MessageSuggestion, PortalBundle, PortalError, PortalSync,
    SemanticMessageGenerator,
};
pub use repository::Repository;
pub use seal::SealOutcome;
pub use switch::SwitchOutcome;
