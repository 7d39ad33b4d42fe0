//! Interfaces for external collaborators.
//!
//! Remote portals, commit-message generation, and credential storage live
//! outside the core. The core only defines what it consumes from them and
//! what it hands to them; implementations arrive from the surrounding
//! tooling.

use ivd_objects::ObjectKind;
use ivd_types::Hash;

/// Summary of the gathered changes, handed to a message generator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Files on the anvil that were never sealed before.
    pub added: Vec<String>,
    /// Files on the anvil with changed content.
    pub modified: Vec<String>,
    /// Files on the anvil that were deleted.
    pub deleted: Vec<String>,
}

impl DiffSummary {
    /// Returns `true` if nothing is gathered.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// A proposed seal message with the generator's confidence in it.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageSuggestion {
    pub message: String,
    /// 0.0 to 1.0.
    pub confidence: f32,
}

/// Produces a seal message from a diff summary.
pub trait SemanticMessageGenerator {
    /// Propose a message, or `None` if the generator has nothing useful.
    fn suggest(&self, diff: &DiffSummary) -> Option<MessageSuggestion>;
}

/// One fetched reference with its seal and the objects needed to read it.
#[derive(Clone, Debug)]
pub struct PortalBundle {
    /// Remote reference name.
    pub reference: String,
    /// The seal the reference points at.
    pub seal: Hash,
    /// Reachable objects backing the seal, as `(hash, kind, payload)`.
    pub objects: Vec<(Hash, ObjectKind, Vec<u8>)>,
}

/// Errors a portal adapter may surface into the core.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("portal transport error: {0}")]
    Transport(String),

    #[error("portal rejected the request: {0}")]
    Rejected(String),

    #[error("portal requires authentication for {0}")]
    AuthRequired(String),
}

/// A named remote endpoint consuming and producing seals and trees.
pub trait PortalSync {
    /// Fetch a timeline's refs with their reachable objects.
    fn fetch(&mut self, timeline: &str) -> Result<Vec<PortalBundle>, PortalError>;

    /// Upload seals for a timeline.
    fn upload(&mut self, timeline: &str, seals: &[Hash]) -> Result<(), PortalError>;
}

/// Opaque credential lookup.
pub trait CredentialStore {
    /// Token for a service, if one is stored.
    fn get_token(&self, service: &str) -> Option<String>;
}
