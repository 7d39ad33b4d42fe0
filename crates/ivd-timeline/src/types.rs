use serde::{Deserialize, Serialize};

/// Metadata for one timeline. The head hash lives in the heads map, not
/// here, so metadata edits never race head updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// Timeline name.
    pub name: String,
    /// Creation time, UTC nanoseconds.
    pub created_at: u64,
    /// Last head or metadata update, UTC nanoseconds.
    pub updated_at: u64,
    /// Free-form description.
    pub description: String,
    /// The timeline this one branched from, if any.
    pub parent_timeline: Option<String>,
}
