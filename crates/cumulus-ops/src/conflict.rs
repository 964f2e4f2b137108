//! Destination conflicts detected while planning a batch move.

use serde::{Deserialize, Serialize};

/// A requested move that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The source path being moved.
    pub source_path: String,
    /// The destination path that was refused.
    pub destination_path: String,
    /// The kind of conflict.
    pub kind: ConflictKind,
}

impl Conflict {
    /// Create a new conflict.
    pub fn new(source_path: String, destination_path: String, kind: ConflictKind) -> Self {
        Self {
            source_path,
            destination_path,
            kind,
        }
    }

    /// Create a name-exists conflict.
    pub fn name_exists(source_path: String, destination_path: String) -> Self {
        Self::new(source_path, destination_path, ConflictKind::NameExists)
    }

    /// Create a self-move conflict.
    pub fn self_move(source_path: String, destination_path: String) -> Self {
        Self::new(source_path, destination_path, ConflictKind::SelfMove)
    }
}

/// The kind of conflict encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// An entry with the same name already exists at the destination.
    NameExists,
    /// The entry is the destination directory itself.
    SelfMove,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameExists => write!(f, "An item with this name already exists"),
            Self::SelfMove => write!(f, "Cannot move a directory into itself"),
        }
    }
}
