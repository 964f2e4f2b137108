//! Remote file entry and directory listing types.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::path;

/// Kind of remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }
}

/// Immutable snapshot of one remote item.
///
/// Entries are never edited in place by the data-access layer; a refetch
/// replaces them wholesale. The optimistic cache produces renamed copies
/// with [`FileEntry::relocated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Entry name (last path component).
    pub name: CompactString,
    /// Absolute path of the entry.
    pub path: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    #[serde(default)]
    pub size: u64,
    /// Last modification time.
    #[serde(rename = "lastModified")]
    pub modified_at: DateTime<Utc>,
    /// Owning user.
    #[serde(default)]
    pub owner: String,
}

impl FileEntry {
    /// Create a file entry located at `path`.
    pub fn file(path: impl Into<String>, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self::new(path.into(), EntryKind::File, size, modified_at)
    }

    /// Create a directory entry located at `path`.
    pub fn directory(path: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self::new(path.into(), EntryKind::Directory, 0, modified_at)
    }

    fn new(path: String, kind: EntryKind, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            name: CompactString::from(path::file_name(&path)),
            path,
            kind,
            size,
            modified_at,
            owner: String::new(),
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this entry is hidden (dotfile).
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Return a copy of this entry living at `new_path`.
    pub fn relocated(&self, new_path: &str) -> Self {
        Self {
            name: CompactString::from(path::file_name(new_path)),
            path: new_path.to_string(),
            ..self.clone()
        }
    }
}

/// One step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    /// Display name of the directory.
    pub name: String,
    /// Absolute path of the directory.
    pub path: String,
}

/// The contents of one remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    /// Path of the listed directory; also the cache key.
    pub current_path: String,
    /// Breadcrumb trail from the root to `current_path`.
    #[serde(default)]
    pub breadcrumbs: Vec<PathNode>,
    /// Entries directly inside the directory.
    #[serde(rename = "items")]
    pub entries: Vec<FileEntry>,
}

impl DirectoryListing {
    /// Create a listing with breadcrumbs derived from `current_path`.
    pub fn new(current_path: impl Into<String>, entries: Vec<FileEntry>) -> Self {
        let current_path = current_path.into();
        Self {
            breadcrumbs: path::breadcrumbs(&current_path),
            current_path,
            entries,
        }
    }

    /// Find an entry by name.
    pub fn find(&self, name: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check whether an entry with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Iterate over entry names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the listing has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
