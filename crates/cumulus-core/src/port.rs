//! The File Data Access Port: the storage abstraction the orchestrator calls.
//!
//! Implementations wrap whatever transport talks to the remote store (HTTP
//! client, in-memory fake). They carry no orchestration logic: no caching,
//! no retries, no conflict detection.
//!
//! # Dyn-compatibility
//!
//! Methods return boxed futures so that `Rc<dyn FileDataPort>` works. The
//! futures are not `Send`: the orchestrator runs on a single cooperative
//! thread, like a browser event loop.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::entry::DirectoryListing;
use crate::error::PortError;

/// Boxed, non-`Send` future returned by every port method.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Result type of a port call.
pub type PortResult<T> = Result<T, PortError>;

/// A file to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Target file name.
    pub name: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl UploadFile {
    /// Create a new upload.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A path the store refused to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
    /// Path that was not deleted.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Per-path outcome of a multi-path delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    /// Paths that were deleted.
    pub deleted: Vec<String>,
    /// Paths that were not deleted.
    pub failed: Vec<DeleteFailure>,
}

impl DeleteReport {
    /// Check if every requested path was deleted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remote file store.
pub trait FileDataPort {
    /// List the entries of a directory.
    fn list_directory<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, PortResult<DirectoryListing>>;

    /// Permanently delete entries.
    ///
    /// Returns `Err` only when the whole request failed; per-path failures
    /// are reported in the [`DeleteReport`].
    fn delete_entries<'a>(&'a self, paths: &'a [String]) -> LocalBoxFuture<'a, PortResult<DeleteReport>>;

    /// Move (or rename) one entry. `destination` is the full new path.
    fn move_entry<'a>(&'a self, source: &'a str, destination: &'a str) -> LocalBoxFuture<'a, PortResult<()>>;

    /// Create a directory named `name` inside `parent`.
    fn create_directory<'a>(&'a self, parent: &'a str, name: &'a str) -> LocalBoxFuture<'a, PortResult<()>>;

    /// Upload a file into `directory`.
    fn upload_file<'a>(&'a self, file: &'a UploadFile, directory: &'a str) -> LocalBoxFuture<'a, PortResult<()>>;
}
