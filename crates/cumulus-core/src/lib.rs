//! Core types and traits for cumulus.
//!
//! This crate provides the data model shared by the orchestrator and its
//! collaborators: remote file entries and directory listings, path helpers,
//! error types, session configuration and the [`FileDataPort`] trait through
//! which every remote call is made.

mod config;
mod entry;
mod error;
pub mod path;
mod port;

pub use config::{RetryPolicy, SessionConfig, SessionConfigBuilder};
pub use entry::{DirectoryListing, EntryKind, FileEntry, PathNode};
pub use error::{PortError, PortErrorKind, ValidationError};
pub use port::{DeleteFailure, DeleteReport, FileDataPort, LocalBoxFuture, PortResult, UploadFile};

/// Maximum length of a single entry name, in bytes.
pub const MAX_NAME_LEN: usize = 255;
