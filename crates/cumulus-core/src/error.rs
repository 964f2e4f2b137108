//! Error types for validation and remote calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input rejected locally, before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Entry name is empty or whitespace.
    #[error("Name cannot be empty")]
    EmptyName,

    /// `.` or `..`.
    #[error("Invalid name: {0}")]
    ReservedName(String),

    /// Name contains a path separator.
    #[error("Name cannot contain '{0}'")]
    ContainsSeparator(char),

    /// Name exceeds the maximum length.
    #[error("Name is too long ({len} bytes, max 255)")]
    TooLong { len: usize },

    /// Navigation path is empty.
    #[error("Path is required")]
    EmptyPath,

    /// Navigation path is not absolute.
    #[error("Path should start with / (did you mean {suggestion}?)")]
    RelativePath { suggestion: String },

    /// Navigation path contains repeated whitespace.
    #[error("Path contains repeated spaces")]
    RepeatedWhitespace,
}

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortErrorKind {
    /// Connection failure or timeout.
    Network,
    /// Authentication or authorization failure.
    Unauthorized,
    /// The addressed entry does not exist.
    NotFound,
    /// The entry being created already exists.
    AlreadyExists,
    /// The service asked the client to slow down.
    RateLimited,
    /// The service failed internally.
    Server,
}

/// Error returned by a [`crate::FileDataPort`] call.
///
/// Always carries a human-readable reason suitable for display.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct PortError {
    /// Kind of failure.
    pub kind: PortErrorKind,
    /// Human-readable reason.
    pub reason: String,
}

impl PortError {
    /// Create a new port error.
    pub fn new(kind: PortErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a not-found error for a path.
    pub fn not_found(path: &str) -> Self {
        Self::new(PortErrorKind::NotFound, format!("Path not found: {path}"))
    }

    /// Create an already-exists error for a path.
    pub fn already_exists(path: &str) -> Self {
        Self::new(PortErrorKind::AlreadyExists, format!("Already exists: {path}"))
    }

    /// Whether an idempotent read may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, PortErrorKind::Server | PortErrorKind::RateLimited)
    }

    /// Whether this error reports a pre-existing entry.
    pub fn is_already_exists(&self) -> bool {
        self.kind == PortErrorKind::AlreadyExists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_display_is_reason() {
        let err = PortError::not_found("/missing");
        assert_eq!(err.to_string(), "Path not found: /missing");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(PortError::new(PortErrorKind::Server, "boom").is_retryable());
        assert!(PortError::new(PortErrorKind::RateLimited, "slow down").is_retryable());
        assert!(!PortError::new(PortErrorKind::Unauthorized, "no").is_retryable());
    }
}
