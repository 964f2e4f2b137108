//! Session configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Backoff policy for idempotent reads.
///
/// Mutations are never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
        }
    }
}

/// Configuration for an orchestrator session.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SessionConfig {
    /// Root of the remote store; restore-from-trash target.
    #[builder(default = "\"/\".to_string()")]
    #[serde(default = "default_root")]
    pub root_path: String,

    /// Reserved trash directory.
    #[builder(default = "\"/.trash\".to_string()")]
    #[serde(default = "default_trash")]
    pub trash_path: String,

    /// Maximum number of tasks kept in the ledger.
    #[builder(default = "30")]
    #[serde(default = "default_history_limit")]
    pub task_history_limit: usize,

    /// Pointer travel needed before a press becomes a drag.
    #[builder(default = "8.0")]
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold_px: f64,

    /// Maximum number of remembered recent paths.
    #[builder(default = "8")]
    #[serde(default = "default_recent_limit")]
    pub recent_paths_limit: usize,

    /// Backoff for listing fetches.
    #[builder(default)]
    #[serde(default)]
    pub read_retry: RetryPolicy,
}

fn default_root() -> String {
    "/".to_string()
}

fn default_trash() -> String {
    "/.trash".to_string()
}

fn default_history_limit() -> usize {
    30
}

fn default_drag_threshold() -> f64 {
    8.0
}

fn default_recent_limit() -> usize {
    8
}

impl SessionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref trash) = self.trash_path {
            if !trash.starts_with('/') || trash.trim_end_matches('/').is_empty() {
                return Err("Trash path must be an absolute path below the root".to_string());
            }
        }
        if let Some(ref root) = self.root_path {
            if !root.starts_with('/') {
                return Err("Root path must be absolute".to_string());
            }
        }
        if self.task_history_limit == Some(0) {
            return Err("Task history limit must be greater than 0".to_string());
        }
        if let Some(threshold) = self.drag_threshold_px {
            if !(threshold.is_finite() && threshold >= 0.0) {
                return Err("Drag threshold must be a non-negative number".to_string());
            }
        }
        if let Some(ref retry) = self.read_retry {
            if retry.max_attempts == 0 {
                return Err("Retry policy needs at least one attempt".to_string());
            }
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Create a new session config builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Name of the trash directory inside its parent.
    pub fn trash_name(&self) -> &str {
        crate::path::file_name(&self.trash_path)
    }

    /// Parent directory of the trash directory.
    pub fn trash_parent(&self) -> &str {
        crate::path::parent(&self.trash_path)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root_path: default_root(),
            trash_path: default_trash(),
            task_history_limit: default_history_limit(),
            drag_threshold_px: default_drag_threshold(),
            recent_paths_limit: default_recent_limit(),
            read_retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_defaults() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.trash_path, "/.trash");
        assert_eq!(config.task_history_limit, 30);
        assert_eq!(config.drag_threshold_px, 8.0);
        assert_eq!(config.trash_name(), ".trash");
        assert_eq!(config.trash_parent(), "/");
    }

    #[test]
    fn test_config_builder_rejects_root_trash() {
        let result = SessionConfig::builder().trash_path("/").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder_rejects_zero_history() {
        let result = SessionConfig::builder().task_history_limit(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 300,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: SessionConfig = serde_json::from_str(r#"{"trash_path": "/bin"}"#).unwrap();
        assert_eq!(config.trash_path, "/bin");
        assert_eq!(config.recent_paths_limit, 8);
    }
}
