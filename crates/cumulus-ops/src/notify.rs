//! Single-slot user notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Holds the latest notification; a new one replaces the previous.
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    current: Option<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a message.
    pub fn show(&mut self, message: impl Into<String>, severity: Severity) {
        self.current = Some(Notification {
            message: message.into(),
            severity,
            created_at: Utc::now(),
        });
    }

    /// The message currently shown.
    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Hide the current message.
    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_notification_wins() {
        let mut notes = Notifications::new();
        notes.show("loading", Severity::Info);
        notes.show("failed", Severity::Error);
        let current = notes.current().unwrap();
        assert_eq!(current.message, "failed");
        assert_eq!(current.severity, Severity::Error);
        assert_eq!(current.severity.to_string(), "error");

        notes.dismiss();
        assert!(notes.current().is_none());
    }
}
