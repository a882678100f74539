//! Notification message types

use serde::{Deserialize, Serialize};

/// Outcome a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Confirm,
    Reject,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "Confirm",
            Self::Reject => "Reject",
        }
    }
}

/// A rendered, fire-and-forget notification.
///
/// Derived deterministically from an event and its outcome; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}
