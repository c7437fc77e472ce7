//! Alert channel models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PendingEmail;

/// Desktop notification permission, mirroring the native tri-state API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesktopPermission {
    /// Not decided yet; must be requested before showing anything.
    #[default]
    Default,
    Granted,
    Denied,
}

/// In-app toast message for one newly pending email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub title: String,
    pub sender: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub email_id: i64,
}

impl Toast {
    /// Build the toast announcing `email`.
    pub fn for_email(email: &PendingEmail) -> Self {
        Self {
            title: "New email pending approval".to_string(),
            sender: email.from.clone(),
            subject: email.subject.clone(),
            received_at: email.created_at,
            email_id: email.id,
        }
    }
}

impl std::fmt::Display for Toast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} from {} ({})",
            self.title,
            self.subject,
            self.sender,
            self.received_at.format("%Y-%m-%d %H:%M")
        )
    }
}
