//! Pending email model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email waiting in the approval queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEmail {
    /// Backend identifier of the queued email.
    pub id: i64,

    /// Sender address as shown to approvers.
    pub from: String,

    /// Subject line.
    pub subject: String,

    /// When the email entered the queue.
    pub created_at: DateTime<Utc>,
}

/// One page of the pending listing, as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingEmailPage {
    #[serde(default)]
    pub items: Vec<PendingEmail>,
}
