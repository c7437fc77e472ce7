//! One-shot pending email check.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commands::build_client;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::PendingEmail;

/// Response for the `check` command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub pending_email_count: usize,
    pub checked_at: DateTime<Utc>,
    pub emails: Vec<PendingEmail>,
}

impl std::fmt::Display for CheckResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} email(s) pending approval", self.pending_email_count)?;
        for email in &self.emails {
            writeln!(
                f,
                "  #{:<6} {}  {}  ({})",
                email.id,
                email.from,
                email.subject,
                email.created_at.format("%Y-%m-%d %H:%M")
            )?;
        }
        Ok(())
    }
}

/// Fetch the first page of pending emails.
///
/// Unlike the poller, errors are returned so the user sees why it failed.
pub async fn check_pending(config: &AppConfig) -> Result<CheckResponse, AppError> {
    let client = build_client(config)?;
    let emails = client.list_pending(config.page_size).await?;

    Ok(CheckResponse {
        pending_email_count: emails.len(),
        checked_at: Utc::now(),
        emails,
    })
}
