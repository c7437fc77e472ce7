//! CLI command handlers.
//!
//! Commands are organized by functionality:
//! - `auth`: keychain token management
//! - `check`: one-shot listing of pending emails
//! - `notification_settings`: reading and changing persisted settings
//! - `watch`: the long-running poller

pub mod auth;
pub mod check;
pub mod notification_settings;
pub mod watch;

use crate::config::AppConfig;
use crate::db::{self, SqliteSettingsStore};
use crate::error::AppError;
use crate::services::{CredentialService, MailApiClient, MailApiConfig};

/// Build an API client authenticated with the stored token.
pub(crate) fn build_client(config: &AppConfig) -> Result<MailApiClient, AppError> {
    MailApiClient::new(MailApiConfig {
        base_url: config.api_url.clone(),
        token: CredentialService::token_or_empty(&config.api_url),
        timeout_secs: config.timeout_secs,
    })
}

/// Open the settings database under the configured data directory.
pub(crate) async fn open_settings_store(config: &AppConfig) -> Result<SqliteSettingsStore, AppError> {
    let pool = db::initialize(&db::get_db_path(&config.data_dir)).await?;
    Ok(SqliteSettingsStore::new(pool))
}
