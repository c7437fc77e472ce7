//! Authentication commands.

use serde::Serialize;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::{CredentialService, MailApiClient, MailApiConfig};

/// Response for the `login` command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub api_url: String,
    pub email: String,
    pub can_view_pending: bool,
}

/// Validate `token` against the API and store it in the keychain.
pub async fn login(config: &AppConfig, token: &str) -> Result<LoginResponse, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::invalid_input_field("token must not be empty", "token"));
    }

    let client = MailApiClient::new(MailApiConfig {
        base_url: config.api_url.clone(),
        token: token.to_string(),
        timeout_secs: config.timeout_secs,
    })?;

    let profile = client.fetch_profile().await?;
    CredentialService::store_token(&config.api_url, token)?;
    log::info!("[auth] Stored token for {} ({})", config.api_url, profile.email);

    Ok(LoginResponse {
        api_url: config.api_url.clone(),
        can_view_pending: profile.allows(&config.required_permission),
        email: profile.email,
    })
}

/// Remove the stored token.
pub fn logout(config: &AppConfig) -> Result<(), AppError> {
    CredentialService::delete_token(&config.api_url)?;
    log::info!("[auth] Removed token for {}", config.api_url);
    Ok(())
}
