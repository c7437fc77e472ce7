//! API token storage in the OS keychain.
//!
//! Tokens live in the system's native credential storage (Keychain on
//! macOS, Credential Manager on Windows, the kernel keyring on Linux), keyed
//! by the normalized API base URL.

use crate::error::AppError;
use keyring::Entry;

/// Service name used in the keychain.
const SERVICE_NAME: &str = "approval-notifier";

/// Credential storage operations.
pub struct CredentialService;

impl CredentialService {
    /// Store the bearer token for `api_url`.
    pub fn store_token(api_url: &str, token: &str) -> Result<(), AppError> {
        let entry = Self::get_entry(api_url)?;

        entry
            .set_password(token)
            .map_err(|e| AppError::credential_storage(format!("Failed to store token: {}", e)))
    }

    /// Retrieve the bearer token for `api_url`.
    pub fn get_token(api_url: &str) -> Result<String, AppError> {
        let entry = Self::get_entry(api_url)?;

        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => AppError::not_found_with_id("credential", api_url),
            _ => AppError::credential_storage(format!("Failed to retrieve token: {}", e)),
        })
    }

    /// Delete the token for `api_url`. Deleting a missing token is not an error.
    pub fn delete_token(api_url: &str) -> Result<(), AppError> {
        let entry = Self::get_entry(api_url)?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::credential_storage(format!(
                "Failed to delete token: {}",
                e
            ))),
        }
    }

    /// Token for `api_url`, or an empty string when none is stored.
    ///
    /// Keychain failures are logged; requests then go out unauthenticated
    /// and the backend's 401 explains what to do.
    pub fn token_or_empty(api_url: &str) -> String {
        match Self::get_token(api_url) {
            Ok(token) => token,
            Err(AppError::NotFound { .. }) => {
                log::warn!("[credentials] No token stored for {}; run `login` first", api_url);
                String::new()
            }
            Err(e) => {
                log::error!("[credentials] {}", e);
                String::new()
            }
        }
    }

    fn get_entry(api_url: &str) -> Result<Entry, AppError> {
        let account = normalize_url(api_url);

        Entry::new(SERVICE_NAME, &account).map_err(|e| {
            AppError::credential_storage(format!("Failed to create keyring entry: {}", e))
        })
    }
}

/// Normalize a URL for use as an account identifier.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}
