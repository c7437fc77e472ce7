//! Approval API client.
//!
//! Thin HTTP client for the parts of the approval backend the notifier
//! needs: the pending email listing and the caller's profile.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{PendingEmail, PendingEmailPage};

/// Endpoint listing emails awaiting approval.
pub const PENDING_ENDPOINT: &str = "/mail/pending";

/// Endpoint describing the authenticated principal.
pub const PROFILE_ENDPOINT: &str = "/auth/profile";

/// Source of the current pending email listing.
///
/// The poller only depends on this trait, so tests can script responses.
#[async_trait]
pub trait PendingEmailSource: Send + Sync {
    /// Fetch up to `page_size` pending emails, newest first.
    async fn list_pending(&self, page_size: u32) -> Result<Vec<PendingEmail>, AppError>;
}

/// Approval API client configuration.
#[derive(Debug, Clone)]
pub struct MailApiConfig {
    /// Base URL of the backend (e.g., `https://mail.example.com`).
    pub base_url: String,

    /// Bearer token; empty when the user never logged in.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MailApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Profile of the authenticated principal.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserProfile {
    /// Whether this principal holds `permission`. Admins hold every permission.
    pub fn allows(&self, permission: &str) -> bool {
        self.role.as_deref() == Some("admin") || self.permissions.iter().any(|p| p == permission)
    }
}

/// Approval API client.
#[derive(Debug, Clone)]
pub struct MailApiClient {
    client: Client,
    config: MailApiConfig,
}

impl MailApiClient {
    /// Create a new client.
    pub fn new(config: MailApiConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();

        if !config.token.is_empty() {
            let token_value = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
                .map_err(|_| AppError::authentication("Invalid token format"))?;
            headers.insert(header::AUTHORIZATION, token_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        api_url(&self.config.base_url, path)
    }

    /// Map a response to `T`, translating error statuses.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)));
        }

        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => Err(AppError::authentication(
                "Session expired or token revoked. Run `approval-notifier login` again.",
            )),
            StatusCode::FORBIDDEN => Err(AppError::forbidden(format!(
                "Not allowed to access {}",
                endpoint
            ))),
            StatusCode::TOO_MANY_REQUESTS => Err(AppError::api_full(
                "Rate limit exceeded",
                status_code,
                endpoint,
            )),
            _ => {
                let message = error_message(&body)
                    .unwrap_or_else(|| format!("Request failed ({}): {}", status_code, body));
                Err(AppError::api_full(message, status_code, endpoint))
            }
        }
    }

    /// Fetch the first page of pending emails.
    pub async fn list_pending(&self, page_size: u32) -> Result<Vec<PendingEmail>, AppError> {
        let url = self.api_url(PENDING_ENDPOINT);
        let response = self
            .client
            .get(&url)
            .query(&[("page", "1".to_string()), ("limit", page_size.to_string())])
            .send()
            .await?;

        let page: PendingEmailPage = self.handle_response(response, PENDING_ENDPOINT).await?;
        log::debug!("[mail-api] {} pending email(s) listed", page.items.len());
        Ok(page.items)
    }

    /// Fetch the authenticated principal's profile.
    pub async fn fetch_profile(&self) -> Result<UserProfile, AppError> {
        let url = self.api_url(PROFILE_ENDPOINT);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response, PROFILE_ENDPOINT).await
    }

    /// Whether the principal may view pending emails.
    pub async fn can_view_pending(&self, permission: &str) -> Result<bool, AppError> {
        let profile = self.fetch_profile().await?;
        Ok(profile.allows(permission))
    }
}

#[async_trait]
impl PendingEmailSource for MailApiClient {
    async fn list_pending(&self, page_size: u32) -> Result<Vec<PendingEmail>, AppError> {
        MailApiClient::list_pending(self, page_size).await
    }
}

/// Join the API prefix onto `base_url`.
fn api_url(base_url: &str, path: &str) -> String {
    format!("{}/api{}", base_url.trim_end_matches('/'), path)
}

/// Detail page of a queued email in the web front-end.
pub fn detail_url(web_base_url: &str, email_id: i64) -> String {
    format!("{}/emails/{}", web_base_url.trim_end_matches('/'), email_id)
}

/// Extract the backend's error message (`{"message": ...}` or `{"error": ...}`).
fn error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let message = value.get("message").or_else(|| value.get("error"))?;

    match message {
        serde_json::Value::String(s) => Some(s.clone()),
        // Validation errors come back as an array of messages
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}
