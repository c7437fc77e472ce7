//! Runtime configuration.
//!
//! Loaded from environment variables with logged defaults; CLI flags
//! override individual values afterwards. Notification preferences are not
//! part of this; they live in the settings store.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;
use crate::services::notification_poller::DEFAULT_PAGE_SIZE;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUIRED_PERMISSION: &str = "emails:read";

/// Resolved configuration for commands.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the approval API.
    pub api_url: String,

    /// Base URL of the web front-end, for detail links.
    pub web_url: String,

    /// Directory holding the settings database.
    pub data_dir: PathBuf,

    /// Pending emails fetched per check.
    pub page_size: u32,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Permission that grants viewing the approval queue.
    pub required_permission: String,

    /// Custom alert sound; a built-in chime is used when unset.
    pub sound_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, AppError> {
        let api_url: String = try_load("NOTIFIER_API_URL", DEFAULT_API_URL)?;
        let web_url = var("NOTIFIER_WEB_URL").unwrap_or_else(|| api_url.clone());

        let page_size: u32 = try_load("NOTIFIER_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?;
        if page_size == 0 {
            return Err(AppError::invalid_input_field(
                "page size must be at least 1",
                "NOTIFIER_PAGE_SIZE",
            ));
        }

        Ok(Self {
            api_url,
            web_url,
            data_dir: var("NOTIFIER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            page_size,
            timeout_secs: try_load("NOTIFIER_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())?,
            required_permission: try_load(
                "NOTIFIER_REQUIRED_PERMISSION",
                DEFAULT_REQUIRED_PERMISSION,
            )?,
            sound_file: var("NOTIFIER_SOUND_FILE").map(PathBuf::from),
        })
    }
}

/// Platform data directory, e.g. `~/.local/share/approval-notifier`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("approval-notifier")
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        log::debug!("[config] {} not set, using default: {}", key, default);
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| AppError::invalid_input_field(format!("Invalid {} value: {}", key, e), key))
}
