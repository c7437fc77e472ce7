//! Data models for the application.
//!
//! These models represent the settings persisted in the local store, the
//! pending emails returned by the approval API, and the alert payloads.

pub mod alert;
pub mod notification_settings;
pub mod pending_email;

// Re-exports for convenient access
pub use alert::{DesktopPermission, Toast};
pub use notification_settings::{
    NotificationSettings, NotificationSettingsUpdate, DEFAULT_CHECK_INTERVAL_MS,
    RECOGNIZED_CHECK_INTERVALS_MS,
};
pub use pending_email::{PendingEmail, PendingEmailPage};
