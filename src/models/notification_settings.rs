//! Notification settings model.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Check intervals offered to the user, in milliseconds.
pub const RECOGNIZED_CHECK_INTERVALS_MS: [u64; 4] = [30_000, 60_000, 300_000, 600_000];

/// Default check interval (one minute).
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 60_000;

/// Notification preferences persisted in the settings store.
///
/// Always fully populated: persisted records are merged onto [`Default`]
/// when loaded, so a field missing on disk never leaves a gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    /// Master switch for the poller.
    pub enabled: bool,

    /// Show native desktop notifications.
    pub browser_notifications: bool,

    /// Emit in-app toasts.
    pub toast_notifications: bool,

    /// Play a sound once per batch of new emails.
    pub sound_enabled: bool,

    /// Polling cadence in milliseconds.
    pub check_interval: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            browser_notifications: true,
            toast_notifications: true,
            sound_enabled: false, // audio is opt-in
            check_interval: DEFAULT_CHECK_INTERVAL_MS,
        }
    }
}

impl NotificationSettings {
    /// The polling period as a [`Duration`].
    ///
    /// A zero interval cannot drive a timer and falls back to the default.
    pub fn interval(&self) -> Duration {
        if self.check_interval == 0 {
            Duration::from_millis(DEFAULT_CHECK_INTERVAL_MS)
        } else {
            Duration::from_millis(self.check_interval)
        }
    }

    /// Whether `check_interval` is one of the values offered in the UI.
    pub fn has_recognized_interval(&self) -> bool {
        RECOGNIZED_CHECK_INTERVALS_MS.contains(&self.check_interval)
    }
}

/// Partial update of [`NotificationSettings`].
///
/// Also the shape persisted records are parsed into, so older or partially
/// written records still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_notifications: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub toast_notifications: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<u64>,
}

impl NotificationSettingsUpdate {
    /// Merge the present fields into `settings`.
    pub fn apply(&self, settings: &mut NotificationSettings) {
        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(browser) = self.browser_notifications {
            settings.browser_notifications = browser;
        }
        if let Some(toast) = self.toast_notifications {
            settings.toast_notifications = toast;
        }
        if let Some(sound) = self.sound_enabled {
            settings.sound_enabled = sound;
        }
        if let Some(interval) = self.check_interval {
            settings.check_interval = interval;
        }
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
