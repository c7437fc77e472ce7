//! Notification settings commands.

use crate::commands::open_settings_store;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{NotificationSettings, NotificationSettingsUpdate, RECOGNIZED_CHECK_INTERVALS_MS};
use crate::services::settings::{load_settings, save_settings, SettingsStore};

/// Get the current notification settings.
pub async fn get_notification_settings(config: &AppConfig) -> Result<NotificationSettings, AppError> {
    let store = open_settings_store(config).await?;
    Ok(load_settings(&store).await)
}

/// Merge `update` into the stored settings and persist the result.
///
/// A running `watch` picks the change up on its next start.
pub async fn update_notification_settings(
    config: &AppConfig,
    update: NotificationSettingsUpdate,
) -> Result<NotificationSettings, AppError> {
    let store = open_settings_store(config).await?;
    apply_update(&store, update).await
}

/// Load, merge and save against any store.
pub async fn apply_update(
    store: &dyn SettingsStore,
    update: NotificationSettingsUpdate,
) -> Result<NotificationSettings, AppError> {
    if update.check_interval == Some(0) {
        return Err(AppError::invalid_input_field(
            "check interval must be positive",
            "interval",
        ));
    }

    let mut settings = load_settings(store).await;
    update.apply(&mut settings);

    if !settings.has_recognized_interval() {
        log::warn!(
            "[settings] Check interval {}ms is not one of {:?}",
            settings.check_interval,
            RECOGNIZED_CHECK_INTERVALS_MS
        );
    }

    save_settings(store, &settings).await?;
    Ok(settings)
}
