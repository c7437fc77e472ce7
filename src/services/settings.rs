//! Persistence of [`NotificationSettings`].
//!
//! Settings are stored as one camelCase JSON record under [`SETTINGS_KEY`]
//! in a key-value [`SettingsStore`]. Loading never fails: missing, unreadable
//! or corrupt records fall back to defaults.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::AppError;
use crate::models::{NotificationSettings, NotificationSettingsUpdate};

/// Key the settings record is stored under.
pub const SETTINGS_KEY: &str = "emailNotificationSettings";

/// Key-value persistence port for client settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), AppError>;
}

/// Load settings from `store`, merging the persisted record onto defaults.
pub async fn load_settings(store: &dyn SettingsStore) -> NotificationSettings {
    let mut settings = NotificationSettings::default();

    let raw = match store.get(SETTINGS_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return settings,
        Err(e) => {
            log::warn!("[settings] Failed to read notification settings, using defaults: {}", e);
            return settings;
        }
    };

    match serde_json::from_str::<NotificationSettingsUpdate>(&raw) {
        Ok(stored) => stored.apply(&mut settings),
        Err(e) => {
            log::warn!("[settings] Ignoring corrupt notification settings record: {}", e);
        }
    }

    settings
}

/// Serialize `settings` and write it to `store`.
pub async fn save_settings(
    store: &dyn SettingsStore,
    settings: &NotificationSettings,
) -> Result<(), AppError> {
    let json = serde_json::to_string(settings)?;
    store.set(SETTINGS_KEY, json).await
}

/// In-memory settings store.
///
/// Used by tests and by one-shot commands that must not touch disk. Reads
/// and writes can be made to fail to exercise the fallback paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value currently stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::settings("memory store read failure"));
        }
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::internal("memory store poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::settings("memory store write failure"));
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::internal("memory store poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
