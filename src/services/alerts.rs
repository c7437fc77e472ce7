//! Alert fan-out for newly pending emails.
//!
//! Three independent channels: a sound, a desktop notification and an
//! in-app toast. Each is gated by its own settings flag and a failure in
//! one never stops the others.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{DesktopPermission, NotificationSettings, PendingEmail, Toast};

/// Audible alert.
#[async_trait]
pub trait SoundSink: Send + Sync {
    /// Play the alert sound once.
    async fn play(&self) -> Result<(), AppError>;

    /// Release audio resources. Playing again re-acquires them.
    fn release(&self) {}
}

/// Native desktop notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Current permission, without prompting.
    async fn permission(&self) -> DesktopPermission;

    /// Ask for permission. Only called while the permission is undecided.
    async fn request_permission(&self) -> DesktopPermission;

    /// Show a notification announcing `email`.
    async fn show(&self, email: &PendingEmail) -> Result<(), AppError>;
}

/// In-app toast messages. Fire-and-forget.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast) -> Result<(), AppError>;
}

/// What a dispatch actually delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sound_played: bool,
    pub desktop_shown: usize,
    pub toasts_shown: usize,
}

/// Fans a batch of new emails out to the enabled channels.
#[derive(Clone)]
pub struct AlertDispatcher {
    sound: Arc<dyn SoundSink>,
    desktop: Arc<dyn NotificationSink>,
    toasts: Arc<dyn ToastSink>,
}

impl AlertDispatcher {
    pub fn new(
        sound: Arc<dyn SoundSink>,
        desktop: Arc<dyn NotificationSink>,
        toasts: Arc<dyn ToastSink>,
    ) -> Self {
        Self {
            sound,
            desktop,
            toasts,
        }
    }

    /// Alert for `emails`: one sound per batch, then one desktop
    /// notification and one toast per email.
    pub async fn dispatch(
        &self,
        settings: &NotificationSettings,
        emails: &[PendingEmail],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        if emails.is_empty() {
            return report;
        }

        if settings.sound_enabled {
            match self.sound.play().await {
                Ok(()) => report.sound_played = true,
                Err(e) => log::warn!("[alerts] Sound playback failed: {}", e),
            }
        }

        let desktop_allowed = settings.browser_notifications && self.desktop_allowed().await;

        for email in emails {
            if desktop_allowed {
                match self.desktop.show(email).await {
                    Ok(()) => report.desktop_shown += 1,
                    Err(e) => log::warn!(
                        "[alerts] Desktop notification for email {} failed: {}",
                        email.id,
                        e
                    ),
                }
            }

            if settings.toast_notifications {
                match self.toasts.show(Toast::for_email(email)) {
                    Ok(()) => report.toasts_shown += 1,
                    Err(e) => log::warn!("[alerts] Toast for email {} failed: {}", email.id, e),
                }
            }
        }

        report
    }

    /// Resolve the desktop permission, requesting it if still undecided.
    async fn desktop_allowed(&self) -> bool {
        match self.desktop.permission().await {
            DesktopPermission::Granted => true,
            DesktopPermission::Denied => false,
            DesktopPermission::Default => {
                let decided = self.desktop.request_permission().await;
                log::info!("[alerts] Desktop notification permission: {:?}", decided);
                decided == DesktopPermission::Granted
            }
        }
    }

    /// Release resources held by the channels.
    pub fn release(&self) {
        self.sound.release();
    }
}
