//! Native desktop notifications via notify-rust.
//!
//! Notifications auto-dismiss after ten seconds. Where the notification
//! server supports actions (freedesktop platforms), clicking one opens the
//! email's detail page in the browser.

use async_trait::async_trait;
use notify_rust::{Notification, Timeout};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::error::AppError;
use crate::models::{DesktopPermission, PendingEmail};
use crate::services::alerts::NotificationSink;
use crate::services::mail_client::detail_url;

/// Application name shown by the notification server.
const APP_NAME: &str = "Approval Notifier";

/// Auto-dismiss delay for desktop notifications.
const DISMISS_AFTER_MS: u32 = 10_000;

/// Action id of the notification's default (click) action.
const OPEN_ACTION: &str = "default";

/// Desktop notification sink.
pub struct DesktopNotifier {
    web_base_url: String,
    permission: Mutex<DesktopPermission>,
}

impl DesktopNotifier {
    /// `web_base_url` is used to build the click-through link.
    pub fn new(web_base_url: impl Into<String>) -> Self {
        Self {
            web_base_url: web_base_url.into(),
            permission: Mutex::new(DesktopPermission::Default),
        }
    }

    fn current(&self) -> DesktopPermission {
        self.permission
            .lock()
            .map(|p| *p)
            .unwrap_or(DesktopPermission::Denied)
    }
}

#[async_trait]
impl NotificationSink for DesktopNotifier {
    async fn permission(&self) -> DesktopPermission {
        self.current()
    }

    async fn request_permission(&self) -> DesktopPermission {
        let decided = tokio::task::spawn_blocking(probe_notification_server)
            .await
            .unwrap_or(DesktopPermission::Denied);

        if let Ok(mut permission) = self.permission.lock() {
            *permission = decided;
        }
        decided
    }

    async fn show(&self, email: &PendingEmail) -> Result<(), AppError> {
        let body = format!("From: {}\n{}", email.from, email.subject);
        let url = detail_url(&self.web_base_url, email.id);
        let (tx, rx) = oneshot::channel();

        // The worker keeps waiting for a click after reporting the show result
        tokio::task::spawn_blocking(move || present(body, url, tx));

        rx.await
            .map_err(|_| AppError::notification("Notification worker exited"))?
    }
}

/// Decide the permission by checking that a notification server answers.
#[cfg(all(unix, not(target_os = "macos")))]
fn probe_notification_server() -> DesktopPermission {
    match notify_rust::get_server_information() {
        Ok(info) => {
            log::debug!("[desktop] Notification server: {} {}", info.name, info.version);
            DesktopPermission::Granted
        }
        Err(e) => {
            log::warn!("[desktop] No notification server reachable: {}", e);
            DesktopPermission::Denied
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn probe_notification_server() -> DesktopPermission {
    DesktopPermission::Granted
}

fn build_notification(body: &str) -> Notification {
    let mut notification = Notification::new();
    notification
        .summary("New email pending approval")
        .body(body)
        .appname(APP_NAME)
        .action(OPEN_ACTION, "Open")
        .timeout(Timeout::Milliseconds(DISMISS_AFTER_MS));
    notification
}

#[cfg(all(unix, not(target_os = "macos")))]
fn present(body: String, url: String, result: oneshot::Sender<Result<(), AppError>>) {
    match build_notification(&body).show() {
        Ok(handle) => {
            let _ = result.send(Ok(()));
            handle.wait_for_action(|action| {
                if action == OPEN_ACTION {
                    open_in_browser(&url);
                }
            });
        }
        Err(e) => {
            let _ = result.send(Err(AppError::notification(format!(
                "Failed to show notification: {}",
                e
            ))));
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn present(body: String, _url: String, result: oneshot::Sender<Result<(), AppError>>) {
    let shown = build_notification(&body)
        .show()
        .map(|_| ())
        .map_err(|e| AppError::notification(format!("Failed to show notification: {}", e)));
    let _ = result.send(shown);
}

#[cfg(all(unix, not(target_os = "macos")))]
fn open_in_browser(url: &str) {
    if let Err(e) = std::process::Command::new("xdg-open").arg(url).spawn() {
        log::warn!("[desktop] Failed to open {}: {}", url, e);
    }
}
