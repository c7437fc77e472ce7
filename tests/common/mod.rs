//! Shared fakes for poller integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use approval_notifier_lib::error::AppError;
use approval_notifier_lib::models::{DesktopPermission, PendingEmail, Toast};
use approval_notifier_lib::services::{
    AlertDispatcher, CapabilityGate, MemoryStore, NotificationPoller, NotificationSink,
    PendingEmailSource, PollerDeps, SoundSink, ToastSink,
};

/// Build a pending email with a deterministic timestamp.
pub fn email(id: i64) -> PendingEmail {
    PendingEmail {
        id,
        from: format!("user{}@example.com", id),
        subject: format!("Quarterly update #{}", id),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    }
}

/// Pending email source returning whatever the test last configured.
#[derive(Default)]
pub struct ScriptedSource {
    pending: Mutex<Vec<i64>>,
    failing: AtomicBool,
    blocked: AtomicBool,
    release: Notify,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedSource {
    pub fn set_pending(&self, ids: &[i64]) {
        *self.pending.lock().unwrap() = ids.to_vec();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next fetches wait until [`ScriptedSource::unblock`].
    pub fn block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn unblock(&self) {
        self.blocked.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most fetches that were ever running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn fetch(&self, page_size: u32) -> Result<Vec<PendingEmail>, AppError> {
        while self.blocked.load(Ordering::SeqCst) {
            let released = self.release.notified();
            if !self.blocked.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::network("Failed to connect to server"));
        }

        let ids = self.pending.lock().unwrap().clone();
        Ok(ids.into_iter().take(page_size as usize).map(email).collect())
    }
}

#[async_trait]
impl PendingEmailSource for ScriptedSource {
    async fn list_pending(&self, page_size: u32) -> Result<Vec<PendingEmail>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);

        let result = self.fetch(page_size).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default)]
pub struct RecordingSound {
    pub plays: AtomicUsize,
    pub releases: AtomicUsize,
}

#[async_trait]
impl SoundSink for RecordingSound {
    async fn play(&self) -> Result<(), AppError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingDesktop {
    pub permission: Mutex<DesktopPermission>,
    pub requests: AtomicUsize,
    pub shown: Mutex<Vec<i64>>,
}

impl Default for RecordingDesktop {
    fn default() -> Self {
        Self {
            permission: Mutex::new(DesktopPermission::Default),
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingDesktop {
    async fn permission(&self) -> DesktopPermission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> DesktopPermission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = DesktopPermission::Granted;
        DesktopPermission::Granted
    }

    async fn show(&self, email: &PendingEmail) -> Result<(), AppError> {
        self.shown.lock().unwrap().push(email.id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingToasts {
    pub toasts: Mutex<Vec<Toast>>,
}

impl ToastSink for RecordingToasts {
    fn show(&self, toast: Toast) -> Result<(), AppError> {
        self.toasts.lock().unwrap().push(toast);
        Ok(())
    }
}

/// A poller wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub poller: NotificationPoller,
    pub source: Arc<ScriptedSource>,
    pub store: Arc<MemoryStore>,
    pub capability: CapabilityGate,
    pub sound: Arc<RecordingSound>,
    pub desktop: Arc<RecordingDesktop>,
    pub toasts: Arc<RecordingToasts>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(store: Arc<MemoryStore>) -> Self {
        let source = Arc::new(ScriptedSource::default());
        let capability = CapabilityGate::new(true);
        let sound = Arc::new(RecordingSound::default());
        let desktop = Arc::new(RecordingDesktop::default());
        let toasts = Arc::new(RecordingToasts::default());

        let poller = NotificationPoller::new(PollerDeps {
            source: source.clone(),
            store: store.clone(),
            capability: capability.clone(),
            alerts: AlertDispatcher::new(sound.clone(), desktop.clone(), toasts.clone()),
            page_size: 50,
        })
        .await;

        Self {
            poller,
            source,
            store,
            capability,
            sound,
            desktop,
            toasts,
        }
    }

    /// Ids announced by toast so far, in order.
    pub fn toasted_ids(&self) -> Vec<i64> {
        self.toasts.ids()
    }

    pub fn desktop_ids(&self) -> Vec<i64> {
        self.desktop.shown.lock().unwrap().clone()
    }

    pub fn sound_plays(&self) -> usize {
        self.sound.plays.load(Ordering::SeqCst)
    }

    /// Wait until no check is in flight.
    pub async fn settle(&self) {
        let mut status = self.poller.subscribe_status();
        let _ = status.wait_for(|s| !s.is_checking).await;
    }

    /// Wait until a check is in flight.
    pub async fn wait_until_checking(&self) {
        let mut status = self.poller.subscribe_status();
        let _ = status.wait_for(|s| s.is_checking).await;
    }
}

impl RecordingToasts {
    pub fn ids(&self) -> Vec<i64> {
        self.toasts.lock().unwrap().iter().map(|t| t.email_id).collect()
    }
}

/// Move virtual time past the debounce window.
pub async fn past_debounce() {
    tokio::time::advance(Duration::from_millis(5001)).await;
}
