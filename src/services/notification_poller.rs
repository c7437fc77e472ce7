//! Pending-email notification poller.
//!
//! Periodically lists the emails waiting for approval, diffs their ids
//! against the previous successful check and alerts once for every email
//! that was not pending before.
//!
//! - The first successful check after start (or after
//!   [`NotificationPoller::reset_notifications`]) only records a baseline.
//! - At most one check is in flight, and attempts closer than
//!   [`CHECK_DEBOUNCE`] to the previous attempt start are dropped.
//! - Timer and manual triggers share one entry point,
//!   [`NotificationPoller::check_for_new_emails`].
//! - Fetch failures are logged and leave the last known state untouched;
//!   the next tick is the retry.
//! - A check still in flight when checks stop only updates the count; it
//!   never alerts. After [`NotificationPoller::shutdown`] its result is
//!   dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{NotificationSettings, NotificationSettingsUpdate, PendingEmail};
use crate::services::alerts::AlertDispatcher;
use crate::services::capability::CapabilityGate;
use crate::services::mail_client::PendingEmailSource;
use crate::services::settings::{self, SettingsStore};

/// Minimum spacing between two check attempts.
pub const CHECK_DEBOUNCE: Duration = Duration::from_millis(5000);

/// Delay between scheduling and the first check.
pub const STARTUP_DELAY: Duration = Duration::from_secs(1);

/// Default number of pending emails fetched per check.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Status published to consumers (badge counts, status lines).
///
/// Count and timestamp only change once a fetch has resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatus {
    pub pending_email_count: usize,
    pub last_checked: Option<DateTime<Utc>>,
    pub is_checking: bool,
    pub has_initialized: bool,
}

/// What a call to [`NotificationPoller::check_for_new_emails`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Notifications are disabled or the capability is missing.
    Disabled,
    /// Another check is still running.
    InFlight,
    /// The previous attempt started less than [`CHECK_DEBOUNCE`] ago.
    Debounced,
    /// The fetch failed; state kept at the last known good values.
    Failed,
    /// First successful check: snapshot recorded, nothing alerted.
    Baseline { pending: usize },
    /// Regular check; `new_ids` were alerted.
    Checked { pending: usize, new_ids: Vec<i64> },
    /// Checks stopped while the fetch was in flight; nothing alerted.
    Stopped,
}

/// Mutable state of the check cycle.
#[derive(Debug)]
struct RunState {
    is_checking: bool,
    last_attempt_at: Option<Instant>,
    last_checked_at: Option<DateTime<Utc>>,
    is_first_check: bool,
    has_initialized: bool,
    pending_email_count: usize,
    snapshot: HashSet<i64>,
    /// Bumped whenever checks stop or restart.
    stop_epoch: u64,
    /// Bumped on shutdown.
    generation: u64,
}

/// Which run a check belongs to, taken when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    stop_epoch: u64,
    generation: u64,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            is_checking: false,
            last_attempt_at: None,
            last_checked_at: None,
            is_first_check: true,
            has_initialized: false,
            pending_email_count: 0,
            snapshot: HashSet::new(),
            stop_epoch: 0,
            generation: 0,
        }
    }
}

impl RunState {
    fn status(&self) -> PollerStatus {
        PollerStatus {
            pending_email_count: self.pending_email_count,
            last_checked: self.last_checked_at,
            is_checking: self.is_checking,
            has_initialized: self.has_initialized,
        }
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            stop_epoch: self.stop_epoch,
            generation: self.generation,
        }
    }
}

/// Timer state machine.
#[derive(Debug)]
enum Schedule {
    Stopped,
    Scheduled {
        interval: Duration,
        cancel: CancellationToken,
    },
}

/// Collaborators injected into the poller.
pub struct PollerDeps {
    pub source: Arc<dyn PendingEmailSource>,
    pub store: Arc<dyn SettingsStore>,
    pub capability: CapabilityGate,
    pub alerts: AlertDispatcher,
    pub page_size: u32,
}

struct PollerInner {
    source: Arc<dyn PendingEmailSource>,
    store: Arc<dyn SettingsStore>,
    capability: CapabilityGate,
    alerts: AlertDispatcher,
    page_size: u32,
    settings: RwLock<NotificationSettings>,
    state: Mutex<RunState>,
    schedule: Mutex<Schedule>,
    started: AtomicBool,
    watcher: Mutex<Option<CancellationToken>>,
    status_tx: watch::Sender<PollerStatus>,
}

/// Handle to the poller. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct NotificationPoller {
    inner: Arc<PollerInner>,
}

impl NotificationPoller {
    /// Create a stopped poller, loading settings from the store.
    pub async fn new(deps: PollerDeps) -> Self {
        let loaded = settings::load_settings(deps.store.as_ref()).await;
        let (status_tx, _status_rx) = watch::channel(PollerStatus::default());

        Self {
            inner: Arc::new(PollerInner {
                source: deps.source,
                store: deps.store,
                capability: deps.capability,
                alerts: deps.alerts,
                page_size: deps.page_size.max(1),
                settings: RwLock::new(loaded),
                state: Mutex::new(RunState::default()),
                schedule: Mutex::new(Schedule::Stopped),
                started: AtomicBool::new(false),
                watcher: Mutex::new(None),
                status_tx,
            }),
        }
    }

    /// Start following settings and capability changes.
    ///
    /// Schedules checks right away when notifications are enabled and the
    /// capability is present. Calling `start` twice is harmless.
    pub async fn start(&self) {
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let token = CancellationToken::new();
            let mut changes = self.inner.capability.subscribe();
            let poller = self.clone();
            let cancel = token.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        changed = changes.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            poller.reconcile().await;
                        }
                    }
                }
            });

            *self.inner.watcher.lock().await = Some(token);
            log::info!("[poller] Notification poller started");
        }

        self.reconcile().await;
    }

    /// Stop everything, reset run state and release audio.
    ///
    /// The poller can be started again afterwards.
    pub async fn shutdown(&self) {
        self.inner.started.store(false, Ordering::SeqCst);

        if let Some(token) = self.inner.watcher.lock().await.take() {
            token.cancel();
        }

        self.reconcile().await;

        // A fetch that never resolved must not keep the next start blocked
        {
            let mut state = self.inner.state.lock().await;
            let ticket = state.ticket();
            *state = RunState {
                stop_epoch: ticket.stop_epoch + 1,
                generation: ticket.generation + 1,
                ..RunState::default()
            };
            self.publish(&state);
        }

        self.inner.alerts.release();
        log::info!("[poller] Notification poller shut down");
    }

    /// Current settings.
    pub async fn settings(&self) -> NotificationSettings {
        self.inner.settings.read().await.clone()
    }

    /// Merge `update` into the settings, persist them and reschedule.
    ///
    /// A persistence failure is logged; the new values still apply for
    /// this session.
    pub async fn update_settings(&self, update: NotificationSettingsUpdate) -> NotificationSettings {
        let merged = {
            let mut current = self.inner.settings.write().await;
            update.apply(&mut current);
            current.clone()
        };

        if let Err(e) = settings::save_settings(self.inner.store.as_ref(), &merged).await {
            log::error!("[poller] Failed to persist notification settings: {}", e);
        }

        self.reconcile().await;
        merged
    }

    /// Run one check now, subject to the same exclusion and debounce rules
    /// as timer-driven checks.
    pub async fn manually_check(&self) {
        let outcome = self.check_for_new_emails().await;
        log::debug!("[poller] Manual check: {:?}", outcome);
    }

    /// Forget every pending email seen so far.
    ///
    /// The next successful check records a new baseline without alerting.
    pub async fn reset_notifications(&self) {
        let mut state = self.inner.state.lock().await;
        state.snapshot.clear();
        state.is_first_check = true;
        state.has_initialized = false;
        self.publish(&state);
        log::info!("[poller] Notification baseline reset");
    }

    /// Latest published status.
    pub fn status(&self) -> PollerStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Receive status updates.
    pub fn subscribe_status(&self) -> watch::Receiver<PollerStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Ids in the current snapshot, sorted.
    pub async fn snapshot_ids(&self) -> Vec<i64> {
        let state = self.inner.state.lock().await;
        let mut ids: Vec<i64> = state.snapshot.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether the next successful check only records a baseline.
    pub async fn is_first_check(&self) -> bool {
        self.inner.state.lock().await.is_first_check
    }

    /// Whether the repeating timer is armed.
    pub async fn is_scheduled(&self) -> bool {
        matches!(*self.inner.schedule.lock().await, Schedule::Scheduled { .. })
    }

    /// The single entry point for timer and manual checks.
    pub async fn check_for_new_emails(&self) -> CheckOutcome {
        let inner = &self.inner;

        if !inner.settings.read().await.enabled || !inner.capability.get() {
            return CheckOutcome::Disabled;
        }

        let ticket = {
            let mut state = inner.state.lock().await;
            if state.is_checking {
                log::debug!("[poller] Check already in flight, skipping");
                return CheckOutcome::InFlight;
            }
            if let Some(last) = state.last_attempt_at {
                if last.elapsed() < CHECK_DEBOUNCE {
                    log::debug!("[poller] Last check attempt {:?} ago, skipping", last.elapsed());
                    return CheckOutcome::Debounced;
                }
            }
            state.is_checking = true;
            state.last_attempt_at = Some(Instant::now());
            self.publish(&state);
            state.ticket()
        };

        let fetched = inner.source.list_pending(inner.page_size).await;

        let (outcome, fresh) = {
            let mut state = inner.state.lock().await;
            if state.ticket() != ticket {
                self.resolve_stopped(&mut state, ticket, fetched);
                return CheckOutcome::Stopped;
            }
            let result = match fetched {
                Ok(emails) => Self::apply_fetch(&mut state, emails),
                Err(e) => {
                    log::warn!("[poller] Pending email check failed: {}", e);
                    (CheckOutcome::Failed, Vec::new())
                }
            };
            self.publish(&state);
            result
        };

        if !fresh.is_empty() {
            log::info!("[poller] {} new pending email(s)", fresh.len());
            let current = inner.settings.read().await.clone();
            let report = inner.alerts.dispatch(&current, &fresh).await;
            log::debug!("[poller] Alerts delivered: {:?}", report);
        }

        {
            let mut state = inner.state.lock().await;
            if state.ticket() == ticket {
                state.has_initialized = true;
                state.is_checking = false;
                self.publish(&state);
            } else if state.generation == ticket.generation {
                state.is_checking = false;
                self.publish(&state);
            }
        }

        outcome
    }

    /// Finish a check whose run ended while it was fetching.
    ///
    /// After a stop the count still reflects the fetch, but the snapshot
    /// stays cleared and nothing is alerted. After a shutdown the state
    /// belongs to the next run and is left alone.
    fn resolve_stopped(
        &self,
        state: &mut RunState,
        ticket: Ticket,
        fetched: Result<Vec<PendingEmail>, AppError>,
    ) {
        if state.generation != ticket.generation {
            log::debug!("[poller] Dropping check result after shutdown");
            return;
        }

        match fetched {
            Ok(emails) => {
                let ids: HashSet<i64> = emails.iter().map(|e| e.id).collect();
                state.pending_email_count = ids.len();
                state.last_checked_at = Some(Utc::now());
                log::debug!("[poller] Checks stopped mid-fetch; count updated, no alerts");
            }
            Err(e) => log::warn!("[poller] Pending email check failed: {}", e),
        }

        state.is_checking = false;
        self.publish(state);
    }

    /// Replace the snapshot with `emails` and return the newly seen ones.
    fn apply_fetch(
        state: &mut RunState,
        emails: Vec<PendingEmail>,
    ) -> (CheckOutcome, Vec<PendingEmail>) {
        let fetched: HashSet<i64> = emails.iter().map(|e| e.id).collect();

        let mut seen = HashSet::new();
        let fresh: Vec<PendingEmail> = emails
            .into_iter()
            .filter(|e| !state.snapshot.contains(&e.id) && seen.insert(e.id))
            .collect();

        state.pending_email_count = fetched.len();
        state.last_checked_at = Some(Utc::now());
        state.snapshot = fetched;

        if state.is_first_check {
            state.is_first_check = false;
            log::info!(
                "[poller] Baseline recorded: {} pending email(s)",
                state.pending_email_count
            );
            return (
                CheckOutcome::Baseline {
                    pending: state.pending_email_count,
                },
                Vec::new(),
            );
        }

        let new_ids = fresh.iter().map(|e| e.id).collect();
        (
            CheckOutcome::Checked {
                pending: state.pending_email_count,
                new_ids,
            },
            fresh,
        )
    }

    fn publish(&self, state: &RunState) {
        self.inner.status_tx.send_replace(state.status());
    }

    /// Bring the timer in line with settings, capability and lifecycle.
    async fn reconcile(&self) {
        let (enabled, interval) = {
            let settings = self.inner.settings.read().await;
            (settings.enabled, settings.interval())
        };
        let wanted = self.inner.started.load(Ordering::SeqCst)
            && enabled
            && self.inner.capability.get();

        let mut schedule = self.inner.schedule.lock().await;
        let previous = std::mem::replace(&mut *schedule, Schedule::Stopped);

        *schedule = match (previous, wanted) {
            (Schedule::Stopped, true) => {
                self.reset_baseline().await;
                log::info!("[poller] Scheduling checks every {:?}", interval);
                self.arm(interval, true)
            }
            (Schedule::Scheduled { interval: current, cancel }, true) => {
                if current == interval {
                    Schedule::Scheduled { interval, cancel }
                } else {
                    cancel.cancel();
                    log::info!("[poller] Check interval changed to {:?}", interval);
                    self.arm(interval, false)
                }
            }
            (Schedule::Scheduled { cancel, .. }, false) => {
                cancel.cancel();
                self.clear_on_stop().await;
                log::info!("[poller] Checks stopped");
                Schedule::Stopped
            }
            (Schedule::Stopped, false) => Schedule::Stopped,
        };
    }

    /// Spawn the timer task.
    fn arm(&self, interval: Duration, check_first: bool) -> Schedule {
        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();

        tokio::spawn(async move { poller.run_timer(interval, check_first, token).await });

        Schedule::Scheduled { interval, cancel }
    }

    async fn run_timer(self, interval: Duration, check_first: bool, cancel: CancellationToken) {
        if check_first {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = time::sleep(STARTUP_DELAY) => {}
            }
            self.check_for_new_emails().await;
        }

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // A check in progress finishes even if cancelled meanwhile
                    self.check_for_new_emails().await;
                }
            }
        }
    }

    /// Fresh start: empty snapshot, next success is a baseline.
    async fn reset_baseline(&self) {
        let mut state = self.inner.state.lock().await;
        state.stop_epoch += 1;
        state.snapshot.clear();
        state.is_first_check = true;
        state.has_initialized = false;
        self.publish(&state);
    }

    async fn clear_on_stop(&self) {
        let mut state = self.inner.state.lock().await;
        state.stop_epoch += 1;
        state.snapshot.clear();
        state.has_initialized = false;
        self.publish(&state);
    }
}
