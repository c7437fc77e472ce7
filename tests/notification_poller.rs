//! Notification poller behaviour against in-memory fakes.
//!
//! All tests run on a paused clock, so startup delays, debounce windows and
//! intervals elapse instantly and deterministically.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::sleep;

use approval_notifier_lib::models::{NotificationSettings, NotificationSettingsUpdate};
use approval_notifier_lib::services::{CheckOutcome, PollerStatus};
use common::{past_debounce, Harness};

fn with_sound() -> NotificationSettingsUpdate {
    NotificationSettingsUpdate {
        sound_enabled: Some(true),
        ..Default::default()
    }
}

fn enabled(on: bool) -> NotificationSettingsUpdate {
    NotificationSettingsUpdate {
        enabled: Some(on),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_check_records_baseline_silently() {
    let h = Harness::new().await;
    h.poller.update_settings(with_sound()).await;
    h.source.set_pending(&[101, 102]);

    let outcome = h.poller.check_for_new_emails().await;

    assert_eq!(outcome, CheckOutcome::Baseline { pending: 2 });
    assert!(h.toasted_ids().is_empty());
    assert!(h.desktop_ids().is_empty());
    assert_eq!(h.sound_plays(), 0);
    assert!(!h.poller.is_first_check().await);

    let status = h.poller.status();
    assert_eq!(status.pending_email_count, 2);
    assert!(status.has_initialized);
    assert!(!status.is_checking);
    assert!(status.last_checked.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_new_email_alerts_every_channel_once() {
    let h = Harness::new().await;
    h.poller.update_settings(with_sound()).await;
    h.source.set_pending(&[101, 102]);
    h.poller.check_for_new_emails().await;

    past_debounce().await;
    h.source.set_pending(&[101, 102, 103]);
    let outcome = h.poller.check_for_new_emails().await;

    assert_eq!(
        outcome,
        CheckOutcome::Checked {
            pending: 3,
            new_ids: vec![103]
        }
    );
    assert_eq!(h.sound_plays(), 1);
    assert_eq!(h.desktop_ids(), vec![103]);
    assert_eq!(h.toasted_ids(), vec![103]);
    assert_eq!(h.desktop.requests.load(Ordering::SeqCst), 1);
    assert_eq!(h.poller.status().pending_email_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_sound_plays_once_per_batch() {
    let h = Harness::new().await;
    h.poller.update_settings(with_sound()).await;
    h.source.set_pending(&[1]);
    h.poller.check_for_new_emails().await;

    past_debounce().await;
    h.source.set_pending(&[1, 2, 3, 4]);
    h.poller.check_for_new_emails().await;

    assert_eq!(h.sound_plays(), 1);
    assert_eq!(h.toasted_ids(), vec![2, 3, 4]);
    assert_eq!(h.desktop_ids(), vec![2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_removed_email_does_not_alert() {
    let h = Harness::new().await;
    h.source.set_pending(&[101, 102]);
    h.poller.check_for_new_emails().await;

    past_debounce().await;
    h.source.set_pending(&[102]);
    let outcome = h.poller.check_for_new_emails().await;

    assert_eq!(
        outcome,
        CheckOutcome::Checked {
            pending: 1,
            new_ids: vec![]
        }
    );
    assert!(h.toasted_ids().is_empty());
    assert_eq!(h.poller.status().pending_email_count, 1);
    assert_eq!(h.poller.snapshot_ids().await, vec![102]);
}

#[tokio::test(start_paused = true)]
async fn test_no_duplicate_alerts_but_reappearance_alerts_again() {
    let h = Harness::new().await;
    h.source.set_pending(&[1, 2]);
    h.poller.check_for_new_emails().await;

    let rounds: Vec<Vec<i64>> = vec![vec![1, 2, 3], vec![1, 2, 3], vec![2, 3], vec![1, 2, 3]];
    for pending in rounds {
        past_debounce().await;
        h.source.set_pending(&pending);
        h.poller.check_for_new_emails().await;
    }

    assert_eq!(h.toasted_ids(), vec![3, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_checks_within_debounce_window_are_dropped() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);
    h.poller.check_for_new_emails().await;

    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Debounced);

    tokio::time::advance(Duration::from_millis(4000)).await;
    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Debounced);
    assert_eq!(h.source.calls(), 1);

    tokio::time::advance(Duration::from_millis(1001)).await;
    assert!(matches!(
        h.poller.check_for_new_emails().await,
        CheckOutcome::Checked { .. }
    ));
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_only_one_check_in_flight() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);
    h.source.block();

    let poller = h.poller.clone();
    let first = tokio::spawn(async move { poller.check_for_new_emails().await });
    h.wait_until_checking().await;

    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::InFlight);
    assert!(h.poller.status().is_checking);

    h.source.unblock();
    let outcome = first.await.unwrap();
    h.settle().await;

    assert_eq!(outcome, CheckOutcome::Baseline { pending: 1 });
    assert_eq!(h.source.calls(), 1);
    assert!(!h.poller.status().is_checking);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_keeps_last_known_state() {
    let h = Harness::new().await;
    h.source.set_pending(&[1, 2]);
    h.poller.check_for_new_emails().await;
    let before = h.poller.status();

    past_debounce().await;
    h.source.set_failing(true);
    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Failed);

    let after = h.poller.status();
    assert_eq!(after.pending_email_count, 2);
    assert_eq!(after.last_checked, before.last_checked);
    assert!(!after.is_checking);
    assert_eq!(h.poller.snapshot_ids().await, vec![1, 2]);

    past_debounce().await;
    h.source.set_failing(false);
    h.source.set_pending(&[1, 2, 3]);
    h.poller.check_for_new_emails().await;

    assert_eq!(h.toasted_ids(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_before_first_success_keeps_baseline_pending() {
    let h = Harness::new().await;
    h.source.set_failing(true);

    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Failed);

    let status = h.poller.status();
    assert!(status.has_initialized);
    assert_eq!(status.pending_email_count, 0);
    assert!(status.last_checked.is_none());
    assert!(h.poller.is_first_check().await);

    past_debounce().await;
    h.source.set_failing(false);
    h.source.set_pending(&[4, 5]);

    assert_eq!(
        h.poller.check_for_new_emails().await,
        CheckOutcome::Baseline { pending: 2 }
    );
    assert!(h.toasted_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reset_makes_next_check_a_baseline() {
    let h = Harness::new().await;
    h.source.set_pending(&[5]);
    h.poller.check_for_new_emails().await;

    h.poller.reset_notifications().await;

    assert!(h.poller.is_first_check().await);
    assert!(h.poller.snapshot_ids().await.is_empty());
    assert!(!h.poller.status().has_initialized);

    past_debounce().await;
    h.source.set_pending(&[5, 6]);
    assert_eq!(
        h.poller.check_for_new_emails().await,
        CheckOutcome::Baseline { pending: 2 }
    );
    assert!(h.toasted_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_or_unauthorized_check_is_a_no_op() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);

    h.poller.update_settings(enabled(false)).await;
    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Disabled);

    h.poller.update_settings(enabled(true)).await;
    h.capability.set(false);
    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Disabled);

    assert_eq!(h.source.calls(), 0);
    assert!(!h.poller.status().has_initialized);
}

#[tokio::test(start_paused = true)]
async fn test_timer_checks_after_startup_delay_then_every_interval() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);

    h.poller.start().await;
    assert!(h.poller.is_scheduled().await);
    assert_eq!(h.source.calls(), 0);

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.source.calls(), 1);
    assert!(h.poller.status().has_initialized);

    h.source.set_pending(&[1, 2]);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.source.calls(), 2);
    assert_eq!(h.toasted_ids(), vec![2]);

    h.poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_is_a_no_op_when_disabled() {
    let h = Harness::new().await;
    h.poller.update_settings(enabled(false)).await;

    h.poller.start().await;
    sleep(Duration::from_secs(120)).await;

    assert!(!h.poller.is_scheduled().await);
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disable_clears_state_and_reenable_starts_fresh() {
    let h = Harness::new().await;
    h.source.set_pending(&[1, 2]);
    h.poller.start().await;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.poller.status().pending_email_count, 2);

    h.poller.update_settings(enabled(false)).await;

    assert!(!h.poller.is_scheduled().await);
    assert!(!h.poller.status().has_initialized);
    assert!(h.poller.snapshot_ids().await.is_empty());

    sleep(Duration::from_secs(10)).await;
    h.source.set_pending(&[1, 2, 3]);
    h.poller.update_settings(enabled(true)).await;
    assert!(h.poller.is_first_check().await);

    sleep(Duration::from_millis(1100)).await;

    assert_eq!(h.source.calls(), 2);
    assert!(h.toasted_ids().is_empty());
    assert_eq!(h.poller.status().pending_email_count, 3);
    assert!(!h.poller.is_first_check().await);

    h.poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_check_lets_it_finish_without_rescheduling() {
    let h = Harness::new().await;
    h.source.set_pending(&[1, 2]);
    h.source.block();
    h.poller.start().await;

    h.wait_until_checking().await;
    h.poller.update_settings(enabled(false)).await;
    assert!(!h.poller.is_scheduled().await);

    h.source.unblock();
    h.settle().await;

    let status = h.poller.status();
    assert_eq!(status.pending_email_count, 2);
    assert!(!status.is_checking);
    assert!(!status.has_initialized);
    assert!(h.toasted_ids().is_empty());

    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.source.calls(), 1);
    assert!(!h.poller.is_scheduled().await);
}

/// Start checks, record a baseline of `pending`, then block a second check
/// mid-fetch. Returns the handle of that second check.
async fn block_check_after_baseline(
    h: &Harness,
    pending: &[i64],
    next: &[i64],
) -> tokio::task::JoinHandle<CheckOutcome> {
    h.poller.update_settings(with_sound()).await;
    h.source.set_pending(pending);
    h.poller.start().await;
    sleep(Duration::from_millis(1100)).await;
    assert!(!h.poller.is_first_check().await);

    past_debounce().await;
    h.source.set_pending(next);
    h.source.block();

    let poller = h.poller.clone();
    let check = tokio::spawn(async move { poller.check_for_new_emails().await });
    h.wait_until_checking().await;
    check
}

fn assert_nothing_alerted(h: &Harness) {
    assert!(h.toasted_ids().is_empty());
    assert!(h.desktop_ids().is_empty());
    assert_eq!(h.sound_plays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_regular_check_does_not_realert() {
    let h = Harness::new().await;
    let check = block_check_after_baseline(&h, &[1, 2], &[1, 2, 3]).await;

    h.poller.update_settings(enabled(false)).await;
    h.source.unblock();

    assert_eq!(check.await.unwrap(), CheckOutcome::Stopped);
    assert_nothing_alerted(&h);

    let status = h.poller.status();
    assert_eq!(status.pending_email_count, 3);
    assert!(!status.has_initialized);
    assert!(!status.is_checking);
    assert!(h.poller.snapshot_ids().await.is_empty());
    assert!(!h.poller.is_scheduled().await);
}

#[tokio::test(start_paused = true)]
async fn test_capability_loss_during_regular_check_does_not_realert() {
    let h = Harness::new().await;
    let check = block_check_after_baseline(&h, &[1, 2], &[1, 2]).await;

    h.capability.set(false);
    sleep(Duration::from_millis(10)).await;
    assert!(!h.poller.is_scheduled().await);
    h.source.unblock();

    assert_eq!(check.await.unwrap(), CheckOutcome::Stopped);
    assert_nothing_alerted(&h);
    assert!(!h.poller.status().has_initialized);
    assert!(!h.poller.status().is_checking);

    // Regaining access starts over from a silent baseline
    sleep(Duration::from_secs(10)).await;
    h.capability.set(true);
    sleep(Duration::from_millis(1100)).await;
    assert!(!h.poller.is_first_check().await);
    assert_nothing_alerted(&h);

    h.poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_check_keeps_default_status() {
    let h = Harness::new().await;
    let check = block_check_after_baseline(&h, &[1, 2], &[1, 2, 3]).await;

    h.poller.shutdown().await;
    assert_eq!(h.poller.status(), PollerStatus::default());
    h.source.unblock();

    assert_eq!(check.await.unwrap(), CheckOutcome::Stopped);
    assert_nothing_alerted(&h);
    assert_eq!(h.poller.status(), PollerStatus::default());
}

#[tokio::test(start_paused = true)]
async fn test_manual_check_during_timer_check_is_skipped() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);
    h.source.block();
    h.poller.start().await;
    h.wait_until_checking().await;

    let mut status = h.poller.subscribe_status();
    let _ = status.borrow_and_update();

    h.poller.manually_check().await;
    h.poller.manually_check().await;

    assert_eq!(h.source.calls(), 1);
    assert!(!status.has_changed().unwrap());

    h.source.unblock();
    h.settle().await;

    // Still inside the debounce window of the timer-driven attempt
    h.poller.manually_check().await;
    assert_eq!(h.source.calls(), 1);

    past_debounce().await;
    h.source.set_pending(&[1, 2]);
    h.poller.manually_check().await;

    assert_eq!(h.source.calls(), 2);
    assert_eq!(h.source.max_concurrent(), 1);
    assert_eq!(h.toasted_ids(), vec![2]);

    h.poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_capability_changes_stop_and_restart_checks() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);
    h.poller.start().await;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.source.calls(), 1);

    h.capability.set(false);
    sleep(Duration::from_millis(10)).await;
    assert!(!h.poller.is_scheduled().await);
    assert!(!h.poller.status().has_initialized);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(h.source.calls(), 1);

    h.capability.set(true);
    sleep(Duration::from_millis(1100)).await;
    assert!(h.poller.is_scheduled().await);
    assert_eq!(h.source.calls(), 2);

    h.poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_reschedules_without_immediate_check() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);
    h.poller.start().await;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.source.calls(), 1);

    h.poller
        .update_settings(NotificationSettingsUpdate {
            check_interval: Some(30_000),
            ..Default::default()
        })
        .await;
    assert!(h.poller.is_scheduled().await);

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.source.calls(), 1);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.source.calls(), 2);
    assert!(!h.poller.is_first_check().await);

    h.poller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_timer_and_releases_audio() {
    let h = Harness::new().await;
    h.source.set_pending(&[1]);
    h.poller.start().await;
    sleep(Duration::from_millis(1100)).await;

    h.poller.shutdown().await;

    assert!(!h.poller.is_scheduled().await);
    assert_eq!(h.sound.releases.load(Ordering::SeqCst), 1);
    assert_eq!(h.poller.status(), PollerStatus::default());

    sleep(Duration::from_secs(120)).await;
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_settings_survive_restart() {
    let h = Harness::new().await;
    h.poller.update_settings(with_sound()).await;

    let restarted = Harness::with_store(h.store.clone()).await;

    assert_eq!(
        restarted.poller.settings().await,
        NotificationSettings {
            sound_enabled: true,
            ..Default::default()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unpersisted_settings_still_apply() {
    let h = Harness::new().await;
    h.store.set_fail_writes(true);

    let merged = h.poller.update_settings(enabled(false)).await;

    assert!(!merged.enabled);
    assert!(!h.poller.settings().await.enabled);
    assert_eq!(h.poller.check_for_new_emails().await, CheckOutcome::Disabled);
    assert!(h.store.raw("emailNotificationSettings").is_none());
}
