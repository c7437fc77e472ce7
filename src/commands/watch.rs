//! Long-running watch command.
//!
//! Wires the poller to the real adapters, prints toasts to stdout and
//! accepts a few commands on stdin until interrupted.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::commands::{build_client, open_settings_store};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::Toast;
use crate::services::{
    AlertDispatcher, BroadcastToasts, CapabilityGate, DesktopNotifier, MailApiClient,
    NotificationPoller, PollerDeps, RodioSound,
};

/// How often the viewing capability is re-evaluated.
const CAPABILITY_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Commands accepted on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchInput {
    Check,
    Reset,
    Status,
    Quit,
}

impl WatchInput {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "check" | "c" => Some(Self::Check),
            "reset" => Some(Self::Reset),
            "status" | "s" => Some(Self::Status),
            "quit" | "q" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Run the poller until Ctrl-C or `quit`.
pub async fn watch(config: &AppConfig, json: bool) -> Result<(), AppError> {
    let store = Arc::new(open_settings_store(config).await?);
    let client = Arc::new(build_client(config)?);

    let capability = CapabilityGate::new(false);
    refresh_capability(&client, &capability, &config.required_permission).await;

    let toasts = Arc::new(BroadcastToasts::default());
    let alerts = AlertDispatcher::new(
        Arc::new(RodioSound::new(config.sound_file.clone())),
        Arc::new(DesktopNotifier::new(config.web_url.clone())),
        toasts.clone(),
    );

    let poller = NotificationPoller::new(PollerDeps {
        source: client.clone(),
        store,
        capability: capability.clone(),
        alerts,
        page_size: config.page_size,
    })
    .await;

    let background = CancellationToken::new();
    tokio::spawn(print_toasts(toasts.subscribe(), json, background.clone()));
    tokio::spawn(keep_capability_fresh(
        client,
        capability,
        config.required_permission.clone(),
        background.clone(),
    ));

    poller.start().await;
    log::info!("[watch] Watching {} (settings: {:?})", config.api_url, poller.settings().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("[watch] Interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Detached from a terminal; keep running until Ctrl-C
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        log::warn!("[watch] Failed to read stdin: {}", e);
                        stdin_open = false;
                        continue;
                    }
                };

                match WatchInput::parse(&line) {
                    Some(WatchInput::Check) => {
                        poller.manually_check().await;
                        print_status(&poller, json);
                    }
                    Some(WatchInput::Reset) => {
                        poller.reset_notifications().await;
                        println!("Notifications reset; currently pending emails will be announced again.");
                    }
                    Some(WatchInput::Status) => print_status(&poller, json),
                    Some(WatchInput::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command. Use: check, reset, status, quit"),
                }
            }
        }
    }

    background.cancel();
    poller.shutdown().await;
    Ok(())
}

fn print_status(poller: &NotificationPoller, json: bool) {
    let status = poller.status();

    if json {
        match serde_json::to_string(&status) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("[watch] Failed to serialize status: {}", e),
        }
        return;
    }

    let last_checked = status
        .last_checked
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    if status.has_initialized {
        println!(
            "{} pending, last checked {}{}",
            status.pending_email_count,
            last_checked,
            if status.is_checking { " (checking...)" } else { "" }
        );
    } else {
        println!("Waiting for the first check...");
    }
}

async fn print_toasts(mut rx: broadcast::Receiver<Toast>, json: bool, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(toast) if json => match serde_json::to_string(&toast) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::error!("[watch] Failed to serialize toast: {}", e),
                },
                Ok(toast) => println!("{}", toast),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("[watch] Dropped {} toast(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Re-evaluate the capability; on failure keep the last known value.
async fn refresh_capability(client: &MailApiClient, capability: &CapabilityGate, permission: &str) {
    match client.can_view_pending(permission).await {
        Ok(allowed) => capability.set(allowed),
        Err(e) if e.is_authentication() || e.is_forbidden() => {
            log::warn!("[watch] {}", e);
            capability.set(false);
        }
        Err(e) => log::warn!("[watch] Could not refresh access to pending emails: {}", e),
    }
}

async fn keep_capability_fresh(
    client: Arc<MailApiClient>,
    capability: CapabilityGate,
    permission: String,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + CAPABILITY_REFRESH_INTERVAL,
        CAPABILITY_REFRESH_INTERVAL,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => refresh_capability(&client, &capability, &permission).await,
        }
    }
}
