//! Approval Notifier - desktop alerts for emails waiting for approval.
//!
//! This is the main library: the pending-email poller, its adapters, and
//! the CLI command handlers the binary dispatches to.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use serde::Serialize;

use cli::{Cli, Command, SettingsAction};
use config::AppConfig;
use error::AppError;
use models::NotificationSettingsUpdate;

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::from_env()?;
    cli.apply_overrides(&mut config);

    match cli.command {
        Command::Watch => commands::watch::watch(&config, cli.json).await,
        Command::Check => {
            let response = commands::check::check_pending(&config).await?;
            emit(cli.json, &response, || response.to_string())
        }
        Command::Settings { action } => {
            let settings = match action {
                SettingsAction::Show => {
                    commands::notification_settings::get_notification_settings(&config).await?
                }
                SettingsAction::Set {
                    enabled,
                    browser,
                    toast,
                    sound,
                    interval,
                } => {
                    let update = NotificationSettingsUpdate {
                        enabled,
                        browser_notifications: browser,
                        toast_notifications: toast,
                        sound_enabled: sound,
                        check_interval: interval,
                    };
                    if update.is_empty() {
                        return Err(AppError::invalid_input_field(
                            "nothing to change; pass at least one option",
                            "settings",
                        ));
                    }
                    commands::notification_settings::update_notification_settings(&config, update)
                        .await?
                }
            };
            emit(cli.json, &settings, || {
                format!(
                    "enabled:               {}\n\
                     browser notifications: {}\n\
                     toast notifications:   {}\n\
                     sound:                 {}\n\
                     check interval:        {}s",
                    settings.enabled,
                    settings.browser_notifications,
                    settings.toast_notifications,
                    settings.sound_enabled,
                    settings.check_interval / 1000
                )
            })
        }
        Command::Login { token } => {
            let response = commands::auth::login(&config, &token).await?;
            emit(cli.json, &response, || {
                let mut text = format!("Logged in to {} as {}", response.api_url, response.email);
                if !response.can_view_pending {
                    text.push_str(&format!(
                        "\nWarning: this account lacks `{}`; no emails will be announced.",
                        config.required_permission
                    ));
                }
                text
            })
        }
        Command::Logout => {
            commands::auth::logout(&config)?;
            emit(cli.json, &serde_json::json!({ "loggedOut": true }), || {
                "Logged out".to_string()
            })
        }
    }
}

/// Print `value` as JSON or as the human-readable text from `human`.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human().trim_end());
    }
    Ok(())
}
