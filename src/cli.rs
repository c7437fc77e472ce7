//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Desktop alerts for emails waiting for approval")]
pub struct Cli {
    /// Print results and errors as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Approval API base URL (overrides NOTIFIER_API_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Web front-end base URL used for detail links (overrides NOTIFIER_WEB_URL).
    #[arg(long, global = true)]
    pub web_url: Option<String>,

    /// Directory for the settings database (overrides NOTIFIER_DATA_DIR).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll for pending emails and alert on new ones until interrupted.
    ///
    /// Reads `check`, `reset`, `status` and `quit` from stdin.
    Watch,

    /// Fetch the pending emails once and print them.
    Check,

    /// Show or change notification settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Store the API token in the OS keychain.
    Login {
        #[arg(long)]
        token: String,
    },

    /// Remove the stored API token.
    Logout,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current settings.
    Show,

    /// Change one or more settings.
    Set {
        #[arg(long)]
        enabled: Option<bool>,

        #[arg(long)]
        browser: Option<bool>,

        #[arg(long)]
        toast: Option<bool>,

        #[arg(long)]
        sound: Option<bool>,

        /// Check interval in milliseconds (30000, 60000, 300000 or 600000).
        #[arg(long)]
        interval: Option<u64>,
    },
}

impl Cli {
    /// Apply global flag overrides to `config`.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(api_url) = &self.api_url {
            // Detail links follow the API host unless a web URL was given
            if config.web_url == config.api_url {
                config.web_url = api_url.clone();
            }
            config.api_url = api_url.clone();
        }
        if let Some(web_url) = &self.web_url {
            config.web_url = web_url.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
    }
}
