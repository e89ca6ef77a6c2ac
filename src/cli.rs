//! Command-line interface definitions for Atlas Watch.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Non-secret settings live in the YAML configuration file; the SMS
//! transport credentials arrive here via environment-backed flags so they
//! never need to be written to disk.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Atlas Watch application.
///
/// # Examples
///
/// ```sh
/// # One manual check of the source
/// atlas_watch run
///
/// # Keep checking every 15 minutes (or the configured interval)
/// atlas_watch watch
///
/// # Classify a piece of text
/// atlas_watch classify "Scientists announce breakthrough"
///
/// # Re-send the three most recently stored stories
/// atlas_watch notify-recent --count 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Twilio account SID for the SMS transport
    #[arg(long, env = "TWILIO_ACCOUNT_SID", hide_env_values = true)]
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token for the SMS transport
    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub twilio_auth_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// The operations the binary exposes.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the source once: fetch, dedup, store, notify
    Run,

    /// Check the source repeatedly on a fixed interval
    Watch {
        /// Seconds between checks (overrides the configured interval)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Classify free text against the configured model endpoint
    Classify {
        /// The text to classify
        text: String,
    },

    /// Send a notification for the most recently stored items,
    /// bypassing fetch and dedup
    NotifyRecent {
        /// How many of the latest items to send
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Delete every stored item (administrative reset)
    Purge,
}
