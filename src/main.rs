//! # Atlas Watch
//!
//! A change-detection pipeline that watches a news page for newly
//! published stories, persists anything it has not seen before, and sends
//! an SMS alert once per new story.
//!
//! ## Features
//!
//! - Scrapes story cards from a configured source page (CSS selector rule)
//! - Cleans headlines (trailing "time ago" noise) and canonicalizes links
//! - Deduplicates against a durable SQLite seen-set keyed by link
//! - Commits each run's batch atomically; never notifies unpersisted items
//! - Delivers a digest to one or more SMS destinations independently
//! - Classifies free text as REAL/FAKE via a remote inference endpoint
//!
//! ## Usage
//!
//! ```sh
//! atlas_watch run                    # one check
//! atlas_watch watch                  # keep checking on the configured interval
//! atlas_watch classify "some text"   # ask the classifier
//! atlas_watch notify-recent --count 3
//! atlas_watch purge
//! ```
//!
//! ## Architecture
//!
//! One run is a strict stage sequence, each stage a narrow component:
//! 1. **Fetch**: download the source page
//! 2. **Extract / Normalize**: selector walk, then cleaning and link canonicalization
//! 3. **Dedup**: drop everything the store has already recorded
//! 4. **Commit**: atomic batch append
//! 5. **Notify**: digest to every configured destination, outcomes captured per destination

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod dedup;
mod error;
mod extract;
mod fetch;
mod models;
mod normalize;
mod notify;
mod pipeline;
mod store;

use classify::classify_with_backoff;
use cli::{Cli, Command};
use config::Config;
use fetch::HttpSource;
use notify::{Alerter, Notifier, TwilioTransport};
use pipeline::{Pipeline, RunOutcome};
use store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("atlas_watch starting up");

    let args = Cli::parse();
    debug!(config = %args.config, "Parsed CLI arguments");

    let config = Config::load(&args.config)?;
    info!(config_path = %args.config, source = %config.source.url, "Loaded configuration");

    match &args.command {
        Command::Run => {
            let (pipeline, source, mut store) = build_pipeline_parts(&config)?;
            let notifier = build_notifier(&args, &config)?;
            let outcome = run_once(&pipeline, &source, &mut store, &notifier).await;
            if let RunOutcome::Failed { .. } = outcome {
                return Err(outcome.to_string().into());
            }
        }
        Command::Watch { interval_secs } => {
            let (pipeline, source, mut store) = build_pipeline_parts(&config)?;
            let notifier = build_notifier(&args, &config)?;
            let secs = interval_secs.unwrap_or(config.watch.interval_secs);
            info!(interval_secs = secs, "Watching source");

            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            loop {
                ticker.tick().await;
                // A failed run is logged and the watch keeps going; the
                // next tick gets a fresh chance.
                run_once(&pipeline, &source, &mut store, &notifier).await;
            }
        }
        Command::Classify { text } => {
            let client = reqwest::Client::builder()
                .timeout(config.classifier.timeout())
                .build()?;
            let endpoint = config.classifier.endpoint()?;
            let label = classify_with_backoff(&client, &endpoint, text).await?;
            println!("{label}");
        }
        Command::NotifyRecent { count } => {
            let store = SqliteStore::open(&config.store.path)?;
            let notifier = build_notifier(&args, &config)?;

            let items = store.recent(*count)?;
            if items.is_empty() {
                info!("Store is empty; nothing to send");
            } else {
                let report = notifier.notify(&items).await;
                info!(
                    items = items.len(),
                    delivered = report.delivered_count(),
                    failed = report.failed_count(),
                    "Manual notification finished"
                );
                if !report.all_delivered() {
                    warn!("Some notifications were not delivered");
                }
            }
        }
        Command::Purge => {
            let mut store = SqliteStore::open(&config.store.path)?;
            let deleted = store.purge()?;
            info!(deleted, "Store purged");
        }
    }

    Ok(())
}

/// Build the per-run collaborators from configuration.
fn build_pipeline_parts(
    config: &Config,
) -> Result<(Pipeline, HttpSource, SqliteStore), Box<dyn Error>> {
    let pipeline = Pipeline::new(config.source.selector()?, config.source.origin()?);
    let source = HttpSource::new(config.source.url()?, config.source.timeout())?;
    let store = SqliteStore::open(&config.store.path)?;
    info!(stored = store.len()?, "Item store opened");
    Ok((pipeline, source, store))
}

/// Build the SMS notifier; credentials are required here and nowhere else.
fn build_notifier(args: &Cli, config: &Config) -> Result<Notifier<TwilioTransport>, Box<dyn Error>> {
    let account_sid = args
        .twilio_account_sid
        .clone()
        .ok_or("TWILIO_ACCOUNT_SID (or --twilio-account-sid) is required to send SMS")?;
    let auth_token = args
        .twilio_auth_token
        .clone()
        .ok_or("TWILIO_AUTH_TOKEN (or --twilio-auth-token) is required to send SMS")?;

    let transport = TwilioTransport::new(
        account_sid,
        auth_token,
        config.notifier.from.clone(),
        config.notifier.timeout(),
    )?;
    Ok(Notifier::new(transport, config.notifier.destinations.clone()))
}

/// Trigger one pipeline run and log its outcome.
async fn run_once(
    pipeline: &Pipeline,
    source: &HttpSource,
    store: &mut SqliteStore,
    notifier: &Notifier<TwilioTransport>,
) -> RunOutcome {
    let outcome = pipeline.run(source, store, notifier).await;
    match &outcome {
        RunOutcome::Failed { .. } => {
            error!(status = outcome.status_code(), %outcome, "Run failed")
        }
        RunOutcome::PartialSuccess { .. } => {
            warn!(status = outcome.status_code(), %outcome, "Run finished with delivery failures")
        }
        _ => info!(status = outcome.status_code(), %outcome, "Run finished"),
    }
    outcome
}
