//! Error taxonomy for the watch pipeline and its collaborators.
//!
//! Each external boundary gets its own error type so the orchestrator can
//! tell which stage a run died in:
//!
//! - [`FetchError`]: network failure or non-2xx response from the source page
//! - [`StoreError`]: SQLite write failure or an unavailable database
//! - [`NotifyError`]: a single destination's delivery failure (captured in
//!   the delivery report, never propagated to the caller)
//! - [`ClassifyError`]: the remote classifier was unreachable or answered
//!   with something that is not a known label
//! - [`ConfigError`]: the configuration file could not be read or parsed
//!
//! Fetch and store errors abort a run; notify errors are recorded per
//! destination and leave the committed batch intact.

use thiserror::Error;

/// Failure to retrieve the source document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The source answered with a non-success status.
    #[error("unexpected status {status} fetching {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

/// Failure to read from or write to the item store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store could not take the write (locked by another writer,
    /// closed, or otherwise unavailable).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure to deliver a message to one destination.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request never produced a response.
    #[error("delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The messaging API answered with a non-success status.
    #[error("delivery rejected with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The messaging API answered 2xx but the receipt could not be read.
    #[error("unreadable delivery receipt: {0}")]
    BadReceipt(String),
}

/// Failure to obtain a label from the classification endpoint.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The request never produced a response.
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("classifier answered with status {status}")]
    Status { status: reqwest::StatusCode },

    /// The endpoint answered with a label outside the known set.
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
}

/// Failure to load the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configured CSS selector rule does not parse.
    #[error("invalid selector rule {rule:?}: {message}")]
    Selector { rule: String, message: String },

    /// A configured URL (source page, origin, classifier endpoint) does
    /// not parse.
    #[error("invalid {field} URL {value:?}: {source}")]
    Url {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
}
