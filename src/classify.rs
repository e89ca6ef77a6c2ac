//! Remote text classification with exponential backoff retry logic.
//!
//! Classification is an external collaborator: a stateless request/response
//! call taking free text and returning a `REAL` or `FAKE` label. The model
//! lives behind an HTTP inference endpoint; this module only owns the wire
//! call and its retry policy.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`ClassifyAsync`]: core trait defining the async classification call
//! - [`EndpointClassifier`]: implementation backed by the configured
//!   inference endpoint
//! - [`RetryClassify`]: decorator that adds retry logic to any
//!   [`ClassifyAsync`] implementation
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::ClassifyError;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Classification verdict for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Real,
    Fake,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Real => write!(f, "REAL"),
            Label::Fake => write!(f, "FAKE"),
        }
    }
}

impl FromStr for Label {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REAL" => Ok(Label::Real),
            "FAKE" => Ok(Label::Fake),
            other => Err(ClassifyError::UnknownLabel(other.to_string())),
        }
    }
}

/// Trait for async text classification.
///
/// Implementors take free text and return a [`Label`]. The abstraction
/// exists so decorators (like retry logic) and test fakes can stand in for
/// the real endpoint.
pub trait ClassifyAsync {
    async fn classify(&self, text: &str) -> Result<Label, ClassifyError>;
}

/// Request body sent to the inference endpoint.
#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// Response body expected from the inference endpoint.
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
}

/// [`ClassifyAsync`] implementation backed by the configured HTTP
/// inference endpoint.
///
/// Stateless per call: one POST of `{"text": …}`, one `{"label": …}`
/// answer.
#[derive(Debug)]
pub struct EndpointClassifier<'a> {
    /// Shared HTTP client carrying the classifier timeout.
    pub client: &'a Client,
    /// The inference endpoint URL.
    pub endpoint: &'a Url,
}

impl<'a> ClassifyAsync for EndpointClassifier<'a> {
    #[instrument(level = "info", skip_all)]
    async fn classify(&self, text: &str) -> Result<Label, ClassifyError> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ClassifyRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, elapsed_ms = t0.elapsed().as_millis() as u128, "Classifier answered non-success");
            return Err(ClassifyError::Status { status });
        }

        let parsed: ClassifyResponse = response.json().await?;
        parsed.label.parse()
    }
}

/// Wrapper that adds exponential backoff retry logic to any
/// [`ClassifyAsync`] implementation.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryClassify<T> {
    /// The underlying classifier to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryClassify<T>
where
    T: ClassifyAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> ClassifyAsync for RetryClassify<T>
where
    T: ClassifyAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn classify(&self, text: &str) -> Result<Label, ClassifyError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.classify(text).await {
                Ok(label) => {
                    return Ok(label);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "classify() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "classify() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// High-level entry point: classify text against the configured endpoint
/// with retry and backoff.
///
/// # Arguments
///
/// * `client` - HTTP client carrying the classifier timeout
/// * `endpoint` - The inference endpoint URL
/// * `text` - Free text to classify
///
/// # Returns
///
/// The label, or the last error once all retry attempts are exhausted.
#[instrument(level = "info", skip_all)]
pub async fn classify_with_backoff(
    client: &Client,
    endpoint: &Url,
    text: &str,
) -> Result<Label, ClassifyError> {
    let t0 = Instant::now();
    let inner = EndpointClassifier { client, endpoint };
    let api = RetryClassify::new(inner, 5, StdDuration::from_secs(1));
    let res = api.classify(text).await;
    let dt = t0.elapsed();

    match &res {
        Ok(label) => info!(
            %label,
            elapsed_ms_total = dt.as_millis() as u128,
            "classify_with_backoff succeeded"
        ),
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis() as u128, error = %e, "classify_with_backoff failed")
        }
    }
    res
}
