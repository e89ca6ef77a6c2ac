//! Notification dispatch for newly committed stories.
//!
//! The [`Notifier`] formats a batch as a single human-readable digest (one
//! paragraph per story: headline, then link) and attempts delivery to every
//! configured destination. Attempts are independent and concurrent, so one
//! destination failing never stops another's attempt. The notifier never
//! raises: every outcome, good or bad, lands in the [`DeliveryReport`].
//!
//! The transport itself is opaque behind [`MessageTransport`]. The
//! production implementation talks to the Twilio Messages API; a delivery
//! receipt is the message SID Twilio assigns.

use crate::error::NotifyError;
use crate::models::Item;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Opaque message delivery boundary: send one message body to one
/// destination, yielding a receipt identifier.
pub trait MessageTransport {
    async fn send(&self, to: &str, body: &str) -> Result<String, NotifyError>;
}

/// How one destination's delivery attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeliveryStatus {
    /// The transport accepted the message and issued a receipt.
    Delivered { receipt: String },
    /// The attempt failed; the reason is kept for the run report.
    Failed { reason: String },
}

/// One destination's outcome within a batch dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub destination: String,
    pub status: DeliveryStatus,
}

/// Per-destination outcomes for one dispatched batch, in configuration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeliveryStatus::Delivered { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }

    /// True when no destination failed.
    pub fn all_delivered(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Render a batch as one message body: headline then link, one paragraph
/// per story, in batch order.
pub fn format_digest(items: &[Item]) -> String {
    items
        .iter()
        .map(|item| format!("{}\n{}", item.headline, item.link))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The dispatch boundary the orchestrator sees: offer a batch, get a
/// report. Implementations must never raise; every destination failure
/// belongs in the report.
pub trait Alerter {
    async fn notify(&self, items: &[Item]) -> DeliveryReport;
}

/// Fans a formatted batch out to every configured destination.
pub struct Notifier<T> {
    transport: T,
    destinations: Vec<String>,
}

impl<T> Notifier<T> {
    pub fn new(transport: T, destinations: Vec<String>) -> Self {
        Self {
            transport,
            destinations,
        }
    }
}

impl<T: MessageTransport> Alerter for Notifier<T> {
    /// Attempt delivery of `items` to every destination.
    ///
    /// An empty batch is a no-op returning an empty report (the
    /// orchestrator short-circuits before calling in that case, but the
    /// manual triggers reuse this path too).
    #[instrument(level = "info", skip_all, fields(items = items.len(), destinations = self.destinations.len()))]
    async fn notify(&self, items: &[Item]) -> DeliveryReport {
        if items.is_empty() {
            return DeliveryReport::default();
        }

        let body = format_digest(items);
        let attempts = self.destinations.iter().map(|destination| {
            let body = body.as_str();
            async move {
                match self.transport.send(destination, body).await {
                    Ok(receipt) => {
                        info!(%destination, %receipt, "Delivered notification");
                        DeliveryOutcome {
                            destination: destination.clone(),
                            status: DeliveryStatus::Delivered { receipt },
                        }
                    }
                    Err(e) => {
                        warn!(%destination, error = %e, "Notification delivery failed");
                        DeliveryOutcome {
                            destination: destination.clone(),
                            status: DeliveryStatus::Failed {
                                reason: e.to_string(),
                            },
                        }
                    }
                }
            }
        });

        DeliveryReport {
            outcomes: join_all(attempts).await,
        }
    }
}

/// Twilio Messages API response body; only the SID is of interest.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// Twilio-backed [`MessageTransport`].
#[derive(Debug, Clone)]
pub struct TwilioTransport {
    client: Client,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioTransport {
    /// Build a transport with its own client and request timeout.
    ///
    /// # Arguments
    ///
    /// * `account_sid` / `auth_token` - Twilio API credentials
    /// * `from` - Sending phone number in E.164 form
    /// * `timeout` - Per-request bound; a timed-out send is a failed
    ///   delivery for that destination
    pub fn new(
        account_sid: String,
        auth_token: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            account_sid,
            auth_token,
            from,
        })
    }
}

impl MessageTransport for TwilioTransport {
    #[instrument(level = "info", skip_all, fields(%to))]
    async fn send(&self, to: &str, body: &str) -> Result<String, NotifyError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("To", to);
        form.insert("From", &self.from);
        form.insert("Body", body);

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| NotifyError::BadReceipt(e.to_string()))?;
        Ok(resource.sid)
    }
}
