//! The fetch collaborator: retrieving the raw source document.
//!
//! Only the success/failure boundary matters to the orchestrator, so the
//! seam is a one-method trait. The production implementation is a plain
//! GET with a bounded timeout; a timeout surfaces as a transport error and
//! fails the fetch stage like any other network fault.

use crate::error::FetchError;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Source of raw documents for the pipeline.
pub trait Source {
    /// Fetch the current document body.
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// HTTP-backed [`Source`] for the configured news page.
#[derive(Debug)]
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    /// Build a source with its own client and request timeout.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

impl Source for HttpSource {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: self.url.to_string(),
            });
        }

        let body = response.text().await?;
        info!(bytes = body.len(), "Fetched source document");
        Ok(body)
    }
}
