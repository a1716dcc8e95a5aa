//! HTTP client for the inbound snapshot feed.

use std::time::Duration;

use proxmap_core::types::Snapshot;
use thiserror::Error;

/// Request timeout; well under the poll period so a hung fetch cannot pile
/// up behind the ticker.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned status {status}")]
    Status { status: reqwest::StatusCode },
    #[error("invalid snapshot document: {0}")]
    InvalidDocument(String),
}

/// Client for the telemetry service's snapshot endpoint.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(FeedError::ClientBuild)?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Fetch and parse the latest world snapshot.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, FeedError> {
        let response = self.http.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status { status });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| FeedError::InvalidDocument(err.to_string()))
    }
}
