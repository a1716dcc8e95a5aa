//! Fire-and-forget POST of persist-flagged events to the durable sink.

use std::time::Duration;

use proxmap_core::types::NotificationEvent;
use thiserror::Error;

const POST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sink returned status {status}")]
    Status { status: reqwest::StatusCode },
}

/// Client for the durable notification sink. Cheap to clone; clones share
/// the connection pool, so each dispatch can spawn its own POST task.
#[derive(Debug, Clone)]
pub struct EventSink {
    http: reqwest::Client,
    url: String,
}

impl EventSink {
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(POST_TIMEOUT)
            .build()
            .map_err(SinkError::ClientBuild)?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub async fn post_event(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        let response = self.http.post(&self.url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status { status });
        }
        Ok(())
    }
}
