//! Delivery of activity batches to the collection endpoint.

use crate::config::{BatcherConfig, HttpConfig};
use crate::error::{ActivityError, TransportError};
use async_trait::async_trait;
use bakehouse_activity_types::{ActivityBatchRef, ActivityEvent};
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

/// Sink for activity batches.
#[async_trait]
pub trait ActivityTransport: Send + Sync {
    /// Make one delivery attempt and report whether it succeeded.
    async fn deliver(&self, events: &[ActivityEvent]) -> Result<(), TransportError>;

    /// Hand a batch off for delivery without waiting for the outcome.
    ///
    /// Used during teardown, when the caller cannot await a response.
    /// `Ok` means the batch was accepted for sending, not that it arrived.
    fn beacon(&self, events: &[ActivityEvent]) -> Result<(), TransportError>;
}

/// Build a configured HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<Client, TransportError> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(TransportError::ClientBuild)
}

/// JSON-over-HTTP transport posting `{"events": [...]}` to the collector.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    beacons: Mutex<JoinSet<()>>,
}

impl HttpTransport {
    /// Create a transport for the given endpoint.
    pub fn new(endpoint: Url, http: &HttpConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(http)?,
            endpoint,
            beacons: Mutex::new(JoinSet::new()),
        })
    }

    /// Create a transport from batcher configuration.
    pub fn from_config(config: &BatcherConfig) -> Result<Self, ActivityError> {
        let endpoint = config.endpoint_url()?;
        Ok(Self::new(endpoint, &config.http)?)
    }

    /// The collection endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Number of beacon deliveries still in flight.
    pub fn pending_beacons(&self) -> usize {
        let mut beacons = self.beacons.lock();
        reap_finished(&mut beacons);
        beacons.len()
    }

    /// Wait for every beacon handed off so far to finish.
    pub async fn drain_beacons(&self) {
        let mut beacons = std::mem::take(&mut *self.beacons.lock());
        while let Some(result) = beacons.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Activity beacon task failed");
            }
        }
    }

    /// Check response status and convert errors.
    async fn check_response(response: reqwest::Response) -> Result<(), TransportError> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);

            return Err(TransportError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ActivityTransport for HttpTransport {
    async fn deliver(&self, events: &[ActivityEvent]) -> Result<(), TransportError> {
        debug!("Posting {} activity events to {}", events.len(), self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ActivityBatchRef::from(events))
            .send()
            .await?;
        Self::check_response(response).await
    }

    fn beacon(&self, events: &[ActivityEvent]) -> Result<(), TransportError> {
        let handle = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        // Encode up front so the batch no longer depends on the caller.
        let body = serde_json::to_vec(&ActivityBatchRef::from(events))?;
        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let count = events.len();

        let mut beacons = self.beacons.lock();
        reap_finished(&mut beacons);
        beacons.spawn_on(
            async move {
                let outcome = match request.send().await {
                    Ok(response) => Self::check_response(response).await,
                    Err(e) => Err(TransportError::from(e)),
                };
                match outcome {
                    Ok(()) => debug!(count, "Activity beacon delivered"),
                    Err(e) => warn!(error = %e, count, "Activity beacon lost"),
                }
            },
            &handle,
        );
        Ok(())
    }
}

/// Drop completed beacon tasks so a long-lived transport does not hoard them.
fn reap_finished(beacons: &mut JoinSet<()>) {
    while let Some(result) = beacons.try_join_next() {
        if let Err(e) = result {
            warn!(error = %e, "Activity beacon task failed");
        }
    }
}
