//! Fixed-interval HTTP polling source.
//!
//! Issues a GET against the posture endpoint on every tick. A failed
//! cycle is reported and the timer keeps running.

use crate::config::{Config, ConfigError};
use crate::error::FetchError;
use crate::posture::PostureEvent;
use crate::source::{PostureSource, Subscription};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Polls the backend's posture endpoint.
#[derive(Debug, Clone)]
pub struct PollSource {
    url: String,
    interval: Duration,
    client: reqwest::Client,
}

impl PollSource {
    /// Create a new polling source.
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            interval,
            client,
        })
    }

    /// Create a polling source from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.poll_url(), config.poll_interval, config.request_timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform a single polling cycle.
    pub async fn fetch_once(&self) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Turn a cycle's outcome into the event the controller expects.
    pub async fn poll_event(&self) -> PostureEvent {
        match self.fetch_once().await {
            Ok(body) => PostureEvent::Reading(body),
            Err(e) => {
                tracing::warn!(url = %self.url, error = ?e, "Posture poll failed");
                PostureEvent::FetchFailed(e)
            }
        }
    }
}

impl PostureSource for PollSource {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn spawn(self: Box<Self>, events: mpsc::Sender<PostureEvent>) -> Subscription {
        let source = *self;
        Subscription::spawn(move |mut shutdown| async move {
            let mut ticker = tokio::time::interval(source.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                url = %source.url,
                interval_secs = source.interval.as_secs_f64(),
                "Polling posture endpoint"
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {}
                }

                // The request itself must also yield to shutdown
                let event = tokio::select! {
                    _ = &mut shutdown => break,
                    event = source.poll_event() => event,
                };

                if events.send(event).await.is_err() {
                    break;
                }
            }

            tracing::debug!("Polling stopped");
        })
    }
}
