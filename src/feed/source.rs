//! Change feed tailing.
//!
//! The change-feed collaborator exposes an NDJSON stream of change events;
//! this source tails it, pushing typed events into an mpsc channel so the
//! consumer side gets explicit ordering, backpressure and shutdown
//! (closing the channel stops the tail).

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::feed::events::ChangeEvent;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Tails the change feed endpoint and forwards events into a channel
#[derive(Debug, Clone)]
pub struct HttpChangeFeed {
    client: Client,
    url: String,
    retry_backoff: Duration,
}

impl HttpChangeFeed {
    /// Create a feed source from configuration.
    ///
    /// The stream is long-lived, so only connection establishment gets a
    /// timeout.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            retry_backoff: Duration::from_secs(config.retry_backoff_secs),
        })
    }

    /// Tail the feed until the consumer side of the channel is dropped.
    ///
    /// Disconnects and stream ends are retried with a fixed backoff; a
    /// malformed event line is logged and skipped, it never ends the tail.
    pub async fn run(&self, tx: mpsc::Sender<ChangeEvent>) {
        loop {
            match self.stream_events(&tx).await {
                Ok(()) => info!(url = %self.url, "Change feed stream ended"),
                Err(error) => warn!(url = %self.url, %error, "Change feed connection failed"),
            }

            if tx.is_closed() {
                info!("Change event channel closed, stopping feed tail");
                return;
            }

            time::sleep(self.retry_backoff).await;
        }
    }

    async fn stream_events(&self, tx: &mpsc::Sender<ChangeEvent>) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::Feed(format!("Failed to connect to change feed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Feed(format!("Change feed returned status {}", status)));
        }

        info!(url = %self.url, "Tailing change feed");

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::Feed(format!("Change feed read failed: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = &line[..line.len() - 1];
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }

                match serde_json::from_slice::<ChangeEvent>(line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            // Consumer gone; treat as clean shutdown.
                            return Ok(());
                        }
                    }
                    Err(error) => {
                        warn!(%error, "Skipping malformed change event");
                    }
                }
            }
        }

        Ok(())
    }
}
