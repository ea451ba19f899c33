use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use nostr_sdk::{Client, Event};
use tracing::{debug, warn};

/// How a broadcast went, relay by relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

/// Publishes an already signed event to a set of relays.
#[async_trait]
pub trait RelayPublisher: Send + Sync {
    /// Best effort fan-out. Individual relay failures are reported, not
    /// returned as errors; an error means nothing could be attempted.
    async fn broadcast(&self, relays: &[String], event: &Event) -> Result<BroadcastReport>;
}

/// [`RelayPublisher`] backed by a short lived `nostr-sdk` client per broadcast.
#[derive(Debug, Clone)]
pub struct NostrRelayPublisher {
    connect_timeout: Duration,
}

impl NostrRelayPublisher {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl RelayPublisher for NostrRelayPublisher {
    async fn broadcast(&self, relays: &[String], event: &Event) -> Result<BroadcastReport> {
        let client = Client::default();

        let mut rejected = Vec::new();
        let mut added = 0usize;
        for relay in relays {
            match client.add_relay(relay.as_str()).await {
                Ok(_) => added += 1,
                Err(e) => {
                    warn!(relay = %relay, error = %e, "Skipping relay that could not be added");
                    rejected.push(relay.clone());
                }
            }
        }
        if added == 0 {
            return Err(anyhow!("none of the {} relays could be added", relays.len()));
        }

        if tokio::time::timeout(self.connect_timeout, client.connect())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.connect_timeout.as_secs(),
                "Timeout connecting to relays, sending to those that are up"
            );
        }

        let result = client.send_event(event).await;
        let _ = client.disconnect().await;

        let output = result.map_err(|e| anyhow!("failed to send event: {e}"))?;
        let accepted: Vec<String> = output.success.iter().map(|url| url.to_string()).collect();
        rejected.extend(output.failed.keys().map(|url| url.to_string()));

        debug!(
            event_id = %event.id.to_hex(),
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Event broadcast finished"
        );

        Ok(BroadcastReport { accepted, rejected })
    }
}

#[cfg(test)]
mod tests {
    use nostr_relay_builder::MockRelay;
    use nostr_sdk::{EventBuilder, Keys};

    use super::*;

    fn note() -> Event {
        EventBuilder::text_note("zap receipt stand-in")
            .sign_with_keys(&Keys::generate())
            .unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_dead_relay() {
        let mock = MockRelay::run().await.unwrap();
        let live = mock.url();
        let dead = "ws://127.0.0.1:1".to_string();

        let publisher = NostrRelayPublisher::new(Duration::from_secs(3));
        let report = publisher
            .broadcast(&[live.clone(), dead], &note())
            .await
            .unwrap();

        assert_eq!(report.accepted.len(), 1);
        assert!(report.accepted[0].starts_with(live.trim_end_matches('/')));
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_broadcast_without_usable_relays_fails() {
        let publisher = NostrRelayPublisher::new(Duration::from_secs(1));
        let result = publisher
            .broadcast(&["not a relay url".to_string()], &note())
            .await;
        assert!(result.is_err());
    }
}
