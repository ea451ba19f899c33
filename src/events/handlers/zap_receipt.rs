use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::events::{EventBus, EventHandler, LnurlEvent};
use crate::nostr::{PublishOutcome, ZapReceiptPublisher};
use crate::types::PaymentHash;
use crate::wallet::{RequestStatus, Wallet};

/// Publishes the zap receipt when one of our wallet's lightning requests is
/// paid.
///
/// Failures are logged and reported on the bus, never returned: the wallet
/// notification must not be affected by relay trouble.
pub struct ZapReceiptHandler {
    name: String,
    wallet: Arc<dyn Wallet>,
    receipts: Arc<ZapReceiptPublisher>,
    event_bus: Arc<EventBus>,
}

impl ZapReceiptHandler {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        receipts: Arc<ZapReceiptPublisher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            name: Self::handler_name(wallet.id()),
            wallet,
            receipts,
            event_bus,
        }
    }

    /// Name the handler is registered under for `wallet_id`.
    pub fn handler_name(wallet_id: &str) -> String {
        format!("zap_receipts:{wallet_id}")
    }

    async fn on_paid(&self, key: &str) {
        let Some(request) = self.wallet.get_request(key).await else {
            debug!(key = %key, "Paid request not found in wallet");
            return;
        };
        if !request.is_lightning {
            return;
        }

        let payment_hash = request.payment_hash;
        let Some(preimage) = self.wallet.preimage(&payment_hash).await else {
            warn!(payment_hash = %payment_hash, "No preimage for paid request");
            return;
        };

        let event = match self.receipts.publish_receipt(payment_hash, &preimage).await {
            Ok(PublishOutcome::Published {
                event_id,
                accepted,
                rejected,
            }) => LnurlEvent::ZapReceiptPublished {
                payment_hash: payment_hash.to_hex(),
                event_id,
                accepted_relays: accepted.len(),
                rejected_relays: rejected.len(),
                timestamp: Utc::now(),
            },
            Ok(PublishOutcome::Skipped) => LnurlEvent::ZapReceiptSkipped {
                payment_hash: payment_hash.to_hex(),
                timestamp: Utc::now(),
            },
            Err(e) => {
                warn!(payment_hash = %payment_hash, error = %e, "Failed to publish zap receipt");
                LnurlEvent::ZapReceiptFailed {
                    payment_hash: payment_hash.to_hex(),
                    reason: e.message.clone(),
                    timestamp: Utc::now(),
                }
            }
        };

        if let Err(e) = self.event_bus.publish(event).await {
            warn!(error = %e, "Failed to publish zap receipt event");
        }
    }
}

#[async_trait]
impl EventHandler for ZapReceiptHandler {
    async fn handle(&self, event: LnurlEvent) -> anyhow::Result<()> {
        let LnurlEvent::RequestStatus {
            wallet_id,
            key,
            status,
            ..
        } = event
        else {
            return Ok(());
        };

        if wallet_id != self.wallet.id() || status != RequestStatus::Paid {
            return Ok(());
        }

        // Non-lightning request keys are not payment hashes.
        if PaymentHash::from_str(&key).is_err() {
            debug!(key = %key, "Ignoring paid request without payment hash");
            return Ok(());
        }

        self.on_paid(&key).await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
