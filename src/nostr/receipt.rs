use std::sync::Arc;

use nostr_sdk::{Event, EventBuilder, JsonUtil, Keys, Kind, Tag, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::relay::RelayPublisher;
use crate::cache::{TokenCache, ZAP_REQUEST_CAPACITY};
use crate::error::AppError;
use crate::observability::sanitization::{sanitize_invoice, sanitize_preimage};
use crate::types::{PaymentHash, Preimage};

/// Request tags copied verbatim into the receipt, first occurrence only.
const CARRIED_TAGS: [&str; 5] = ["p", "e", "a", "P", "k"];

/// A validated zap request waiting for its invoice to be paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapRecord {
    pub zap_request_json: String,
    pub bolt11: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published {
        event_id: String,
        accepted: Vec<String>,
        rejected: Vec<String>,
    },
    /// No zap request is on record for the payment hash.
    Skipped,
}

/// Builds, signs and publishes NIP-57 zap receipts.
pub struct ZapReceiptPublisher {
    keys: Keys,
    fallback_relays: Vec<String>,
    zap_requests: TokenCache<PaymentHash, ZapRecord>,
    relay: Arc<dyn RelayPublisher>,
}

impl ZapReceiptPublisher {
    pub fn new(keys: Keys, fallback_relays: Vec<String>, relay: Arc<dyn RelayPublisher>) -> Self {
        Self {
            keys,
            fallback_relays,
            zap_requests: TokenCache::new("zap_requests", ZAP_REQUEST_CAPACITY),
            relay,
        }
    }

    /// The x-only public key advertised as `nostrPubkey`.
    pub fn public_key_hex(&self) -> String {
        self.keys.public_key().to_hex()
    }

    pub fn store_zap_request(&self, payment_hash: PaymentHash, zap_request_json: String, bolt11: String) {
        debug!(
            payment_hash = %payment_hash,
            invoice = %sanitize_invoice(&bolt11),
            "Storing zap request"
        );
        self.zap_requests.put(
            payment_hash,
            ZapRecord {
                zap_request_json,
                bolt11,
            },
        );
    }

    pub fn pending_zap_request(&self, payment_hash: &PaymentHash) -> Option<ZapRecord> {
        self.zap_requests.get(payment_hash)
    }

    pub fn pending_count(&self) -> usize {
        self.zap_requests.len()
    }

    /// Publish the receipt for a paid invoice if a zap request is on record.
    ///
    /// The record is taken before the receipt is built, so a repeated payment
    /// notification does not produce a second receipt. It is put back when
    /// no receipt could be built from it.
    #[instrument(skip(self, preimage), fields(preimage = %sanitize_preimage(preimage)))]
    pub async fn publish_receipt(
        &self,
        payment_hash: PaymentHash,
        preimage: &Preimage,
    ) -> Result<PublishOutcome, AppError> {
        // Taking the record is the claim: a concurrent duplicate finds nothing
        let Some(record) = self.zap_requests.remove(&payment_hash) else {
            debug!(payment_hash = %payment_hash, "No zap request on record, skipping receipt");
            return Ok(PublishOutcome::Skipped);
        };

        let (relays, receipt) = match self.prepare_receipt(&record, preimage) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.zap_requests.put(payment_hash, record);
                return Err(e);
            }
        };

        let report = self
            .relay
            .broadcast(&relays, &receipt)
            .await
            .map_err(|e| AppError::publish_error(format!("failed to publish zap receipt: {e:#}")))?;

        if report.accepted.is_empty() {
            warn!(
                payment_hash = %payment_hash,
                event_id = %receipt.id.to_hex(),
                rejected = ?report.rejected,
                "No relay accepted the zap receipt"
            );
        } else {
            info!(
                payment_hash = %payment_hash,
                event_id = %receipt.id.to_hex(),
                accepted = report.accepted.len(),
                rejected = report.rejected.len(),
                "Published zap receipt"
            );
        }

        Ok(PublishOutcome::Published {
            event_id: receipt.id.to_hex(),
            accepted: report.accepted,
            rejected: report.rejected,
        })
    }

    fn prepare_receipt(
        &self,
        record: &ZapRecord,
        preimage: &Preimage,
    ) -> Result<(Vec<String>, Event), AppError> {
        let request = Event::from_json(&record.zap_request_json).map_err(|e| {
            AppError::publish_error(format!("stored zap request no longer parses: {e}"))
        })?;
        let relays = self.target_relays(&request);
        let receipt = self.build_receipt(record, &request, preimage, Timestamp::now())?;
        Ok((relays, receipt))
    }

    /// Relays named by the request's `relays` tag, or the fallback list.
    pub fn target_relays(&self, request: &Event) -> Vec<String> {
        request
            .tags
            .iter()
            .map(|tag| tag.as_slice())
            .find(|tag| tag.first().map(String::as_str) == Some("relays"))
            .filter(|tag| tag.len() > 1)
            .map(|tag| tag[1..].to_vec())
            .unwrap_or_else(|| self.fallback_relays.clone())
    }

    pub fn build_receipt(
        &self,
        record: &ZapRecord,
        request: &Event,
        preimage: &Preimage,
        created_at: Timestamp,
    ) -> Result<Event, AppError> {
        let mut tags = vec![
            custom_tag("bolt11", &record.bolt11)?,
            custom_tag("description", &record.zap_request_json)?,
            custom_tag("preimage", &preimage.to_hex())?,
        ];
        for name in CARRIED_TAGS {
            if let Some(tag) = request
                .tags
                .iter()
                .find(|tag| tag.as_slice().first().map(String::as_str) == Some(name))
            {
                tags.push(tag.clone());
            }
        }

        EventBuilder::new(Kind::ZapReceipt, "")
            .tags(tags)
            .custom_created_at(created_at)
            .sign_with_keys(&self.keys)
            .map_err(|e| AppError::publish_error(format!("failed to sign zap receipt: {e}")))
    }
}

fn custom_tag(name: &str, value: &str) -> Result<Tag, AppError> {
    Tag::parse([name.to_string(), value.to_string()])
        .map_err(|e| AppError::publish_error(format!("invalid {name} tag: {e}")))
}
