use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bitcoin::bip32::Xpriv;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use chrono::Utc;
use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};
use rand::RngCore;
use tracing::{debug, info, instrument};

use super::{CreatedRequest, InvoiceRequest, PaymentRequest, RequestStatus, Wallet};
use crate::events::{EventBus, LnurlEvent};
use crate::observability::sanitization::sanitize_invoice;
use crate::types::{PaymentHash, Preimage};

/// Minimum final CLTV delta put in issued invoices.
const MIN_FINAL_CLTV_EXPIRY_DELTA: u64 = 144;

struct StoredRequest {
    invoice: String,
    preimage: Preimage,
    amount_msat: u64,
    message: String,
    status: RequestStatus,
    expires_at: SystemTime,
}

impl StoredRequest {
    fn current_status(&self, now: SystemTime) -> RequestStatus {
        match self.status {
            RequestStatus::Unpaid if now >= self.expires_at => RequestStatus::Expired,
            status => status,
        }
    }
}

/// A self-contained wallet that signs real bolt11 invoices with a node key
/// from its xprv and settles them on demand.
///
/// Nothing is routed: `settle` is how a payment "arrives". It publishes the
/// same `RequestStatus` event a real wallet integration would.
pub struct MemoryWallet {
    id: String,
    lightning_xprv: String,
    node_secret: SecretKey,
    locked: AtomicBool,
    lightning: AtomicBool,
    can_receive_sat: AtomicU64,
    requests: Mutex<HashMap<PaymentHash, StoredRequest>>,
    event_bus: Arc<EventBus>,
}

impl std::fmt::Debug for MemoryWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWallet")
            .field("id", &self.id)
            .field("locked", &self.locked.load(Ordering::Relaxed))
            .field("lightning", &self.lightning.load(Ordering::Relaxed))
            .field("can_receive_sat", &self.can_receive_sat.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MemoryWallet {
    pub fn new(
        id: impl Into<String>,
        lightning_xprv: impl Into<String>,
        can_receive_sat: u64,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let lightning_xprv = lightning_xprv.into();
        let xprv = Xpriv::from_str(&lightning_xprv).context("invalid lightning xprv")?;

        Ok(Self {
            id: id.into(),
            node_secret: xprv.private_key,
            lightning_xprv,
            locked: AtomicBool::new(false),
            lightning: AtomicBool::new(true),
            can_receive_sat: AtomicU64::new(can_receive_sat),
            requests: Mutex::new(HashMap::new()),
            event_bus,
        })
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn set_lightning(&self, enabled: bool) {
        self.lightning.store(enabled, Ordering::SeqCst);
    }

    pub fn set_can_receive_sat(&self, sat: u64) {
        self.can_receive_sat.store(sat, Ordering::SeqCst);
    }

    /// Mark an unpaid invoice paid and announce it on the event bus.
    #[instrument(skip(self), fields(wallet_id = %self.id))]
    pub async fn settle(&self, payment_hash: &PaymentHash) -> Result<()> {
        let amount_msat = {
            let mut requests = self.lock_requests();
            let request = requests
                .get_mut(payment_hash)
                .ok_or_else(|| anyhow!("unknown payment hash {payment_hash}"))?;
            match request.current_status(SystemTime::now()) {
                RequestStatus::Unpaid => {}
                status => return Err(anyhow!("request is {status:?}, cannot settle")),
            }
            request.status = RequestStatus::Paid;
            request.amount_msat
        };

        let received_sat = amount_msat / 1000;
        // Liquidity only shrinks here; floor at zero.
        let _ = self
            .can_receive_sat
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |sat| {
                Some(sat.saturating_sub(received_sat))
            });

        info!(payment_hash = %payment_hash, amount_msat, "Invoice settled");

        self.event_bus
            .publish(LnurlEvent::RequestStatus {
                wallet_id: self.id.clone(),
                key: payment_hash.to_hex(),
                status: RequestStatus::Paid,
                timestamp: Utc::now(),
            })
            .await
    }

    fn lock_requests(&self) -> MutexGuard<'_, HashMap<PaymentHash, StoredRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sign_invoice(
        &self,
        payment_hash: &PaymentHash,
        amount_msat: u64,
        description: &str,
        expiry: Duration,
    ) -> Result<String> {
        let secp = Secp256k1::new();
        let mut payment_secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut payment_secret);

        let invoice = InvoiceBuilder::new(Currency::Bitcoin)
            .description_hash(sha256::Hash::hash(description.as_bytes()))
            .payment_hash(sha256::Hash::from_byte_array(payment_hash.0))
            .payment_secret(PaymentSecret(payment_secret))
            .current_timestamp()
            .min_final_cltv_expiry_delta(MIN_FINAL_CLTV_EXPIRY_DELTA)
            .amount_milli_satoshis(amount_msat)
            .expiry_time(expiry)
            .build_signed(|hash| secp.sign_ecdsa_recoverable(hash, &self.node_secret))
            .map_err(|e| anyhow!("failed to sign invoice: {e:?}"))?;

        Ok(invoice.to_string())
    }
}

#[async_trait]
impl Wallet for MemoryWallet {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    async fn has_lightning(&self) -> bool {
        self.lightning.load(Ordering::SeqCst)
    }

    async fn can_receive_sat(&self) -> Result<u64> {
        Ok(self.can_receive_sat.load(Ordering::SeqCst))
    }

    async fn lightning_xprv(&self) -> Result<String> {
        Ok(self.lightning_xprv.clone())
    }

    async fn create_request(&self, request: InvoiceRequest) -> Result<CreatedRequest> {
        let mut preimage = Preimage([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut preimage.0);
        let payment_hash = preimage.payment_hash();
        let amount_msat = request.amount_sat * 1000;

        let invoice = self.sign_invoice(
            &payment_hash,
            amount_msat,
            &request.description,
            request.expiry,
        )?;

        debug!(
            payment_hash = %payment_hash,
            amount_msat,
            invoice = %sanitize_invoice(&invoice),
            "Created payment request"
        );

        self.lock_requests().insert(
            payment_hash,
            StoredRequest {
                invoice: invoice.clone(),
                preimage,
                amount_msat,
                message: request.message,
                status: RequestStatus::Unpaid,
                expires_at: SystemTime::now() + request.expiry,
            },
        );

        Ok(CreatedRequest {
            invoice,
            payment_hash,
        })
    }

    async fn get_request(&self, key: &str) -> Option<PaymentRequest> {
        let payment_hash = PaymentHash::from_str(key).ok()?;
        let requests = self.lock_requests();
        let stored = requests.get(&payment_hash)?;
        Some(PaymentRequest {
            payment_hash,
            invoice: stored.invoice.clone(),
            amount_msat: stored.amount_msat,
            message: stored.message.clone(),
            is_lightning: true,
            status: stored.current_status(SystemTime::now()),
        })
    }

    async fn preimage(&self, payment_hash: &PaymentHash) -> Option<Preimage> {
        self.lock_requests().get(payment_hash).map(|r| r.preimage)
    }
}
