//! The wallet the server receives into.
//!
//! The server never touches channels or keys beyond the Lightning xprv it
//! derives its nostr key from; everything else goes through [`Wallet`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{PaymentHash, Preimage};

pub mod memory;

pub use memory::MemoryWallet;

/// Expiry of invoices created for pay requests.
pub const INVOICE_EXPIRY: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Unpaid,
    Paid,
    Expired,
}

/// What the wallet needs to issue an invoice for a pay request.
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub amount_sat: u64,
    /// Stored with the request as its label.
    pub message: String,
    /// The invoice commits to `sha256(description)` instead of carrying it.
    pub description: String,
    pub expiry: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRequest {
    pub invoice: String,
    pub payment_hash: PaymentHash,
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub payment_hash: PaymentHash,
    pub invoice: String,
    pub amount_msat: u64,
    pub message: String,
    pub is_lightning: bool,
    pub status: RequestStatus,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Stable identifier, used to match status events to this wallet.
    fn id(&self) -> &str;

    async fn is_locked(&self) -> bool;

    async fn has_lightning(&self) -> bool;

    /// Inbound liquidity currently available, in sat.
    async fn can_receive_sat(&self) -> anyhow::Result<u64>;

    /// Serialized BIP-32 extended private key of the Lightning node.
    async fn lightning_xprv(&self) -> anyhow::Result<String>;

    async fn create_request(&self, request: InvoiceRequest) -> anyhow::Result<CreatedRequest>;

    /// Look a request up by its key, the payment hash hex for lightning requests.
    async fn get_request(&self, key: &str) -> Option<PaymentRequest>;

    async fn preimage(&self, payment_hash: &PaymentHash) -> Option<Preimage>;
}
