//! NIP-57 support: zap request validation, receipt signing and relay
//! publishing.

pub mod keys;
pub mod receipt;
pub mod relay;
pub mod zap_request;

pub use keys::derive_signing_keys;
pub use receipt::{PublishOutcome, ZapReceiptPublisher, ZapRecord};
pub use relay::{BroadcastReport, NostrRelayPublisher, RelayPublisher};
pub use zap_request::{validate_zap_request, ValidatedZapRequest, ZapRequestError};
