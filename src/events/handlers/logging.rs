use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{EventHandler, LnurlEvent};
use crate::wallet::RequestStatus;

/// Writes every event to the log at a level matching its importance.
///
/// Events never carry invoices or preimages, only payment hashes.
pub struct LoggingEventHandler {
    include_debug_events: bool,
}

impl LoggingEventHandler {
    pub fn new(include_debug_events: bool) -> Self {
        Self {
            include_debug_events,
        }
    }
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: LnurlEvent) -> anyhow::Result<()> {
        match event {
            LnurlEvent::RequestStatus {
                wallet_id,
                key,
                status,
                timestamp,
            } => match status {
                RequestStatus::Paid => info!(
                    event_type = "request_status",
                    wallet_id = %wallet_id,
                    payment_hash = %key,
                    status = ?status,
                    timestamp = %timestamp,
                    "Payment request paid"
                ),
                _ if self.include_debug_events => debug!(
                    event_type = "request_status",
                    wallet_id = %wallet_id,
                    payment_hash = %key,
                    status = ?status,
                    timestamp = %timestamp,
                    "Payment request status changed"
                ),
                _ => {}
            },
            LnurlEvent::PayRequestIssued {
                username,
                max_sendable_msat,
                correlation_id,
                timestamp,
            } => {
                if self.include_debug_events {
                    debug!(
                        event_type = "pay_request_issued",
                        username = %username,
                        max_sendable_msat,
                        correlation_id = ?correlation_id,
                        timestamp = %timestamp,
                        "Pay request issued"
                    );
                }
            }
            LnurlEvent::PayRequestRejected {
                reason,
                correlation_id,
                timestamp,
            } => {
                warn!(
                    event_type = "pay_request_rejected",
                    reason = %reason,
                    correlation_id = ?correlation_id,
                    timestamp = %timestamp,
                    "Pay request rejected"
                );
            }
            LnurlEvent::CallbackRejected {
                error_code,
                reason,
                correlation_id,
                timestamp,
            } => {
                info!(
                    event_type = "callback_rejected",
                    error_code = %error_code,
                    reason = %reason,
                    correlation_id = ?correlation_id,
                    timestamp = %timestamp,
                    "Callback rejected"
                );
            }
            LnurlEvent::InvoiceCreated {
                payment_hash,
                amount_msat,
                is_zap,
                correlation_id,
                timestamp,
            } => {
                info!(
                    event_type = "invoice_created",
                    payment_hash = %payment_hash,
                    amount_msat,
                    is_zap,
                    correlation_id = ?correlation_id,
                    timestamp = %timestamp,
                    "Invoice created"
                );
            }
            LnurlEvent::ZapReceiptPublished {
                payment_hash,
                event_id,
                accepted_relays,
                rejected_relays,
                timestamp,
            } => {
                info!(
                    event_type = "zap_receipt_published",
                    payment_hash = %payment_hash,
                    event_id = %event_id,
                    accepted_relays,
                    rejected_relays,
                    timestamp = %timestamp,
                    "Zap receipt published"
                );
            }
            LnurlEvent::ZapReceiptSkipped {
                payment_hash,
                timestamp,
            } => {
                if self.include_debug_events {
                    debug!(
                        event_type = "zap_receipt_skipped",
                        payment_hash = %payment_hash,
                        timestamp = %timestamp,
                        "No zap request for paid invoice"
                    );
                }
            }
            LnurlEvent::ZapReceiptFailed {
                payment_hash,
                reason,
                timestamp,
            } => {
                warn!(
                    event_type = "zap_receipt_failed",
                    payment_hash = %payment_hash,
                    reason = %reason,
                    timestamp = %timestamp,
                    "Zap receipt failed"
                );
            }
            LnurlEvent::ServerStarted {
                wallet_id,
                address,
                timestamp,
            } => {
                info!(
                    event_type = "server_started",
                    wallet_id = %wallet_id,
                    address = %address,
                    timestamp = %timestamp,
                    "LNURL server started"
                );
            }
            LnurlEvent::ServerStopped {
                wallet_id,
                timestamp,
            } => {
                info!(
                    event_type = "server_stopped",
                    wallet_id = %wallet_id,
                    timestamp = %timestamp,
                    "LNURL server stopped"
                );
            }
            LnurlEvent::AuthenticationAttempt {
                endpoint,
                success,
                reason,
                correlation_id,
                timestamp,
            } => {
                if success {
                    if self.include_debug_events {
                        debug!(
                            event_type = "authentication_attempt",
                            endpoint = %endpoint,
                            correlation_id = ?correlation_id,
                            timestamp = %timestamp,
                            "Authentication succeeded"
                        );
                    }
                } else {
                    warn!(
                        event_type = "authentication_attempt",
                        endpoint = %endpoint,
                        reason = ?reason,
                        correlation_id = ?correlation_id,
                        timestamp = %timestamp,
                        "Authentication failed"
                    );
                }
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }

    fn is_critical(&self) -> bool {
        true
    }
}
