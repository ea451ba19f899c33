use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::debug;

use crate::events::{EventHandler, LnurlEvent};
use crate::metrics::{
    AUTH_ATTEMPTS_TOTAL, CALLBACKS_TOTAL, EVENT_BUS_EVENTS_TOTAL, INVOICES_TOTAL,
    INVOICE_AMOUNT_MSAT, PAYMENTS_TOTAL, PAY_REQUESTS_TOTAL, ZAP_RECEIPTS_TOTAL,
};
use crate::wallet::RequestStatus;

/// Turns events into Prometheus counters.
pub struct MetricsEventHandler {
    service_name: String,
}

impl MetricsEventHandler {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn record_zap_receipt(&self, outcome: &'static str) {
        counter!(ZAP_RECEIPTS_TOTAL, "outcome" => outcome).increment(1);
    }
}

#[async_trait]
impl EventHandler for MetricsEventHandler {
    async fn handle(&self, event: LnurlEvent) -> anyhow::Result<()> {
        counter!(
            EVENT_BUS_EVENTS_TOTAL,
            "service" => self.service_name.clone(),
            "event_type" => event.event_type()
        )
        .increment(1);

        match &event {
            LnurlEvent::RequestStatus { status, .. } => {
                let status = match status {
                    RequestStatus::Unpaid => "unpaid",
                    RequestStatus::Paid => "paid",
                    RequestStatus::Expired => "expired",
                };
                counter!(PAYMENTS_TOTAL, "status" => status).increment(1);
            }
            LnurlEvent::PayRequestIssued { .. } => {
                counter!(PAY_REQUESTS_TOTAL, "result" => "issued").increment(1);
            }
            LnurlEvent::PayRequestRejected { .. } => {
                counter!(PAY_REQUESTS_TOTAL, "result" => "no_liquidity").increment(1);
            }
            LnurlEvent::CallbackRejected { error_code, .. } => {
                counter!(CALLBACKS_TOTAL, "error_code" => error_code.clone()).increment(1);
            }
            LnurlEvent::InvoiceCreated {
                amount_msat,
                is_zap,
                ..
            } => {
                let kind = if *is_zap { "zap" } else { "plain" };
                counter!(INVOICES_TOTAL, "kind" => kind).increment(1);
                histogram!(INVOICE_AMOUNT_MSAT, "kind" => kind).record(*amount_msat as f64);
            }
            LnurlEvent::ZapReceiptPublished { .. } => self.record_zap_receipt("published"),
            LnurlEvent::ZapReceiptSkipped { .. } => self.record_zap_receipt("skipped"),
            LnurlEvent::ZapReceiptFailed { .. } => self.record_zap_receipt("failed"),
            LnurlEvent::AuthenticationAttempt { success, .. } => {
                let result = if *success { "success" } else { "failure" };
                counter!(AUTH_ATTEMPTS_TOTAL, "result" => result).increment(1);
            }
            LnurlEvent::ServerStarted { .. } | LnurlEvent::ServerStopped { .. } => {}
        }

        debug!(event_type = event.event_type(), "Recorded event metrics");
        Ok(())
    }

    fn name(&self) -> &str {
        "metrics"
    }
}
