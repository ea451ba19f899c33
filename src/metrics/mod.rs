use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::{debug, info};

pub const HTTP_REQUESTS_TOTAL: &str = "lnurld_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "lnurld_http_request_duration_seconds";

pub const PAY_REQUESTS_TOTAL: &str = "lnurld_pay_requests_total";
pub const CALLBACKS_TOTAL: &str = "lnurld_callbacks_total";
pub const INVOICES_TOTAL: &str = "lnurld_invoices_total";
pub const INVOICE_AMOUNT_MSAT: &str = "lnurld_invoice_amount_msat";
pub const PAYMENTS_TOTAL: &str = "lnurld_payments_total";
pub const ZAP_RECEIPTS_TOTAL: &str = "lnurld_zap_receipts_total";
pub const AUTH_ATTEMPTS_TOTAL: &str = "lnurld_auth_attempts_total";
pub const EVENT_BUS_EVENTS_TOTAL: &str = "lnurld_event_bus_events_total";

const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process and return its handle.
pub fn init_prometheus_metrics() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            EXPONENTIAL_SECONDS,
        )?
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests by endpoint and status class");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(PAY_REQUESTS_TOTAL, "Pay requests answered, by result");
    describe_counter!(CALLBACKS_TOTAL, "Rejected callbacks, by error code");
    describe_counter!(INVOICES_TOTAL, "Invoices created for callbacks");
    describe_histogram!(INVOICE_AMOUNT_MSAT, "Invoice amounts in millisatoshis");
    describe_counter!(PAYMENTS_TOTAL, "Wallet request status changes");
    describe_counter!(ZAP_RECEIPTS_TOTAL, "Zap receipts, by outcome");
    describe_counter!(AUTH_ATTEMPTS_TOTAL, "Add-request authentication attempts");
    describe_counter!(EVENT_BUS_EVENTS_TOTAL, "Events seen on the event bus");

    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    info!("Prometheus metrics initialized");
    Ok(handle)
}

/// Called by the request tracking middleware.
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let status_class = match status_code {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    };

    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => path.to_string(),
        "status" => status_class
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => path.to_string()
    )
    .record(duration.as_secs_f64());

    debug!(
        method = %method,
        path = %path,
        status_code,
        duration_ms = duration.as_millis() as u64,
        "Recorded HTTP request metrics"
    );
}
