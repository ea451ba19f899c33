pub mod logging;
pub mod metrics;
pub mod zap_receipt;

pub use logging::LoggingEventHandler;
pub use metrics::MetricsEventHandler;
pub use zap_receipt::ZapReceiptHandler;
