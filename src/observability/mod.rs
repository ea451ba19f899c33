pub mod correlation;
pub mod logging;
pub mod sanitization;

#[cfg(test)]
mod tests;

pub use correlation::{
    request_id_middleware, RequestContext, CORRELATION_ID_HEADER, REQUEST_ID_HEADER,
};
pub use logging::{init_logging, LoggingConfig};
pub use sanitization::{
    sanitize_invoice, sanitize_password, sanitize_preimage, sanitize_private_key, sanitize_token,
    SensitiveData, SensitiveKind,
};
