use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest correlation id accepted from a client.
pub const MAX_CORRELATION_ID_LENGTH: usize = 200;

/// Identifiers attached to every request and echoed in error bodies.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(correlation_id: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

pub fn validate_correlation_id(correlation_id: &str) -> Result<(), &'static str> {
    if correlation_id.is_empty() {
        return Err("Correlation ID cannot be empty");
    }
    if correlation_id.len() > MAX_CORRELATION_ID_LENGTH {
        return Err("Correlation ID exceeds maximum length");
    }
    if !correlation_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Correlation ID contains invalid characters");
    }
    Ok(())
}

/// Tag the request with a [`RequestContext`] and run it inside a span.
///
/// Wallets and LNURL clients rarely send a correlation id, so one is minted
/// when absent. A malformed one is rejected with 400.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let correlation_id = match req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(id) => {
            if let Err(reason) = validate_correlation_id(id) {
                warn!(reason = %reason, "Invalid correlation ID rejected");
                return Err(StatusCode::BAD_REQUEST);
            }
            Some(id.to_string())
        }
        None => None,
    };

    let context = RequestContext::new(correlation_id);
    req.extensions_mut().insert(context.clone());

    // The path only: query strings carry callback tokens and zap requests.
    let span = info_span!(
        "request",
        correlation_id = %context.correlation_id,
        request_id = %context.request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let mut response = next.run(req).await;

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&context.correlation_id) {
            headers.insert(CORRELATION_ID_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&context.request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }

        Ok(response)
    }
    .instrument(span)
    .await
}
