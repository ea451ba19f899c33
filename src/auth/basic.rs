use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use chrono::Utc;
use tracing::{debug, warn};

use crate::events::{EventBus, LnurlEvent};
use crate::observability::correlation::RequestContext;

/// Fixed user name for the add-request API, the password is the secret.
pub const AUTH_USERNAME: &str = "lnurld";

#[derive(Clone)]
pub struct BasicAuth {
    password: Option<String>,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl BasicAuth {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }

    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn verify(&self, auth_header: &str) -> bool {
        let Some(password) = &self.password else {
            return true;
        };

        let Some(credentials) = auth_header.strip_prefix("Basic ") else {
            return false;
        };
        match base64::engine::general_purpose::STANDARD.decode(credentials.trim()) {
            Ok(decoded) => decoded == format!("{AUTH_USERNAME}:{password}").as_bytes(),
            Err(_) => false,
        }
    }

    /// `Authorization` header value for outgoing requests.
    pub fn header_value(password: &str) -> String {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{AUTH_USERNAME}:{password}"));
        format!("Basic {encoded}")
    }
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(WWW_AUTHENTICATE, "Basic realm=\"lnurld\"")
        .body(Body::from("Unauthorized"))
        .unwrap_or_else(|_| Response::new(Body::from("Unauthorized")))
}

/// Basic auth in front of the add-request API, publishing every attempt.
pub async fn basic_auth_middleware(
    auth: Arc<BasicAuth>,
    event_bus: Arc<EventBus>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !auth.is_enabled() {
        return Ok(next.run(request).await);
    }

    let path = request.uri().path().to_string();
    let correlation_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|c| c.correlation_id.clone());

    let failure = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
    {
        Some(header) if auth.verify(header) => None,
        Some(_) => Some("invalid_credentials"),
        None => Some("missing_authorization_header"),
    };

    let event = LnurlEvent::AuthenticationAttempt {
        endpoint: path.clone(),
        success: failure.is_none(),
        reason: failure.map(str::to_string),
        correlation_id,
        timestamp: Utc::now(),
    };
    tokio::spawn(async move {
        if let Err(e) = event_bus.publish(event).await {
            warn!(error = %e, "Failed to publish authentication event");
        }
    });

    match failure {
        None => {
            debug!(path = %path, "Authentication successful");
            Ok(next.run(request).await)
        }
        Some(reason) => {
            warn!(path = %path, failure_reason = reason, "Authentication failed");
            Ok(unauthorized())
        }
    }
}
