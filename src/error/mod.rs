use std::fmt;

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

pub mod categories;

pub use categories::ErrorCategory;

use crate::nostr::zap_request::ZapRequestError;
use crate::observability::correlation::RequestContext;


#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub request_context: Option<RequestContext>,
}

impl AppError {
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.request_context = Some(context);
        self
    }

    pub fn insufficient_liquidity(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InsufficientLiquidity, message)
    }

    pub fn token_not_found(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::TokenNotFound, message)
    }

    pub fn amount_out_of_range(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::AmountOutOfRange, message)
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InvalidAmount, message)
    }

    pub fn upstream_invoice_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::UpstreamInvoiceError, message)
    }

    pub fn invalid_username(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InvalidUsername, message)
    }

    pub fn malformed_request_body(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::MalformedRequestBody, message)
    }

    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::AuthenticationError, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InvalidConfig, message)
    }

    pub fn wallet_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::WalletError, message)
    }

    pub fn publish_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::PublishError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_category(ErrorCategory::InternalError, message)
    }

    pub fn with_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            details: None,
            source: None,
            request_context: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.category.status_code();

        if self.category.is_server_error() {
            error!(
                category = ?self.category,
                code = self.category.error_code(),
                message = %self.message,
                details = ?self.details,
                source = ?self.source,
                correlation_id = self.request_context.as_ref().map(|c| &c.correlation_id),
                request_id = self.request_context.as_ref().map(|c| &c.request_id),
                "Server side error"
            );
        } else {
            warn!(
                category = ?self.category,
                code = self.category.error_code(),
                message = %self.message,
                details = ?self.details,
                correlation_id = self.request_context.as_ref().map(|c| &c.correlation_id),
                request_id = self.request_context.as_ref().map(|c| &c.request_id),
                "Client error"
            );
        }

        if self.category.is_lnurl_error() {
            let body = json!({
                "status": "ERROR",
                "reason": self.message,
            });
            return (status, Json(body)).into_response();
        }

        let body = json!({
            "error": {
                "code": self.category.error_code(),
                "message": self.message,
                "details": self.details,
                "correlation_id": self.request_context.as_ref().map(|c| &c.correlation_id),
                "request_id": self.request_context.as_ref().map(|c| &c.request_id),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_error(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_request_body(format!("JSON parsing error: {}", err)).with_source(err)
    }
}

impl From<ZapRequestError> for AppError {
    fn from(err: ZapRequestError) -> Self {
        Self::with_category(
            ErrorCategory::InvalidZapRequest,
            format!("Invalid zap request: {}.", err),
        )
        .with_source(err)
    }
}
