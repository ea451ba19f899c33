use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    // LNURL errors, reported to the wallet as `{"status":"ERROR"}`
    InsufficientLiquidity,
    TokenNotFound,
    AmountOutOfRange,
    InvalidAmount,
    InvalidZapRequest,
    UpstreamInvoiceError,

    // Transport level client errors
    InvalidUsername,
    MalformedRequestBody,
    AuthenticationError,

    // Server side
    InvalidConfig,
    WalletError,
    PublishError,
    InternalError,
}

impl ErrorCategory {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // LUD-06: errors travel inside a successful response
            Self::InsufficientLiquidity
            | Self::TokenNotFound
            | Self::AmountOutOfRange
            | Self::InvalidAmount
            | Self::InvalidZapRequest
            | Self::UpstreamInvoiceError => StatusCode::OK,
            Self::InvalidUsername => StatusCode::BAD_REQUEST,
            Self::MalformedRequestBody => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::AuthenticationError => StatusCode::UNAUTHORIZED,
            Self::InvalidConfig | Self::WalletError | Self::PublishError | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidZapRequest => "INVALID_ZAP_REQUEST",
            Self::UpstreamInvoiceError => "UPSTREAM_INVOICE_ERROR",
            Self::InvalidUsername => "INVALID_USERNAME",
            Self::MalformedRequestBody => "MALFORMED_REQUEST_BODY",
            Self::AuthenticationError => "AUTH_FAILED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::WalletError => "WALLET_ERROR",
            Self::PublishError => "PUBLISH_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Errors a paying wallet sees as an LNURL `{"status":"ERROR","reason":..}`
    /// payload rather than as a transport failure.
    pub fn is_lnurl_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientLiquidity
                | Self::TokenNotFound
                | Self::AmountOutOfRange
                | Self::InvalidAmount
                | Self::InvalidZapRequest
                | Self::UpstreamInvoiceError
        )
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TokenNotFound
                | Self::AmountOutOfRange
                | Self::InvalidAmount
                | Self::InvalidZapRequest
                | Self::InvalidUsername
                | Self::MalformedRequestBody
                | Self::AuthenticationError
        )
    }

    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_code())
    }
}
