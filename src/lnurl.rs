//! LNURL-pay request handling: pay request, callback and the add-request API.

use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cache::{TokenCache, CALLBACK_TOKEN_CAPACITY};
use crate::error::AppError;
use crate::events::{EventBus, LnurlEvent};
use crate::invoice::{AddRequest, AddRequestResponse, InvoiceService};
use crate::nostr::receipt::ZapReceiptPublisher;
use crate::nostr::zap_request::validate_zap_request;
use crate::observability::correlation::RequestContext;
use crate::observability::sanitization::{sanitize_invoice, sanitize_token};
use crate::types::{COMMENT_ALLOWED, MIN_SENDABLE_MSAT};
use crate::wallet::{InvoiceRequest, Wallet, INVOICE_EXPIRY};

/// Longest username accepted in `/.well-known/lnurlp/{username}`.
pub const MAX_USERNAME_LENGTH: usize = 100;

/// Comment used when the payer sends none.
pub const DEFAULT_COMMENT: &str = "lnurlp request";

pub const NO_LIQUIDITY: &str = "cannot receive anything, no liquidity.";
pub const TOKEN_NOT_FOUND: &str = "request not found, maybe expired, try again.";
pub const AMOUNT_TOO_LARGE: &str = "cannot receive this amount, try smaller payment.";
pub const AMOUNT_TOO_SMALL: &str = "amount below minSendable.";
pub const INVALID_AMOUNT: &str = "invalid amount.";
pub const INVOICE_FAILED: &str = "failed to create invoice, try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequestResponse {
    pub callback: String,
    pub max_sendable: u64,
    pub min_sendable: u64,
    pub metadata: String,
    pub comment_allowed: usize,
    pub tag: String,
    pub allows_nostr: bool,
    pub nostr_pubkey: String,
}

/// Query of `/lnurlp/callback/{token}`. Values stay raw so that a bad amount
/// becomes an LNURL error instead of a rejected request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub amount: Option<String>,
    pub comment: Option<String>,
    pub nostr: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string. The first value of a repeated key wins and
    /// unknown keys are ignored.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "amount" => &mut params.amount,
                "comment" => &mut params.comment,
                "nostr" => &mut params.nostr,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub pr: String,
    pub routes: Vec<Value>,
}

/// Ties the pay request, the callback and the zap receipt together for one
/// wallet.
pub struct LnurlService {
    domain: String,
    wallet: Arc<dyn Wallet>,
    invoices: Arc<dyn InvoiceService>,
    receipts: Arc<ZapReceiptPublisher>,
    event_bus: Arc<EventBus>,
    callback_tokens: TokenCache<String, String>,
}

impl LnurlService {
    pub fn new(
        domain: String,
        wallet: Arc<dyn Wallet>,
        invoices: Arc<dyn InvoiceService>,
        receipts: Arc<ZapReceiptPublisher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            domain,
            wallet,
            invoices,
            receipts,
            event_bus,
            callback_tokens: TokenCache::new("callback_tokens", CALLBACK_TOKEN_CAPACITY),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    pub fn receipts(&self) -> &Arc<ZapReceiptPublisher> {
        &self.receipts
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn pending_tokens(&self) -> usize {
        self.callback_tokens.len()
    }

    /// Answer `GET /.well-known/lnurlp/{username}` and issue a callback token.
    #[instrument(skip(self, context))]
    pub async fn pay_request(
        &self,
        username: &str,
        context: Option<&RequestContext>,
    ) -> Result<PayRequestResponse, AppError> {
        let correlation_id = context.map(|c| c.correlation_id.clone());

        let length = username.chars().count();
        if length > MAX_USERNAME_LENGTH {
            return Err(AppError::invalid_username("Invalid username").with_details(
                serde_json::json!({ "length": length, "max_length": MAX_USERNAME_LENGTH }),
            ));
        }

        let max_sendable = self.can_receive_msat().await?;
        if max_sendable < MIN_SENDABLE_MSAT {
            self.publish(LnurlEvent::PayRequestRejected {
                reason: NO_LIQUIDITY.to_string(),
                correlation_id,
                timestamp: Utc::now(),
            })
            .await;
            return Err(AppError::insufficient_liquidity(NO_LIQUIDITY));
        }

        let metadata = pay_request_metadata(username);
        let token = generate_token();
        self.callback_tokens.put(token.clone(), metadata.clone());
        debug!(token = %sanitize_token(&token), "Issued callback token");

        self.publish(LnurlEvent::PayRequestIssued {
            username: username.to_string(),
            max_sendable_msat: max_sendable,
            correlation_id,
            timestamp: Utc::now(),
        })
        .await;

        Ok(PayRequestResponse {
            callback: format!("https://{}/lnurlp/callback/{}", self.domain, token),
            max_sendable,
            min_sendable: MIN_SENDABLE_MSAT,
            metadata,
            comment_allowed: COMMENT_ALLOWED,
            tag: "payRequest".to_string(),
            allows_nostr: true,
            nostr_pubkey: self.receipts.public_key_hex(),
        })
    }

    /// Answer `GET /lnurlp/callback/{token}` with an invoice.
    #[instrument(skip(self, token, params, context), fields(token = %sanitize_token(token)))]
    pub async fn callback(
        &self,
        token: &str,
        params: CallbackParams,
        context: Option<&RequestContext>,
    ) -> Result<CallbackResponse, AppError> {
        let correlation_id = context.map(|c| c.correlation_id.clone());

        match self.create_callback_invoice(token, params, correlation_id.clone()).await {
            Ok(response) => Ok(response),
            Err(err) => {
                if err.category.is_lnurl_error() {
                    self.publish(LnurlEvent::CallbackRejected {
                        error_code: err.category.error_code().to_string(),
                        reason: err.message.clone(),
                        correlation_id,
                        timestamp: Utc::now(),
                    })
                    .await;
                }
                Err(err)
            }
        }
    }

    async fn create_callback_invoice(
        &self,
        token: &str,
        params: CallbackParams,
        correlation_id: Option<String>,
    ) -> Result<CallbackResponse, AppError> {
        let metadata = self
            .callback_tokens
            .get(&token.to_string())
            .ok_or_else(|| AppError::token_not_found(TOKEN_NOT_FOUND))?;

        let amount_msat: u64 = params
            .amount
            .as_deref()
            .and_then(|amount| amount.trim().parse().ok())
            .ok_or_else(|| AppError::invalid_amount(INVALID_AMOUNT))?;

        let can_receive_sat = self.can_receive_sat().await?;
        if amount_msat / 1000 > can_receive_sat {
            return Err(AppError::amount_out_of_range(AMOUNT_TOO_LARGE));
        }
        if amount_msat < MIN_SENDABLE_MSAT {
            return Err(AppError::amount_out_of_range(AMOUNT_TOO_SMALL));
        }

        // A present but empty `nostr` is still a zap request and gets validated
        let zap_request = match params.nostr.as_deref() {
            Some(raw) => Some(validate_zap_request(raw, amount_msat)?),
            None => None,
        };

        let comment: String = match params.comment.as_deref() {
            Some(comment) => comment.chars().take(COMMENT_ALLOWED).collect(),
            None => DEFAULT_COMMENT.to_string(),
        };

        let request = AddRequest {
            amount_msats: amount_msat,
            comment,
            metadata: zap_request
                .as_ref()
                .map(|zap| zap.raw.clone())
                .unwrap_or(metadata),
            event_id: zap_request.as_ref().and_then(|zap| zap.event_id.clone()),
        };

        let created = self.invoices.create_invoice(request).await.map_err(|e| {
            warn!(error = %format!("{e:#}"), "Invoice service failed");
            AppError::upstream_invoice_error(INVOICE_FAILED)
        })?;

        let is_zap = zap_request.is_some();
        if let Some(zap) = zap_request {
            self.receipts
                .store_zap_request(created.rhash, zap.raw, created.invoice.clone());
        }

        info!(
            payment_hash = %created.rhash,
            amount_msat,
            is_zap,
            invoice = %sanitize_invoice(&created.invoice),
            "Created invoice for pay request"
        );
        self.publish(LnurlEvent::InvoiceCreated {
            payment_hash: created.rhash.to_hex(),
            amount_msat,
            is_zap,
            correlation_id,
            timestamp: Utc::now(),
        })
        .await;

        Ok(CallbackResponse {
            pr: created.invoice,
            routes: Vec::new(),
        })
    }

    /// Create an invoice in the wallet for `POST /api/add_request`.
    ///
    /// The request is for whole sats; the invoice commits to
    /// `sha256(metadata)`.
    #[instrument(skip(self, request), fields(amount_msats = request.amount_msats))]
    pub async fn add_request(&self, request: AddRequest) -> Result<AddRequestResponse, AppError> {
        let created = self
            .wallet
            .create_request(InvoiceRequest {
                amount_sat: request.amount_msats / 1000,
                message: request.comment,
                description: request.metadata,
                expiry: INVOICE_EXPIRY,
            })
            .await
            .map_err(|e| AppError::wallet_error(format!("failed to create request: {e:#}")))?;

        Ok(AddRequestResponse {
            invoice: created.invoice,
            rhash: created.payment_hash,
        })
    }

    async fn can_receive_sat(&self) -> Result<u64, AppError> {
        self.wallet
            .can_receive_sat()
            .await
            .map_err(|e| AppError::wallet_error(format!("failed to query liquidity: {e:#}")))
    }

    async fn can_receive_msat(&self) -> Result<u64, AppError> {
        Ok(self.can_receive_sat().await?.saturating_mul(1000))
    }

    async fn publish(&self, event: LnurlEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            warn!(error = %e, "Failed to publish event");
        }
    }
}

/// `[["text/plain","Payment to <username>"]]`
pub fn pay_request_metadata(username: &str) -> String {
    serde_json::json!([["text/plain", format!("Payment to {username}")]]).to_string()
}

/// 128 random bits, hex encoded.
fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[path = "lnurl_tests.rs"]
mod tests;
