use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::auth::BasicAuth;
use crate::types::PaymentHash;

/// Body of `POST /api/add_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    #[serde(deserialize_with = "deserialize_amount_msats")]
    pub amount_msats: u64,
    pub comment: String,
    /// Either the LNURL metadata or the zap request JSON; the invoice
    /// commits to its sha256.
    pub metadata: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequestResponse {
    pub invoice: String,
    pub rhash: PaymentHash,
}

/// Accept `21000` as well as `"21000"`.
fn deserialize_amount_msats<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(u64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Turns a validated pay request into a bolt11 invoice.
#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn create_invoice(&self, request: AddRequest) -> Result<AddRequestResponse>;
}

/// [`InvoiceService`] posting to an add-request endpoint, by default our own.
#[derive(Debug, Clone)]
pub struct HttpInvoiceService {
    client: Client,
    endpoint: String,
    password: Option<String>,
}

impl HttpInvoiceService {
    pub fn new(endpoint: impl Into<String>, password: Option<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)
            .with_context(|| format!("invalid add request endpoint {endpoint}"))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            password,
        })
    }
}

#[async_trait]
impl InvoiceService for HttpInvoiceService {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint, amount_msats = request.amount_msats))]
    async fn create_invoice(&self, request: AddRequest) -> Result<AddRequestResponse> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("User-Agent", concat!("lnurld/", env!("CARGO_PKG_VERSION")))
            .json(&request);
        if let Some(password) = &self.password {
            builder = builder.header(reqwest::header::AUTHORIZATION, BasicAuth::header_value(password));
        }

        let response = builder.send().await.context("add request call failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("add request returned {status}: {body}"));
        }

        let created: AddRequestResponse = response
            .json()
            .await
            .context("add request returned an unexpected body")?;
        debug!(payment_hash = %created.rhash, "Invoice created by add request endpoint");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_accepts_number_or_string() {
        let a: AddRequest = serde_json::from_str(
            r#"{"amount_msats": 21000, "comment": "hi", "metadata": "[]"}"#,
        )
        .unwrap();
        let b: AddRequest = serde_json::from_str(
            r#"{"amount_msats": "21000", "comment": "hi", "metadata": "[]"}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.amount_msats, 21000);
        assert_eq!(a.event_id, None);
    }

    #[test]
    fn test_malformed_bodies_rejected() {
        for body in [
            r#"{"amount_msats": "lots", "comment": "", "metadata": "[]"}"#,
            r#"{"amount_msats": -5, "comment": "", "metadata": "[]"}"#,
            r#"{"comment": "", "metadata": "[]"}"#,
            r#"not json"#,
        ] {
            assert!(serde_json::from_str::<AddRequest>(body).is_err(), "{body}");
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(HttpInvoiceService::new("not a url", None, Duration::from_secs(1)).is_err());
    }
}
