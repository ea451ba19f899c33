use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::wallet::RequestStatus;

pub mod handlers;

/// Everything that happens to a pay request between the first GET and the
/// zap receipt, plus the wallet notifications driving the last step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LnurlEvent {
    /// Status change of a wallet payment request. `key` is the payment hash
    /// of lightning requests.
    RequestStatus {
        wallet_id: String,
        key: String,
        status: RequestStatus,
        timestamp: DateTime<Utc>,
    },

    PayRequestIssued {
        username: String,
        max_sendable_msat: u64,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    PayRequestRejected {
        reason: String,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    CallbackRejected {
        error_code: String,
        reason: String,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    InvoiceCreated {
        payment_hash: String,
        amount_msat: u64,
        is_zap: bool,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    ZapReceiptPublished {
        payment_hash: String,
        event_id: String,
        accepted_relays: usize,
        rejected_relays: usize,
        timestamp: DateTime<Utc>,
    },
    ZapReceiptSkipped {
        payment_hash: String,
        timestamp: DateTime<Utc>,
    },
    ZapReceiptFailed {
        payment_hash: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    ServerStarted {
        wallet_id: String,
        address: String,
        timestamp: DateTime<Utc>,
    },
    ServerStopped {
        wallet_id: String,
        timestamp: DateTime<Utc>,
    },

    AuthenticationAttempt {
        endpoint: String,
        success: bool,
        reason: Option<String>,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl LnurlEvent {
    /// Generate a unique event ID
    pub fn event_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LnurlEvent::RequestStatus { timestamp, .. }
            | LnurlEvent::PayRequestIssued { timestamp, .. }
            | LnurlEvent::PayRequestRejected { timestamp, .. }
            | LnurlEvent::CallbackRejected { timestamp, .. }
            | LnurlEvent::InvoiceCreated { timestamp, .. }
            | LnurlEvent::ZapReceiptPublished { timestamp, .. }
            | LnurlEvent::ZapReceiptSkipped { timestamp, .. }
            | LnurlEvent::ZapReceiptFailed { timestamp, .. }
            | LnurlEvent::ServerStarted { timestamp, .. }
            | LnurlEvent::ServerStopped { timestamp, .. }
            | LnurlEvent::AuthenticationAttempt { timestamp, .. } => *timestamp,
        }
    }

    pub fn correlation_id(&self) -> Option<&String> {
        match self {
            LnurlEvent::PayRequestIssued { correlation_id, .. }
            | LnurlEvent::PayRequestRejected { correlation_id, .. }
            | LnurlEvent::CallbackRejected { correlation_id, .. }
            | LnurlEvent::InvoiceCreated { correlation_id, .. }
            | LnurlEvent::AuthenticationAttempt { correlation_id, .. } => correlation_id.as_ref(),
            LnurlEvent::RequestStatus { .. }
            | LnurlEvent::ZapReceiptPublished { .. }
            | LnurlEvent::ZapReceiptSkipped { .. }
            | LnurlEvent::ZapReceiptFailed { .. }
            | LnurlEvent::ServerStarted { .. }
            | LnurlEvent::ServerStopped { .. } => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            LnurlEvent::RequestStatus { .. } => "request_status",
            LnurlEvent::PayRequestIssued { .. } => "pay_request_issued",
            LnurlEvent::PayRequestRejected { .. } => "pay_request_rejected",
            LnurlEvent::CallbackRejected { .. } => "callback_rejected",
            LnurlEvent::InvoiceCreated { .. } => "invoice_created",
            LnurlEvent::ZapReceiptPublished { .. } => "zap_receipt_published",
            LnurlEvent::ZapReceiptSkipped { .. } => "zap_receipt_skipped",
            LnurlEvent::ZapReceiptFailed { .. } => "zap_receipt_failed",
            LnurlEvent::ServerStarted { .. } => "server_started",
            LnurlEvent::ServerStopped { .. } => "server_stopped",
            LnurlEvent::AuthenticationAttempt { .. } => "authentication_attempt",
        }
    }
}

/// Trait for handling events asynchronously
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: LnurlEvent) -> anyhow::Result<()>;

    /// Unique among the handlers registered on one bus.
    fn name(&self) -> &str;

    /// Critical handlers are awaited by `publish`; the rest are spawned.
    fn is_critical(&self) -> bool {
        false
    }
}

/// Event bus for distributing events to multiple handlers
pub struct EventBus {
    sender: broadcast::Sender<LnurlEvent>,
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    max_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("max_capacity", &self.max_capacity)
            .field(
                "handlers_count",
                &self.handlers.try_read().map(|h| h.len()).unwrap_or(0),
            )
            .finish()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            handlers: Arc::new(RwLock::new(Vec::new())),
            max_capacity: capacity,
        }
    }

    /// Register an event handler, replacing any handler with the same name.
    pub async fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        let handler_name = handler.name().to_string();
        handlers.retain(|h| h.name() != handler_name);
        handlers.push(handler);
        info!(
            handler_name = %handler_name,
            total_handlers = handlers.len(),
            "Event handler registered"
        );
    }

    /// Remove the handler registered under `name`. Returns whether one was
    /// registered.
    pub async fn unregister_handler(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|h| h.name() != name);
        let removed = handlers.len() != before;
        if removed {
            info!(
                handler_name = %name,
                total_handlers = handlers.len(),
                "Event handler unregistered"
            );
        }
        removed
    }

    /// Publish an event to all registered handlers
    pub async fn publish(&self, event: LnurlEvent) -> anyhow::Result<()> {
        let event_id = event.event_id();
        let event_type = event.event_type();

        debug!(
            event_id = %event_id,
            event_type = %event_type,
            correlation_id = ?event.correlation_id(),
            timestamp = %event.timestamp(),
            "Publishing event"
        );

        // No subscribers is not an error
        let _ = self.sender.send(event.clone());

        // Snapshot so a handler may unregister itself without deadlocking.
        let handlers: Vec<Arc<dyn EventHandler>> = self.handlers.read().await.clone();
        if handlers.is_empty() {
            debug!(event_type = %event_type, "No event handlers registered");
            return Ok(());
        }

        let mut critical = Vec::new();
        for handler in handlers {
            let event = event.clone();
            let event_id = event_id.clone();
            let is_critical = handler.is_critical();

            let run = async move {
                if let Err(e) = handler.handle(event).await {
                    error!(
                        event_id = %event_id,
                        handler_name = %handler.name(),
                        error = ?e,
                        "Event handler failed"
                    );
                }
            };

            if is_critical {
                critical.push(run);
            } else {
                tokio::spawn(run);
            }
        }

        for future in critical {
            future.await;
        }

        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LnurlEvent> {
        self.sender.subscribe()
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    pub async fn has_handler(&self, name: &str) -> bool {
        self.handlers.read().await.iter().any(|h| h.name() == name)
    }

    pub async fn stats(&self) -> EventBusStats {
        let handlers = self.handlers.read().await;
        EventBusStats {
            capacity: self.max_capacity,
            handler_count: handlers.len(),
            critical_handler_count: handlers.iter().filter(|h| h.is_critical()).count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventBusStats {
    pub capacity: usize,
    pub handler_count: usize,
    pub critical_handler_count: usize,
}
