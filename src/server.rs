//! One LNURL server bound to one wallet.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::BasicAuth;
use crate::config::Config;
use crate::events::handlers::ZapReceiptHandler;
use crate::events::{EventBus, LnurlEvent};
use crate::invoice::{HttpInvoiceService, InvoiceService};
use crate::lnurl::LnurlService;
use crate::nostr::{derive_signing_keys, NostrRelayPublisher, RelayPublisher, ZapReceiptPublisher};
use crate::router::build_router;
use crate::state::AppState;
use crate::wallet::Wallet;

pub struct LnurlServer {
    config: Config,
    domain: String,
    wallet: Arc<dyn Wallet>,
    event_bus: Arc<EventBus>,
    relay: Arc<dyn RelayPublisher>,
    invoices: Option<Arc<dyn InvoiceService>>,
    metrics_handle: Option<PrometheusHandle>,
    shutdown: watch::Sender<bool>,
}

impl LnurlServer {
    /// Fails when the configured domain is missing or invalid.
    pub fn new(config: Config, wallet: Arc<dyn Wallet>, event_bus: Arc<EventBus>) -> Result<Self> {
        let domain = config
            .public_domain()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e.message))?;
        let relay = Arc::new(NostrRelayPublisher::new(config.relay_timeout()));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            domain,
            wallet,
            event_bus,
            relay,
            invoices: None,
            metrics_handle: None,
            shutdown,
        })
    }

    pub fn with_relay_publisher(mut self, relay: Arc<dyn RelayPublisher>) -> Self {
        self.relay = relay;
        self
    }

    /// Use `invoices` instead of calling the add-request endpoint over HTTP.
    pub fn with_invoice_service(mut self, invoices: Arc<dyn InvoiceService>) -> Self {
        self.invoices = Some(invoices);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn wallet_id(&self) -> &str {
        self.wallet.id()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Ask a running or starting server to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the wallet, bind the configured address and serve until
    /// [`LnurlServer::shutdown`].
    pub async fn run(&self) -> Result<()> {
        if !self.wait_for_wallet().await {
            info!(wallet_id = %self.wallet_id(), "Shutdown requested before wallet was ready");
            return Ok(());
        }

        let addr = self.config.http_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        self.serve(listener).await
    }

    /// Block until the wallet is unlocked and has lightning, checking every
    /// `startup-retry-secs`. Returns false when shut down while waiting.
    pub async fn wait_for_wallet(&self) -> bool {
        let mut shutdown = self.shutdown.subscribe();
        let retry = self.config.startup_retry();

        loop {
            if *shutdown.borrow() {
                return false;
            }

            let locked = self.wallet.is_locked().await;
            let lightning = self.wallet.has_lightning().await;
            if !locked && lightning {
                return true;
            }

            info!(
                wallet_id = %self.wallet_id(),
                locked,
                lightning,
                retry_secs = retry.as_secs(),
                "Waiting for wallet before starting LNURL server"
            );

            tokio::select! {
                _ = tokio::time::sleep(retry) => {}
                _ = shutdown.wait_for(|stop| *stop) => return false,
            }
        }
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        let wallet_id = self.wallet_id().to_string();

        let xprv = self.wallet.lightning_xprv().await?;
        let keys = derive_signing_keys(&xprv)?;
        let receipts = Arc::new(ZapReceiptPublisher::new(
            keys,
            self.config.fallback_relays(),
            self.relay.clone(),
        ));

        let invoices: Arc<dyn InvoiceService> = match &self.invoices {
            Some(invoices) => invoices.clone(),
            None => Arc::new(HttpInvoiceService::new(
                self.config.add_request_url(local_addr.port()),
                self.config.http_password.clone(),
                self.config.relay_timeout(),
            )?),
        };

        let service = Arc::new(LnurlService::new(
            self.domain.clone(),
            self.wallet.clone(),
            invoices,
            receipts.clone(),
            self.event_bus.clone(),
        ));

        let handler = ZapReceiptHandler::new(self.wallet.clone(), receipts, self.event_bus.clone());
        let handler_name = ZapReceiptHandler::handler_name(&wallet_id);
        self.event_bus.register_handler(Arc::new(handler)).await;

        let state = AppState::new(service, BasicAuth::new(self.config.http_password.clone()));
        let app = build_router(state, self.metrics_handle.clone());

        info!(
            wallet_id = %wallet_id,
            address = %local_addr,
            domain = %self.domain,
            auth_enabled = self.config.is_auth_enabled(),
            "LNURL server listening"
        );
        self.publish(LnurlEvent::ServerStarted {
            wallet_id: wallet_id.clone(),
            address: local_addr.to_string(),
            timestamp: Utc::now(),
        })
        .await;

        let mut shutdown = self.shutdown.subscribe();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await;

        self.event_bus.unregister_handler(&handler_name).await;
        self.publish(LnurlEvent::ServerStopped {
            wallet_id,
            timestamp: Utc::now(),
        })
        .await;

        result.context("LNURL server failed")
    }

    async fn publish(&self, event: LnurlEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            warn!(error = %e, "Failed to publish server event");
        }
    }
}
