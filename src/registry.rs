use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::server::LnurlServer;
use crate::wallet::Wallet;

/// Builds a server for a freshly loaded wallet.
pub type ServerFactory = Box<dyn Fn(Arc<dyn Wallet>) -> Result<LnurlServer> + Send + Sync>;

struct ActiveServer {
    server: Arc<LnurlServer>,
    task: JoinHandle<Result<()>>,
}

/// Owns the single LNURL server of the process.
///
/// The first wallet loaded gets the server; later wallets are ignored until
/// that wallet is closed.
pub struct ServerRegistry {
    factory: ServerFactory,
    active: Mutex<Option<ActiveServer>>,
}

impl ServerRegistry {
    pub fn new(factory: ServerFactory) -> Self {
        Self {
            factory,
            active: Mutex::new(None),
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveServer>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a server for `wallet` unless one is already running.
    /// Returns whether a server was started.
    pub fn on_wallet_loaded(&self, wallet: Arc<dyn Wallet>) -> Result<bool> {
        let mut active = self.lock_active();
        if let Some(current) = active.as_ref() {
            info!(
                wallet_id = %wallet.id(),
                active_wallet_id = %current.server.wallet_id(),
                "LNURL server already running for another wallet, ignoring"
            );
            return Ok(false);
        }

        let server = Arc::new((self.factory)(wallet)?);
        info!(wallet_id = %server.wallet_id(), "Starting LNURL server");

        let task = tokio::spawn({
            let server = server.clone();
            async move {
                let result = server.run().await;
                if let Err(e) = &result {
                    error!(wallet_id = %server.wallet_id(), error = ?e, "LNURL server exited with error");
                }
                result
            }
        });

        *active = Some(ActiveServer { server, task });
        Ok(true)
    }

    /// Stop the server if it belongs to `wallet_id` and wait for it to
    /// release its socket. Returns whether a server was stopped.
    pub async fn on_wallet_closed(&self, wallet_id: &str) -> Result<bool> {
        let stopped = {
            let mut active = self.lock_active();
            match active.as_ref() {
                Some(current) if current.server.wallet_id() == wallet_id => active.take(),
                _ => None,
            }
        };

        match stopped {
            Some(active) => {
                Self::stop(active).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop whatever server is running.
    pub async fn shutdown(&self) -> Result<()> {
        let stopped = self.lock_active().take();
        if let Some(active) = stopped {
            Self::stop(active).await?;
        }
        Ok(())
    }

    pub fn active_wallet_id(&self) -> Option<String> {
        self.lock_active()
            .as_ref()
            .map(|active| active.server.wallet_id().to_string())
    }

    async fn stop(active: ActiveServer) -> Result<()> {
        let wallet_id = active.server.wallet_id().to_string();
        active.server.shutdown();

        match active.task.await {
            Ok(Ok(())) => {
                info!(wallet_id = %wallet_id, "LNURL server stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(wallet_id = %wallet_id, error = ?e, "LNURL server stopped with error");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("LNURL server task failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::bip32::Xpriv;
    use bitcoin::Network;

    use super::*;
    use crate::config::Config;
    use crate::events::EventBus;
    use crate::wallet::MemoryWallet;

    fn wallet(id: &str, event_bus: &Arc<EventBus>) -> Arc<MemoryWallet> {
        let xprv = Xpriv::new_master(Network::Bitcoin, &[9u8; 32])
            .unwrap()
            .to_string();
        Arc::new(MemoryWallet::new(id, xprv, 1000, event_bus.clone()).unwrap())
    }

    fn registry(event_bus: Arc<EventBus>) -> ServerRegistry {
        let config = Config {
            domain: Some("pay.example.com".to_string()),
            http_bind_ip: "127.0.0.1".to_string(),
            http_bind_port: 0,
            startup_retry_secs: 1,
            ..Default::default()
        };
        ServerRegistry::new(Box::new(move |wallet| {
            LnurlServer::new(config.clone(), wallet, event_bus.clone())
        }))
    }

    #[tokio::test]
    async fn test_first_wallet_wins() {
        let event_bus = Arc::new(EventBus::new(16));
        let registry = registry(event_bus.clone());
        let first = wallet("first", &event_bus);
        first.set_locked(true);

        assert!(registry.on_wallet_loaded(first).unwrap());
        assert!(!registry
            .on_wallet_loaded(wallet("second", &event_bus))
            .unwrap());
        assert_eq!(registry.active_wallet_id().as_deref(), Some("first"));

        assert!(!registry.on_wallet_closed("second").await.unwrap());
        assert!(registry.on_wallet_closed("first").await.unwrap());
        assert_eq!(registry.active_wallet_id(), None);

        assert!(registry
            .on_wallet_loaded(wallet("second", &event_bus))
            .unwrap());
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closing_running_server_deregisters_handler() {
        let event_bus = Arc::new(EventBus::new(16));
        let registry = registry(event_bus.clone());

        assert!(registry
            .on_wallet_loaded(wallet("w1", &event_bus))
            .unwrap());
        for _ in 0..100 {
            if event_bus.has_handler("zap_receipts:w1").await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(event_bus.has_handler("zap_receipts:w1").await);

        assert!(registry.on_wallet_closed("w1").await.unwrap());
        assert!(!event_bus.has_handler("zap_receipts:w1").await);
    }

    #[test]
    fn test_missing_domain_is_fatal() {
        let event_bus = Arc::new(EventBus::new(16));
        let result = LnurlServer::new(Config::default(), wallet("w1", &event_bus), event_bus);
        assert!(result.is_err());
    }
}
