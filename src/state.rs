use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::BasicAuth;
use crate::events::EventBus;
use crate::lnurl::LnurlService;
use crate::wallet::Wallet;

/// Shared by every handler of one running server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LnurlService>,
    pub auth: Arc<BasicAuth>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<LnurlService>, auth: BasicAuth) -> Self {
        Self {
            service,
            auth: Arc::new(auth),
            start_time: Instant::now(),
        }
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        self.service.wallet()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        self.service.event_bus()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
