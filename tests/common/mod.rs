#![allow(clippy::unwrap_used, dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::bip32::Xpriv;
use bitcoin::Network;
use lnurld::config::Config;
use lnurld::events::{EventBus, LnurlEvent};
use lnurld::invoice::{AddRequest, AddRequestResponse, HttpInvoiceService, InvoiceService};
use lnurld::nostr::{BroadcastReport, RelayPublisher};
use lnurld::server::LnurlServer;
use lnurld::wallet::MemoryWallet;
use nostr_sdk::Event;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "test_password";
pub const DOMAIN: &str = "pay.example.com";
pub const FALLBACK_RELAY: &str = "wss://fallback.example";

/// Accepts every event on every relay and remembers what it was given.
#[derive(Default)]
pub struct RecordingRelay {
    pub broadcasts: Mutex<Vec<(Vec<String>, Event)>>,
}

#[async_trait]
impl RelayPublisher for RecordingRelay {
    async fn broadcast(&self, relays: &[String], event: &Event) -> anyhow::Result<BroadcastReport> {
        self.broadcasts
            .lock()
            .unwrap()
            .push((relays.to_vec(), event.clone()));
        Ok(BroadcastReport {
            accepted: relays.to_vec(),
            rejected: vec![],
        })
    }
}

impl RecordingRelay {
    pub fn count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }
}

/// The real HTTP invoice service, counting calls.
pub struct CountingInvoices {
    inner: HttpInvoiceService,
    pub calls: AtomicUsize,
}

#[async_trait]
impl InvoiceService for CountingInvoices {
    async fn create_invoice(&self, request: AddRequest) -> anyhow::Result<AddRequestResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_invoice(request).await
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub server: Arc<LnurlServer>,
    pub wallet: Arc<MemoryWallet>,
    pub relay: Arc<RecordingRelay>,
    pub invoices: Arc<CountingInvoices>,
    pub event_bus: Arc<EventBus>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn invoice_calls(&self) -> usize {
        self.invoices.calls.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.server.shutdown();
        self.task.await.unwrap().unwrap();
    }
}

pub fn test_wallet(id: &str, can_receive_sat: u64, event_bus: &Arc<EventBus>) -> Arc<MemoryWallet> {
    let xprv = Xpriv::new_master(Network::Bitcoin, &[42u8; 32])
        .unwrap()
        .to_string();
    Arc::new(MemoryWallet::new(id, xprv, can_receive_sat, event_bus.clone()).unwrap())
}

/// Serve on an ephemeral port, with the add-request endpoint pointing back at
/// the server itself.
pub async fn spawn_server(can_receive_sat: u64) -> TestServer {
    let event_bus = Arc::new(EventBus::new(256));
    let wallet = test_wallet("test-wallet", can_receive_sat, &event_bus);
    let relay = Arc::new(RecordingRelay::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        domain: Some(format!("https://{DOMAIN}/")),
        http_bind_ip: addr.ip().to_string(),
        http_bind_port: addr.port(),
        http_password: Some(PASSWORD.to_string()),
        nostr_relays: vec![FALLBACK_RELAY.to_string()],
        relay_timeout_secs: 5,
        ..Default::default()
    };

    let invoices = Arc::new(CountingInvoices {
        inner: HttpInvoiceService::new(
            format!("http://{addr}/api/add_request"),
            Some(PASSWORD.to_string()),
            Duration::from_secs(5),
        )
        .unwrap(),
        calls: AtomicUsize::new(0),
    });

    let server = Arc::new(
        LnurlServer::new(config, wallet.clone(), event_bus.clone())
            .unwrap()
            .with_relay_publisher(relay.clone())
            .with_invoice_service(invoices.clone()),
    );

    let task = tokio::spawn({
        let server = server.clone();
        async move { server.serve(listener).await }
    });

    TestServer {
        addr,
        server,
        wallet,
        relay,
        invoices,
        event_bus,
        task,
    }
}

/// Wait for the first event matching `pred`.
pub async fn next_event<F>(receiver: &mut broadcast::Receiver<LnurlEvent>, pred: F) -> LnurlEvent
where
    F: Fn(&LnurlEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = receiver.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
