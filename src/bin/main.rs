use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::{style, Term};
use lnurld::config::{Config, CONFIG_FILE_NAME};
use lnurld::events::handlers::{LoggingEventHandler, MetricsEventHandler};
use lnurld::events::EventBus;
use lnurld::metrics::init_prometheus_metrics;
use lnurld::observability::{init_logging, LoggingConfig};
use lnurld::registry::ServerRegistry;
use lnurld::server::LnurlServer;
use lnurld::wallet::{MemoryWallet, Wallet};
use tracing::info;

const EVENT_BUS_CAPACITY: usize = 1000;

#[derive(Parser)]
#[clap(version, about)]
struct Cli {
    /// Data directory path (contains config and logs)
    #[clap(long, env = "LNURLD_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Public domain callback URLs are built on (overrides config)
    #[clap(long, env = "LNURLD_DOMAIN")]
    domain: Option<String>,

    /// Server address as ip:port (overrides config)
    #[clap(long, env = "LNURLD_ADDR")]
    addr: Option<String>,

    /// Password for /api/add_request (overrides config)
    #[clap(long, env = "LNURLD_PASSWORD")]
    password: Option<String>,

    /// Disable authentication of /api/add_request
    #[clap(long)]
    no_auth: bool,

    /// Comma separated fallback relays (overrides config)
    #[clap(long, env = "LNURLD_RELAYS", use_value_delimiter = true)]
    relays: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli: Cli = Cli::parse();

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("failed to create {}", cli.data_dir.display()))?;

    init_logging(LoggingConfig::from_env(&cli.data_dir))?;
    info!("Starting lnurld");

    let config_path = cli.data_dir.join(CONFIG_FILE_NAME);
    let term = Term::stdout();
    let (mut config, generated) = Config::load_or_create(&config_path)?;

    if generated.password {
        term.write_line(&format!(
            "{}{}",
            style("Generating default api password...").yellow(),
            style("done").white()
        ))?;
    }
    if generated.lightning_xprv {
        term.write_line(&format!(
            "{}{} {}",
            style("Generating wallet key...").yellow(),
            style("done").white(),
            style(format!("(back up {})", config_path.display())).dim()
        ))?;
    }

    if let Some(domain) = cli.domain {
        config.domain = Some(domain);
    }
    if let Some(password) = cli.password {
        config.http_password = Some(password);
    }
    if let Some(addr) = cli.addr {
        let (ip, port) = addr
            .rsplit_once(':')
            .with_context(|| format!("invalid address {addr}, expected ip:port"))?;
        config.http_bind_ip = ip.to_string();
        config.http_bind_port = port
            .parse()
            .with_context(|| format!("invalid port in {addr}"))?;
    }
    if !cli.relays.is_empty() {
        config.nostr_relays = cli.relays;
    }
    if cli.no_auth {
        config.http_password = None;
    }

    // Fail before touching the wallet
    let domain = config
        .public_domain()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e.message))?;
    info!(
        domain = %domain,
        address = %config.http_address(),
        auth_enabled = config.is_auth_enabled(),
        "Configuration loaded"
    );

    let metrics_handle = init_prometheus_metrics()?;

    let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
    event_bus
        .register_handler(Arc::new(LoggingEventHandler::new(false)))
        .await;
    event_bus
        .register_handler(Arc::new(MetricsEventHandler::new("lnurld")))
        .await;

    let lightning_xprv = config
        .wallet
        .lightning_xprv
        .clone()
        .context("wallet key missing from configuration")?;
    let wallet = Arc::new(MemoryWallet::new(
        config.wallet.id.clone(),
        lightning_xprv,
        config.wallet.can_receive_sat,
        event_bus.clone(),
    )?);

    let registry = ServerRegistry::new(Box::new({
        let config = config.clone();
        let event_bus = event_bus.clone();
        move |wallet| {
            Ok(LnurlServer::new(config.clone(), wallet, event_bus.clone())?
                .with_metrics(metrics_handle.clone()))
        }
    }));

    registry.on_wallet_loaded(wallet.clone())?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    registry.on_wallet_closed(wallet.id()).await?;
    Ok(())
}
