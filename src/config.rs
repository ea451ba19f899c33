use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bitcoin::bip32::Xpriv;
use bitcoin::Network;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::util::{normalize_domain, normalize_relay_urls};

pub const CONFIG_FILE_NAME: &str = "lnurld.conf";

/// Configuration structure
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind IP address
    #[serde(rename = "http-bind-ip", default = "default_bind_ip")]
    pub http_bind_ip: String,

    /// HTTP server bind port
    #[serde(rename = "http-bind-port", default = "default_bind_port")]
    pub http_bind_port: u16,

    /// Public domain the callback URLs are built on, e.g. `pay.example.com`
    pub domain: Option<String>,

    /// Where invoices are requested from. Defaults to our own
    /// `/api/add_request`.
    #[serde(rename = "add-request-endpoint")]
    pub add_request_endpoint: Option<String>,

    /// Relays receipts go to when the zap request names none
    #[serde(rename = "nostr-relays", default = "default_relays")]
    pub nostr_relays: Vec<String>,

    /// HTTP Basic Auth password for `/api/add_request`.
    /// When None, authentication is disabled
    #[serde(rename = "http-password")]
    pub http_password: Option<String>,

    /// Delay between checks while waiting for the wallet at startup
    #[serde(rename = "startup-retry-secs", default = "default_startup_retry_secs")]
    pub startup_retry_secs: u64,

    /// Timeout for relay connections and add-request calls
    #[serde(rename = "relay-timeout-secs", default = "default_relay_timeout_secs")]
    pub relay_timeout_secs: u64,

    #[serde(default)]
    pub wallet: WalletConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_bind_ip", &self.http_bind_ip)
            .field("http_bind_port", &self.http_bind_port)
            .field("domain", &self.domain)
            .field("add_request_endpoint", &self.add_request_endpoint)
            .field("nostr_relays", &self.nostr_relays)
            .field(
                "http_password",
                &self.http_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("startup_retry_secs", &self.startup_retry_secs)
            .field("relay_timeout_secs", &self.relay_timeout_secs)
            .field("wallet", &self.wallet)
            .finish()
    }
}

/// Settings of the bundled in-memory wallet.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct WalletConfig {
    #[serde(default = "default_wallet_id")]
    pub id: String,

    /// BIP-32 master key of the node; generated on first run
    #[serde(rename = "lightning-xprv")]
    pub lightning_xprv: Option<String>,

    /// Inbound liquidity the wallet starts with
    #[serde(rename = "can-receive-sat", default = "default_can_receive_sat")]
    pub can_receive_sat: u64,
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("id", &self.id)
            .field(
                "lightning_xprv",
                &self.lightning_xprv.as_ref().map(|_| "[REDACTED]"),
            )
            .field("can_receive_sat", &self.can_receive_sat)
            .finish()
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            id: default_wallet_id(),
            lightning_xprv: None,
            can_receive_sat: default_can_receive_sat(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind_ip: default_bind_ip(),
            http_bind_port: default_bind_port(),
            domain: None,
            add_request_endpoint: None,
            nostr_relays: default_relays(),
            http_password: None,
            startup_retry_secs: default_startup_retry_secs(),
            relay_timeout_secs: default_relay_timeout_secs(),
            wallet: WalletConfig::default(),
        }
    }
}

/// What `load_or_create` had to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generated {
    pub password: bool,
    pub lightning_xprv: bool,
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to TOML file atomically
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists (important for Docker volumes)
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;

        // The config holds the wallet key, so never leave it half written
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, contents)?;

        match std::fs::rename(&temp_path, path) {
            Ok(_) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e.into())
            }
        }
    }

    /// Load the configuration, creating it on first run with a generated
    /// API password and wallet key.
    ///
    /// Unlike a missing file, an unreadable one is an error: it may hold the
    /// only copy of the wallet key.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, Generated)> {
        let path = path.as_ref();
        let mut generated = Generated::default();

        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        if config.http_password.is_none() {
            config.http_password = Some(Self::generate_password());
            generated.password = true;
        }
        if config.wallet.lightning_xprv.is_none() {
            config.wallet.lightning_xprv = Some(Self::generate_xprv()?);
            generated.lightning_xprv = true;
        }

        if !path.exists() || generated != Generated::default() {
            config.save_to_file(path)?;
        }

        Ok((config, generated))
    }

    /// Get the complete HTTP server address
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.http_bind_ip, self.http_bind_port)
    }

    /// The normalized public domain; startup fails without a usable one.
    pub fn public_domain(&self) -> Result<String, AppError> {
        let domain = normalize_domain(self.domain.as_deref())?;
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(AppError::invalid_config(format!(
                "invalid domain {:?}",
                self.domain.as_deref().unwrap_or_default()
            )));
        }
        Ok(domain)
    }

    /// The configured add-request endpoint, or our own on `bound_port`.
    pub fn add_request_url(&self, bound_port: u16) -> String {
        self.add_request_endpoint
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/api/add_request", bound_port))
    }

    pub fn fallback_relays(&self) -> Vec<String> {
        normalize_relay_urls(&self.nostr_relays)
    }

    pub fn startup_retry(&self) -> Duration {
        Duration::from_secs(self.startup_retry_secs.max(1))
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs.max(1))
    }

    /// Check if authentication is enabled
    pub fn is_auth_enabled(&self) -> bool {
        self.http_password.is_some()
    }

    /// Generate a secure random 32-byte hex password
    pub fn generate_password() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub fn generate_xprv() -> Result<String> {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Ok(Xpriv::new_master(Network::Bitcoin, &seed)?.to_string())
    }
}

fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    42321
}

fn default_relays() -> Vec<String> {
    [
        "wss://relay.damus.io",
        "wss://nos.lol",
        "wss://relay.primal.net",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_startup_retry_secs() -> u64 {
    10
}

fn default_relay_timeout_secs() -> u64 {
    10
}

fn default_wallet_id() -> String {
    "default".to_string()
}

fn default_can_receive_sat() -> u64 {
    1_000_000
}
