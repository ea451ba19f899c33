use lnurld::config::Config;
use lnurld::error::ErrorCategory;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.http_bind_ip, "0.0.0.0");
    assert_eq!(config.http_bind_port, 42321);
    assert_eq!(config.http_address(), "0.0.0.0:42321");
    assert!(config.domain.is_none());
    assert!(config.http_password.is_none());
    assert!(!config.is_auth_enabled());
    assert_eq!(config.startup_retry().as_secs(), 10);
    assert_eq!(config.wallet.id, "default");
}

#[test]
fn test_default_relays() {
    let config = Config::default();
    assert_eq!(
        config.fallback_relays(),
        vec![
            "wss://relay.damus.io".to_string(),
            "wss://nos.lol".to_string(),
            "wss://relay.primal.net".to_string(),
        ]
    );
}

#[test]
fn test_add_request_url() {
    let mut config = Config::default();
    assert_eq!(
        config.add_request_url(4000),
        "http://localhost:4000/api/add_request"
    );

    config.add_request_endpoint = Some("https://wallet.internal/api/add_request".to_string());
    assert_eq!(
        config.add_request_url(4000),
        "https://wallet.internal/api/add_request"
    );
}

#[test]
fn test_public_domain() {
    let mut config = Config::default();
    assert_eq!(
        config.public_domain().unwrap_err().category,
        ErrorCategory::InvalidConfig
    );

    config.domain = Some("https://www.pay.example.com/".to_string());
    assert_eq!(config.public_domain().unwrap(), "pay.example.com");

    config.domain = Some("https:// ".to_string());
    assert!(config.public_domain().is_err());
}

#[test]
fn test_config_save_load() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("lnurld.conf");

    let mut original_config = Config::default();
    original_config.http_password = Some("testpass".to_string());
    original_config.http_bind_port = 8080;
    original_config.domain = Some("pay.example.com".to_string());
    original_config.nostr_relays = vec!["wss://relay.example.com".to_string()];

    original_config.save_to_file(&config_path).unwrap();
    let loaded_config = Config::load_from_file(&config_path).unwrap();

    assert_eq!(loaded_config, original_config);

    let contents = std::fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("http-bind-port = 8080"));
    assert!(contents.contains("[wallet]"));
}

#[test]
fn test_generate_password() {
    let password1 = Config::generate_password();
    let password2 = Config::generate_password();

    assert_ne!(password1, password2);
    assert_eq!(password1.len(), 64);
    assert!(password1.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_load_or_create_new_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("lnurld.conf");
    assert!(!config_path.exists());

    let (config, generated) = Config::load_or_create(&config_path).unwrap();

    assert!(config_path.exists());
    assert!(generated.password);
    assert!(generated.lightning_xprv);

    let password = config.http_password.clone().unwrap();
    assert_eq!(password.len(), 64);
    let xprv = config.wallet.lightning_xprv.clone().unwrap();
    assert!(xprv.starts_with("xprv"));

    let file_contents = std::fs::read_to_string(&config_path).unwrap();
    assert!(file_contents.contains(&format!("http-password = \"{}\"", password)));
    assert!(file_contents.contains(&format!("lightning-xprv = \"{}\"", xprv)));

    // a second load keeps what was generated
    let (reloaded, generated) = Config::load_or_create(&config_path).unwrap();
    assert!(!generated.password);
    assert!(!generated.lightning_xprv);
    assert_eq!(reloaded, config);
}

#[test]
fn test_load_or_create_fills_missing_password() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("lnurld.conf");
    std::fs::write(
        &config_path,
        "domain = \"pay.example.com\"\n\n[wallet]\nid = \"main\"\n",
    )
    .unwrap();

    let (config, generated) = Config::load_or_create(&config_path).unwrap();

    assert!(generated.password);
    assert!(generated.lightning_xprv);
    assert_eq!(config.domain.as_deref(), Some("pay.example.com"));
    assert_eq!(config.wallet.id, "main");
    assert_eq!(config.wallet.can_receive_sat, 1_000_000);
}

#[test]
fn test_corrupted_config_is_an_error() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("lnurld.conf");
    std::fs::write(&config_path, "http-bind-port = \"not a port\"").unwrap();

    assert!(Config::load_or_create(&config_path).is_err());
    // left untouched
    assert_eq!(
        std::fs::read_to_string(&config_path).unwrap(),
        "http-bind-port = \"not a port\""
    );
}

#[test]
fn test_secrets_are_redacted_in_debug() {
    let dir = tempdir().unwrap();
    let (config, _) = Config::load_or_create(dir.path().join("lnurld.conf")).unwrap();
    let xprv = config.wallet.lightning_xprv.clone().unwrap();
    let password = config.http_password.clone().unwrap();

    let debug = format!("{:?}", config);
    assert!(!debug.contains(&xprv));
    assert!(!debug.contains(&password));
    assert_eq!(debug.matches("[REDACTED]").count(), 2);
}
