// Library exports for the binary and the integration tests
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod invoice;
pub mod lnurl;
pub mod metrics;
pub mod nostr;
pub mod observability;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;
pub mod types;
pub mod util;
pub mod wallet;
