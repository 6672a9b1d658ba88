//! Integration tests for the RGW service broker.
//!
//! These tests require a running RGW reachable through the same environment
//! variables the broker reads (`RGW_ENDPOINT`, `RGW_ACCESS_KEY`,
//! `RGW_SECRET`, ...). The master credentials must carry admin caps for
//! users, buckets and metadata. Tests are marked `#[ignore]` so they don't
//! run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p rgw-broker-integration -- --ignored
//! ```

use std::sync::Once;

use rgw_broker_client::{AdminClient, Endpoint, S3Client, SignedTransport};
use rgw_broker_core::{BrokerConfig, TenantLifecycleManager};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Broker configuration from the environment, with a per-run data bucket.
#[must_use]
pub fn config() -> BrokerConfig {
    init_tracing();
    let mut config = BrokerConfig::from_env();
    config
        .validate()
        .unwrap_or_else(|e| panic!("integration environment incomplete: {e}"));
    if std::env::var("RGW_DATA_BUCKET").is_err() {
        config.data_bucket = unique_name("broker-data");
    }
    config
}

/// A bootstrapped lifecycle manager.
pub async fn manager() -> TenantLifecycleManager {
    let manager = TenantLifecycleManager::connect(&config()).expect("connect");
    manager.bootstrap().await.expect("bootstrap");
    manager
}

fn transport(config: &BrokerConfig) -> SignedTransport {
    let endpoint = Endpoint::parse(&config.endpoint).expect("endpoint");
    SignedTransport::new(endpoint, config.region.clone(), config.request_timeout())
        .expect("transport")
}

/// Admin client with the master credentials.
#[must_use]
pub fn admin_client() -> AdminClient {
    let config = config();
    AdminClient::new(transport(&config), config.credentials()).with_key_policy(config.key_policy())
}

/// S3 client with the master credentials.
#[must_use]
pub fn s3_client() -> S3Client {
    let config = config();
    S3Client::new(transport(&config), config.credentials())
}

/// Generate a unique, bucket-safe name for a test.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

mod test_admin;
mod test_lifecycle;
mod test_objects;
