//! Broker configuration.
//!
//! Provides [`BrokerConfig`], loaded from environment variables via
//! [`BrokerConfig::from_env`] and checked with [`BrokerConfig::validate`].

use std::fmt;
use std::time::Duration;

use rgw_broker_auth::Credentials;
use rgw_broker_client::KeyPolicy;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::BrokerError;

/// GC identity provisioned at startup when none is configured.
pub const DEFAULT_GC_USER: &str = "rgw-kube-gc-user";

/// Broker configuration.
///
/// # Examples
///
/// ```
/// use rgw_broker_core::config::BrokerConfig;
///
/// let config = BrokerConfig::builder()
///     .endpoint("rgw.local:7480")
///     .access_key("admin")
///     .secret("secret")
///     .build();
/// assert_eq!(config.uid_prefix, "kube-rgw.");
/// assert_eq!(config.gc_user(), "rgw-kube-gc-user");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Backend URL. A missing scheme means plain HTTP.
    #[builder(setter(into))]
    pub endpoint: String,

    /// Master admin access key.
    #[builder(setter(into))]
    pub access_key: String,

    /// Master admin secret.
    #[serde(skip_serializing, default)]
    #[builder(setter(into))]
    pub secret: String,

    /// Prefix of tenant user ids.
    #[builder(default = String::from("kube-rgw."), setter(into))]
    pub uid_prefix: String,

    /// Externally managed GC user. `None` means [`DEFAULT_GC_USER`] is
    /// provisioned at startup.
    #[builder(default, setter(strip_option, into))]
    pub gc_user: Option<String>,

    /// Bucket holding the broker's own records.
    #[builder(default = String::from("kube-rgw-data"), setter(into))]
    pub data_bucket: String,

    /// SigV4 region.
    #[builder(default = String::from("us-east-1"), setter(into))]
    pub region: String,

    /// Per-request timeout in seconds.
    #[builder(default = 30)]
    pub request_timeout_secs: u64,

    /// Length of locally generated access keys.
    #[builder(default = 20)]
    pub access_key_length: usize,

    /// Conditional key-create attempts before giving up.
    #[builder(default = 3)]
    pub key_mint_attempts: u32,

    /// Bind address of the HTTP surface.
    #[builder(default = String::from("0.0.0.0:8080"), setter(into))]
    pub listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"), setter(into))]
    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret: String::new(),
            uid_prefix: String::from("kube-rgw."),
            gc_user: None,
            data_bucket: String::from("kube-rgw-data"),
            region: String::from("us-east-1"),
            request_timeout_secs: 30,
            access_key_length: 20,
            key_mint_attempts: 3,
            listen: String::from("0.0.0.0:8080"),
            log_level: String::from("info"),
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret", &"...")
            .field("uid_prefix", &self.uid_prefix)
            .field("gc_user", &self.gc_user)
            .field("data_bucket", &self.data_bucket)
            .field("region", &self.region)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("access_key_length", &self.access_key_length)
            .field("key_mint_attempts", &self.key_mint_attempts)
            .field("listen", &self.listen)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RGW_ENDPOINT` | *(required)* |
    /// | `RGW_ACCESS_KEY` | *(required)* |
    /// | `RGW_SECRET` | *(required)* |
    /// | `RGW_UID_PREFIX` | `kube-rgw.` |
    /// | `RGW_GC_USER` | *(unset)* |
    /// | `RGW_DATA_BUCKET` | `kube-rgw-data` |
    /// | `RGW_REGION` | `us-east-1` |
    /// | `RGW_REQUEST_TIMEOUT_SECS` | `30` |
    /// | `RGW_ACCESS_KEY_LENGTH` | `20` |
    /// | `RGW_KEY_MINT_ATTEMPTS` | `3` |
    /// | `BROKER_LISTEN` | `0.0.0.0:8080` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Required values that are missing are left empty; call
    /// [`validate`](Self::validate) before use.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("RGW_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = lookup("RGW_ACCESS_KEY") {
            config.access_key = v;
        }
        if let Some(v) = lookup("RGW_SECRET") {
            config.secret = v;
        }
        if let Some(v) = lookup("RGW_UID_PREFIX") {
            config.uid_prefix = v;
        }
        if let Some(v) = lookup("RGW_GC_USER") {
            if !v.is_empty() {
                config.gc_user = Some(v);
            }
        }
        if let Some(v) = lookup("RGW_DATA_BUCKET") {
            config.data_bucket = v;
        }
        if let Some(v) = lookup("RGW_REGION") {
            config.region = v;
        }
        if let Some(v) = lookup("RGW_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                config.request_timeout_secs = n;
            }
        }
        if let Some(v) = lookup("RGW_ACCESS_KEY_LENGTH") {
            if let Ok(n) = v.parse::<usize>() {
                config.access_key_length = n;
            }
        }
        if let Some(v) = lookup("RGW_KEY_MINT_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                config.key_mint_attempts = n;
            }
        }
        if let Some(v) = lookup("BROKER_LISTEN") {
            config.listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Check that required values are present and limits are usable.
    pub fn validate(&self) -> Result<(), BrokerError> {
        let missing: Vec<&str> = [
            ("RGW_ENDPOINT", &self.endpoint),
            ("RGW_ACCESS_KEY", &self.access_key),
            ("RGW_SECRET", &self.secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(BrokerError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.data_bucket.is_empty() {
            return Err(BrokerError::Config("data bucket name is empty".to_owned()));
        }
        if self.request_timeout_secs == 0 {
            return Err(BrokerError::Config("request timeout must be positive".to_owned()));
        }
        if self.access_key_length == 0 {
            return Err(BrokerError::Config(
                "access key length must be positive".to_owned(),
            ));
        }
        if self.key_mint_attempts == 0 {
            return Err(BrokerError::Config(
                "key mint attempts must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// The GC identity in effect.
    #[must_use]
    pub fn gc_user(&self) -> &str {
        self.gc_user.as_deref().unwrap_or(DEFAULT_GC_USER)
    }

    /// Whether the broker must create the GC user itself.
    #[must_use]
    pub fn provisions_gc_user(&self) -> bool {
        self.gc_user.is_none()
    }

    /// Master admin credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.access_key.clone(), self.secret.clone())
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Key minting policy for the admin client.
    #[must_use]
    pub fn key_policy(&self) -> KeyPolicy {
        KeyPolicy {
            access_key_length: self.access_key_length,
            max_attempts: self.key_mint_attempts,
        }
    }
}
