//! Records owned by the broker and the requests that create them.
//!
//! Everything persisted is JSON with camelCase field names.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provisioning state of an instance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Persisted before any backend side effect; provisioning may be
    /// incomplete.
    Provisioning,
    /// User, bucket, and quota are confirmed.
    Active,
}

/// One provisioned tenant: a backend user and the bucket it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    /// Externally assigned instance id.
    pub instance_id: String,
    /// Caller-supplied scope label, empty when absent.
    #[serde(default)]
    pub namespace: String,
    /// Backend URL handed to bound clients.
    pub endpoint: String,
    /// Backend user id.
    pub user_name: String,
    /// Tenant bucket.
    pub bucket_name: String,
    /// Provisioning state.
    pub state: InstanceState,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
}

impl ServiceInstance {
    /// Whether provisioning completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == InstanceState::Active
    }

    /// Backend display name of the tenant user.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.namespace.is_empty() {
            self.instance_id.clone()
        } else {
            format!("{}/{}", self.namespace, self.instance_id)
        }
    }
}

/// Credentials handed to a bound application.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingCredentials {
    /// Backend user the key belongs to.
    pub user_name: String,
    /// Tenant bucket.
    pub bucket_name: String,
    /// Backend URL.
    pub endpoint: String,
    /// Access key id.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
}

impl fmt::Debug for BindingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCredentials")
            .field("user_name", &self.user_name)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"...")
            .finish()
    }
}

/// One issued credential pair of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Owning instance id.
    pub instance_id: String,
    /// Binding id, unique per instance.
    pub binding_id: String,
    /// Issued credentials.
    pub credentials: BindingCredentials,
    /// When the key was minted.
    pub created_at: DateTime<Utc>,
}

/// Recognized instance parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceParameters {
    /// Bucket to create. Generated when absent.
    #[serde(default)]
    pub bucket_name: Option<String>,
}

/// Input of `create_service_instance`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateInstanceRequest {
    /// Caller-supplied scope label.
    pub namespace: String,
    /// Instance parameters.
    pub parameters: InstanceParameters,
}

/// Input of `bind`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindRequest {
    /// Application the credentials are issued to, when the caller says.
    pub app_guid: Option<String>,
}

/// Random identifier used for generated user and bucket names.
///
/// 32 lowercase hex digits, which is also a valid bucket name.
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
