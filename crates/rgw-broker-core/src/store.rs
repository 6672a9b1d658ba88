//! Object-backed record store.
//!
//! Records are JSON objects in a reserved bucket of the managed backend
//! itself. Keys are deterministic:
//!
//! - `instance/<instanceId>` for [`ServiceInstance`](crate::model::ServiceInstance)
//! - `bind/<instanceId>/<bindingId>` for [`Binding`](crate::model::Binding)

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rgw_broker_client::ObjectApi;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::StoreError;

/// Key of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// An instance record.
    Instance {
        /// Instance id.
        instance_id: String,
    },
    /// A binding record.
    Binding {
        /// Owning instance id.
        instance_id: String,
        /// Binding id.
        binding_id: String,
    },
}

impl RecordKey {
    /// Key of an instance record.
    pub fn instance(instance_id: impl Into<String>) -> Self {
        Self::Instance {
            instance_id: instance_id.into(),
        }
    }

    /// Key of a binding record.
    pub fn binding(instance_id: impl Into<String>, binding_id: impl Into<String>) -> Self {
        Self::Binding {
            instance_id: instance_id.into(),
            binding_id: binding_id.into(),
        }
    }

    /// Object name inside the data bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// use rgw_broker_core::store::RecordKey;
    ///
    /// assert_eq!(RecordKey::instance("i1").object_name(), "instance/i1");
    /// assert_eq!(RecordKey::binding("i1", "b1").object_name(), "bind/i1/b1");
    /// ```
    #[must_use]
    pub fn object_name(&self) -> String {
        match self {
            Self::Instance { instance_id } => format!("instance/{instance_id}"),
            Self::Binding {
                instance_id,
                binding_id,
            } => format!("bind/{instance_id}/{binding_id}"),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object_name())
    }
}

/// JSON record store on top of the S3 data plane.
#[derive(Clone)]
pub struct CredentialStore {
    objects: Arc<dyn ObjectApi>,
    bucket: String,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a store writing into `bucket`.
    pub fn new(objects: Arc<dyn ObjectApi>, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            bucket: bucket.into(),
        }
    }

    /// The data bucket.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the data bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), StoreError> {
        self.objects
            .make_bucket(&self.bucket)
            .await
            .map_err(|source| StoreError::Backend {
                key: self.bucket.clone(),
                source,
            })?;
        info!(bucket = %self.bucket, "data bucket ready");
        Ok(())
    }

    /// Store `record` under `key`, replacing any previous value.
    ///
    /// Fails with [`StoreError::ShortWrite`] when the backend reports a
    /// different size than was sent.
    pub async fn put<T: Serialize + Sync>(
        &self,
        key: &RecordKey,
        record: &T,
    ) -> Result<(), StoreError> {
        let name = key.object_name();
        let payload = serde_json::to_vec(record).map_err(|source| StoreError::Encode {
            key: name.clone(),
            source,
        })?;
        let expected = payload.len() as u64;

        let written = self
            .objects
            .put_object(&self.bucket, &name, Bytes::from(payload))
            .await
            .map_err(|source| StoreError::Backend {
                key: name.clone(),
                source,
            })?;
        if written != expected {
            return Err(StoreError::ShortWrite {
                key: name,
                expected,
                written,
            });
        }
        debug!(key = %name, bytes = written, "stored record");
        Ok(())
    }

    /// Read the record under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &RecordKey) -> Result<T, StoreError> {
        let name = key.object_name();
        let body = match self.objects.get_object(&self.bucket, &name).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Err(StoreError::NotFound { key: name }),
            Err(source) => return Err(StoreError::Backend { key: name, source }),
        };
        serde_json::from_slice(&body).map_err(|source| StoreError::Decode { key: name, source })
    }

    /// Read the record under `key`, mapping [`StoreError::NotFound`] to `None`.
    pub async fn find<T: DeserializeOwned>(
        &self,
        key: &RecordKey,
    ) -> Result<Option<T>, StoreError> {
        match self.get(key).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete the record under `key`. Deleting a missing record succeeds.
    pub async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        let name = key.object_name();
        match self.objects.remove_object(&self.bucket, &name).await {
            Ok(()) => {
                debug!(key = %name, "deleted record");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(source) => Err(StoreError::Backend { key: name, source }),
        }
    }
}
