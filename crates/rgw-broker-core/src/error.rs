//! Broker error types.
//!
//! [`StoreError`] covers the object-backed credential store and
//! [`BrokerError`] is what every lifecycle operation returns. Each variant
//! carries the instance, binding, bucket, or user it concerns so a failure
//! can be diagnosed without retrying.

use rgw_broker_client::ClientError;

/// Errors from the object-backed credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record is stored under the key.
    #[error("record not found: {key}")]
    NotFound {
        /// Object key that was looked up.
        key: String,
    },

    /// The backend stored fewer bytes than were sent.
    #[error("short write for {key}: expected {expected} bytes, stored {written}")]
    ShortWrite {
        /// Object key that was written.
        key: String,
        /// Encoded payload length.
        expected: u64,
        /// Size reported by the backend.
        written: u64,
    },

    /// The record could not be encoded.
    #[error("failed to encode record {key}: {source}")]
    Encode {
        /// Object key of the record.
        key: String,
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The stored object is not a valid record.
    #[error("failed to decode record {key}: {source}")]
    Decode {
        /// Object key of the record.
        key: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Transport or backend failure other than a missing object.
    #[error("backend error on {key}: {source}")]
    Backend {
        /// Object key or bucket involved.
        key: String,
        /// Client error.
        #[source]
        source: ClientError,
    },
}

impl StoreError {
    /// Whether the record simply does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors returned by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// An active instance with this id already exists.
    #[error("service instance {instance_id} already exists")]
    AlreadyExists {
        /// Instance id.
        instance_id: String,
    },

    /// No instance with this id is known.
    #[error("service instance {instance_id} not found")]
    InstanceNotFound {
        /// Instance id.
        instance_id: String,
    },

    /// No binding with this id is known for the instance.
    #[error("binding {binding_id} of service instance {instance_id} not found")]
    BindingNotFound {
        /// Instance id.
        instance_id: String,
        /// Binding id.
        binding_id: String,
    },

    /// The instance has not finished provisioning.
    #[error("service instance {instance_id} is still provisioning")]
    InstancePending {
        /// Instance id.
        instance_id: String,
    },

    /// The requested bucket belongs to someone else.
    #[error("bucket {bucket} is not available")]
    BucketUnavailable {
        /// Bucket name.
        bucket: String,
    },

    /// The request parameters are invalid.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A backend admin or data-plane call failed.
    #[error("{context}: {source}")]
    Admin {
        /// What was being done, including the names involved.
        context: String,
        /// Client error.
        #[source]
        source: ClientError,
    },

    /// The credential store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BrokerError {
    /// Wrap a client error with context. Meant for `map_err`.
    pub(crate) fn admin(context: impl Into<String>) -> impl FnOnce(ClientError) -> Self {
        let context = context.into();
        move |source| Self::Admin { context, source }
    }

    /// HTTP status of the underlying backend failure, if any.
    #[must_use]
    pub fn admin_status(&self) -> Option<u16> {
        match self {
            Self::Admin { source, .. }
            | Self::Store(StoreError::Backend { source, .. }) => source.status(),
            _ => None,
        }
    }

    /// Short machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::InstanceNotFound { .. } => "InstanceNotFound",
            Self::BindingNotFound { .. } => "BindingNotFound",
            Self::InstancePending { .. } => "InstancePending",
            Self::BucketUnavailable { .. } => "BucketUnavailable",
            Self::InvalidParameters(_) => "InvalidParameters",
            Self::Admin { .. } => "AdminAPIError",
            Self::Store(StoreError::ShortWrite { .. }) => "ShortWrite",
            Self::Store(_) => "StoreError",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }
}
