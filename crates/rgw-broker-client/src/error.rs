//! Client error types.

use rgw_broker_auth::SigningError;

/// Boxed error used as the source of decoding failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by the admin and data-plane clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be signed and was never sent.
    #[error("failed to sign request: {0}")]
    Signing(#[from] SigningError),

    /// The admin API answered with a non-success status.
    #[error("admin API returned {status} ({code}): {message}")]
    AdminApi {
        /// HTTP status code.
        status: u16,
        /// Error code from the response body, or the status reason.
        code: String,
        /// Human-readable detail.
        message: String,
    },

    /// The S3 data plane answered with a non-success status.
    #[error("S3 API returned {status} ({code}): {message}")]
    S3 {
        /// HTTP status code.
        status: u16,
        /// S3 error code such as `NoSuchKey`.
        code: String,
        /// Human-readable detail.
        message: String,
    },

    /// A success response could not be decoded.
    #[error("failed to decode {context}: {source}")]
    Unmarshal {
        /// What was being decoded.
        context: &'static str,
        /// Underlying decoder error.
        #[source]
        source: BoxError,
    },

    /// Connection, timeout, or other transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The configured backend endpoint is not a usable URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A header value could not be represented on the wire.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    pub(crate) fn unmarshal(context: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Unmarshal {
            context,
            source: source.into(),
        }
    }

    /// HTTP status associated with the error, when the backend answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AdminApi { status, .. } | Self::S3 { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Error code reported by the backend, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::AdminApi { code, .. } | Self::S3 { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the backend reported that the target does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the backend reported a conflict with existing state.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}
