//! Access key / secret pairs used to sign requests.

use std::fmt;

/// An S3-style access key and its secret.
///
/// The secret is never printed by the [`Debug`] implementation.
///
/// # Examples
///
/// ```
/// use rgw_broker_auth::Credentials;
///
/// let creds = Credentials::new("AKID", "very-secret");
/// assert_eq!(creds.access_key(), "AKID");
/// assert!(!format!("{creds:?}").contains("very-secret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// The access key ID.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The secret access key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Whether both halves are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"...")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_report_incomplete_credentials() {
        assert!(Credentials::new("AKID", "secret").is_complete());
        assert!(!Credentials::new("", "secret").is_complete());
        assert!(!Credentials::new("AKID", "").is_complete());
    }

    #[test]
    fn test_should_redact_secret_in_debug_output() {
        let creds = Credentials::new("AKID", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("hunter2"));
    }
}
