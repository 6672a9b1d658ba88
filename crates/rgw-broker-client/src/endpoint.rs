//! Backend endpoint parsing.

use reqwest::Url;

use crate::error::ClientError;

/// A parsed storage backend base URL.
///
/// Only scheme, host and port are kept; any path on the configured URL is
/// ignored because both the admin API and the S3 data plane live at the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    original: String,
}

impl Endpoint {
    /// Parse an endpoint, defaulting to `http://` when no scheme is given.
    ///
    /// # Examples
    ///
    /// ```
    /// use rgw_broker_client::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("rgw.local:8000").unwrap();
    /// assert_eq!(endpoint.host(), "rgw.local:8000");
    /// assert_eq!(endpoint.url("/admin/user", "uid=a"), "http://rgw.local:8000/admin/user?uid=a");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ClientError::InvalidEndpoint("endpoint is empty".to_owned()));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("http://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint(format!(
                "{raw}: unsupported scheme {}",
                url.scheme()
            )));
        }
        let host_str = url
            .host_str()
            .ok_or_else(|| ClientError::InvalidEndpoint(format!("{raw}: missing host")))?;
        let host = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_owned(),
        };

        Ok(Self {
            scheme: url.scheme().to_owned(),
            host,
            original: with_scheme,
        })
    }

    /// Value of the `host` header, including a non-default port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The endpoint as configured, with the scheme made explicit.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Full URL for an already encoded path and query.
    #[must_use]
    pub fn url(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}://{}{path}", self.scheme, self.host)
        } else {
            format!("{}://{}{path}?{query}", self.scheme, self.host)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.original)
    }
}
