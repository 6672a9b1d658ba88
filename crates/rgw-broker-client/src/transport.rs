//! Signed HTTP transport shared by the admin and data-plane clients.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use rgw_broker_auth::{Credentials, RequestToSign, SigningParams, hash_payload, sign_request};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::ClientError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw response of a signed request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Full response body.
    pub body: Bytes,
}

/// One encoded request ready to be signed and sent.
#[derive(Debug, Clone)]
pub struct OutgoingRequest<'a> {
    /// HTTP method.
    pub method: Method,
    /// Encoded path.
    pub path: &'a str,
    /// Encoded query string without `?`.
    pub query: &'a str,
    /// Request body.
    pub body: Bytes,
    /// Optional `content-type` header.
    pub content_type: Option<&'a str>,
}

impl<'a> OutgoingRequest<'a> {
    /// A request without a body.
    #[must_use]
    pub fn new(method: Method, path: &'a str, query: &'a str) -> Self {
        Self {
            method,
            path,
            query,
            body: Bytes::new(),
            content_type: None,
        }
    }

    /// Attach a body with the given content type.
    #[must_use]
    pub fn with_body(mut self, body: Bytes, content_type: &'a str) -> Self {
        self.body = body;
        self.content_type = Some(content_type);
        self
    }
}

/// Sends SigV4-signed requests to one backend endpoint.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SignedTransport {
    client: Client,
    endpoint: Endpoint,
    region: String,
}

impl SignedTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(
        endpoint: Endpoint,
        region: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            region: region.into(),
        })
    }

    /// The backend endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sign `request` with `credentials` and send it.
    ///
    /// Non-success statuses are returned as-is; interpreting them is up to the
    /// caller.
    pub async fn send(
        &self,
        credentials: &Credentials,
        request: OutgoingRequest<'_>,
    ) -> Result<RawResponse, ClientError> {
        let payload_hash = hash_payload(&request.body);
        let host = self.endpoint.host();

        let mut sign_headers = vec![("host", host)];
        if let Some(content_type) = request.content_type {
            sign_headers.push(("content-type", content_type));
        }

        let params = SigningParams::new(credentials, &self.region, "s3");
        let signed = sign_request(
            &RequestToSign {
                method: request.method.as_str(),
                path: request.path,
                query: request.query,
                headers: &sign_headers,
            },
            &payload_hash,
            &params,
        )?;

        let url = self.endpoint.url(request.path, request.query);
        debug!(method = %request.method, url, "sending signed request");

        let mut builder = self.client.request(request.method, &url);
        for (name, value) in signed.iter() {
            builder = builder.header(name, value);
        }
        if let Some(content_type) = request.content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        debug!(%status, len = body.len(), "received response");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
