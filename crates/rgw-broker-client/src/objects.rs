//! Path-style S3 data-plane client.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use rgw_broker_auth::Credentials;
use rgw_broker_auth::canonical::{encode_object_path, encode_path};
use tracing::debug;

use crate::api::ObjectApi;
use crate::error::ClientError;
use crate::transport::{OutgoingRequest, RawResponse, SignedTransport};
use crate::xml;

/// S3 client signing with a default credential pair.
#[derive(Debug, Clone)]
pub struct S3Client {
    transport: SignedTransport,
    credentials: Credentials,
}

impl S3Client {
    /// Create a client that signs with `credentials` unless told otherwise.
    #[must_use]
    pub fn new(transport: SignedTransport, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Size of a stored object, from a `HEAD` request.
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<u64, ClientError> {
        let path = encode_object_path(bucket, key);
        let response = self
            .send_checked(
                &self.credentials,
                OutgoingRequest::new(Method::HEAD, &path, ""),
            )
            .await?;
        let length = response
            .headers
            .get(http::header::CONTENT_LENGTH)
            .ok_or_else(|| ClientError::unmarshal("HEAD response", "missing Content-Length"))?;
        length
            .to_str()
            .map_err(|e| ClientError::unmarshal("HEAD response", e))?
            .parse::<u64>()
            .map_err(|e| ClientError::unmarshal("HEAD response", e))
    }

    async fn send_checked(
        &self,
        credentials: &Credentials,
        request: OutgoingRequest<'_>,
    ) -> Result<RawResponse, ClientError> {
        let response = self.transport.send(credentials, request).await?;
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(s3_error(&response))
        }
    }

    async fn create_bucket(&self, credentials: &Credentials, bucket: &str) -> Result<(), ClientError> {
        let path = encode_path(&[bucket]);
        match self
            .send_checked(credentials, OutgoingRequest::new(Method::PUT, &path, ""))
            .await
        {
            Ok(_) => {
                debug!(bucket, "created bucket");
                Ok(())
            }
            Err(e) if e.code() == Some("BucketAlreadyOwnedByYou") => {
                debug!(bucket, "bucket already owned by caller");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Build a [`ClientError::S3`] from an error response.
fn s3_error(response: &RawResponse) -> ClientError {
    let status = response.status;
    let fallback_code = || {
        if status == StatusCode::NOT_FOUND {
            "NotFound".to_owned()
        } else {
            status.canonical_reason().unwrap_or("Unknown").to_owned()
        }
    };
    match xml::parse_error(&response.body) {
        Ok(body) if !body.code.is_empty() => ClientError::S3 {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        },
        _ => ClientError::S3 {
            status: status.as_u16(),
            code: fallback_code(),
            message: String::new(),
        },
    }
}

#[async_trait]
impl ObjectApi for S3Client {
    async fn make_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        self.create_bucket(&self.credentials, bucket).await
    }

    async fn make_bucket_as(
        &self,
        credentials: &Credentials,
        bucket: &str,
    ) -> Result<(), ClientError> {
        self.create_bucket(credentials, bucket).await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<u64, ClientError> {
        let path = encode_object_path(bucket, key);
        self.send_checked(
            &self.credentials,
            OutgoingRequest::new(Method::PUT, &path, "").with_body(body, "application/json"),
        )
        .await?;
        self.head_object(bucket, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        let path = encode_object_path(bucket, key);
        let response = self
            .send_checked(
                &self.credentials,
                OutgoingRequest::new(Method::GET, &path, ""),
            )
            .await?;
        Ok(response.body)
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        let path = encode_object_path(bucket, key);
        self.send_checked(
            &self.credentials,
            OutgoingRequest::new(Method::DELETE, &path, ""),
        )
        .await?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>, ClientError> {
        let response = self
            .send_checked(&self.credentials, OutgoingRequest::new(Method::GET, "/", ""))
            .await?;
        xml::parse_bucket_names(&response.body)
            .map_err(|e| ClientError::unmarshal("ListAllMyBucketsResult", e))
    }
}
