//! Client for the backend admin API (`/admin/<section>`).
//!
//! Every call is a SigV4-signed request made with the broker's master
//! credentials. Query parameters are passed in the order the backend
//! documents them; the signer sorts them for the canonical form.

mod keygen;
mod types;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use rgw_broker_auth::Credentials;
use rgw_broker_auth::canonical::{encode_path, encode_query};
use tracing::{debug, info, warn};

pub use keygen::{DEFAULT_ACCESS_KEY_LENGTH, generate_access_key};
pub use types::{BucketOwnership, UserInfo, UserKey};

use crate::api::AdminApi;
use crate::error::ClientError;
use crate::transport::{OutgoingRequest, SignedTransport};
use types::{AdminErrorBody, BucketMetadata};

/// Default number of conditional key-create attempts.
pub const DEFAULT_KEY_MINT_ATTEMPTS: u32 = 3;

/// How access keys are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Length of locally generated access keys.
    pub access_key_length: usize,
    /// How many fresh keys to try when the backend reports a collision.
    pub max_attempts: u32,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            access_key_length: DEFAULT_ACCESS_KEY_LENGTH,
            max_attempts: DEFAULT_KEY_MINT_ATTEMPTS,
        }
    }
}

/// Signed client for the backend admin API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    transport: SignedTransport,
    credentials: Credentials,
    key_policy: KeyPolicy,
}

impl AdminClient {
    /// Create a client that signs with `credentials`.
    #[must_use]
    pub fn new(transport: SignedTransport, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
            key_policy: KeyPolicy::default(),
        }
    }

    /// Override the key minting policy.
    #[must_use]
    pub fn with_key_policy(mut self, key_policy: KeyPolicy) -> Self {
        self.key_policy = key_policy;
        self
    }

    /// Issue one admin request and return `(body, status)`.
    ///
    /// The URL is `/admin/<section>?<resource>&<params>`. A non-2xx status is
    /// an [`ClientError::AdminApi`] unless it equals `success_if_status`.
    pub async fn do_admin_request(
        &self,
        method: Method,
        section: &str,
        resource: Option<&str>,
        params: &[(&str, &str)],
        success_if_status: Option<u16>,
    ) -> Result<(Bytes, u16), ClientError> {
        let path = encode_path(&["admin", section]);
        let mut pairs: Vec<(&str, Option<&str>)> = Vec::with_capacity(params.len() + 1);
        if let Some(resource) = resource {
            pairs.push((resource, None));
        }
        pairs.extend(params.iter().map(|(k, v)| (*k, Some(*v))));
        let query = encode_query(&pairs);

        let response = self
            .transport
            .send(
                &self.credentials,
                OutgoingRequest::new(method.clone(), &path, &query),
            )
            .await?;

        let status = response.status.as_u16();
        if response.status.is_success() || success_if_status == Some(status) {
            return Ok((response.body, status));
        }

        let (code, message) = match serde_json::from_slice::<AdminErrorBody>(&response.body) {
            Ok(body) => (body.code, body.message.unwrap_or_default()),
            Err(_) => (
                response
                    .status
                    .canonical_reason()
                    .unwrap_or("Unknown")
                    .to_owned(),
                String::from_utf8_lossy(&response.body).into_owned(),
            ),
        };
        debug!(%method, section, status, code = %code, "admin request failed");
        Err(ClientError::AdminApi {
            status,
            code,
            message,
        })
    }

    async fn admin_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        section: &str,
        resource: Option<&str>,
        params: &[(&str, &str)],
        context: &'static str,
    ) -> Result<T, ClientError> {
        let (body, _) = self
            .do_admin_request(method, section, resource, params, None)
            .await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::unmarshal(context, e))
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn create_user(
        &self,
        uid: &str,
        display_name: &str,
        generate_key: bool,
        success_if_exists: bool,
    ) -> Result<UserInfo, ClientError> {
        let generate = if generate_key { "true" } else { "false" };
        let result = self
            .admin_json(
                Method::PUT,
                "user",
                None,
                &[
                    ("uid", uid),
                    ("display-name", display_name),
                    ("generate-key", generate),
                ],
                "create user response",
            )
            .await;

        match result {
            Err(e) if success_if_exists && e.is_conflict() => {
                debug!(uid, "user already exists, fetching it");
                self.get_user(uid).await
            }
            other => other,
        }
    }

    async fn get_user(&self, uid: &str) -> Result<UserInfo, ClientError> {
        self.admin_json(Method::GET, "user", None, &[("uid", uid)], "user info")
            .await
    }

    async fn modify_user(
        &self,
        uid: &str,
        attr: &str,
        value: &str,
    ) -> Result<UserInfo, ClientError> {
        self.admin_json(
            Method::POST,
            "user",
            None,
            &[("uid", uid), (attr, value)],
            "modify user response",
        )
        .await
    }

    async fn suspend_user(&self, uid: &str) -> Result<(), ClientError> {
        self.do_admin_request(
            Method::POST,
            "user",
            None,
            &[("uid", uid), ("suspended", "true")],
            None,
        )
        .await?;
        info!(user = uid, "suspended backend user");
        Ok(())
    }

    async fn create_key(&self, uid: &str) -> Result<UserKey, ClientError> {
        let mut attempt = 1;
        loop {
            let access_key = generate_access_key(self.key_policy.access_key_length);
            let result = self
                .admin_json::<Vec<UserKey>>(
                    Method::PUT,
                    "user",
                    Some("key"),
                    &[
                        ("uid", uid),
                        ("access-key", access_key.as_str()),
                        ("key-type", "s3"),
                        ("generate-secret", "true"),
                    ],
                    "create key response",
                )
                .await;

            match result {
                Ok(keys) => {
                    return keys
                        .into_iter()
                        .find(|k| k.access_key == access_key)
                        .ok_or_else(|| {
                            ClientError::unmarshal(
                                "create key response",
                                "minted access key missing from user key list",
                            )
                        });
                }
                Err(e) if e.is_conflict() && attempt < self.key_policy.max_attempts => {
                    warn!(user = uid, attempt, "access key collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn remove_key(&self, uid: &str, access_key: &str) -> Result<(), ClientError> {
        self.do_admin_request(
            Method::DELETE,
            "user",
            Some("key"),
            &[("uid", uid), ("access-key", access_key)],
            None,
        )
        .await?;
        Ok(())
    }

    async fn get_bucket_owner_id(
        &self,
        bucket: &str,
    ) -> Result<Option<BucketOwnership>, ClientError> {
        let key = format!("bucket:{bucket}");
        let (body, status) = self
            .do_admin_request(Method::GET, "metadata", None, &[("key", key.as_str())], Some(404))
            .await?;
        if status == 404 {
            return Ok(None);
        }
        let meta: BucketMetadata = serde_json::from_slice(&body)
            .map_err(|e| ClientError::unmarshal("bucket metadata", e))?;
        Ok(Some(meta.into()))
    }

    async fn unlink_bucket(&self, uid: &str, bucket: &str) -> Result<(), ClientError> {
        self.do_admin_request(
            Method::POST,
            "bucket",
            None,
            &[("uid", uid), ("bucket", bucket)],
            None,
        )
        .await?;
        Ok(())
    }

    async fn link_bucket(
        &self,
        uid: &str,
        bucket: &str,
        bucket_id: &str,
    ) -> Result<(), ClientError> {
        self.do_admin_request(
            Method::PUT,
            "bucket",
            None,
            &[("uid", uid), ("bucket", bucket), ("bucket-id", bucket_id)],
            None,
        )
        .await?;
        Ok(())
    }
}
