//! Backend abstractions used by the broker core.
//!
//! [`AdminClient`](crate::AdminClient) and [`S3Client`](crate::S3Client)
//! implement these against a live backend; tests substitute in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use rgw_broker_auth::Credentials;

use crate::admin::{BucketOwnership, UserInfo, UserKey};
use crate::error::ClientError;

/// User, key, and bucket-ownership operations of the backend admin API.
#[async_trait]
pub trait AdminApi: Send + Sync + 'static {
    /// Create a user. When `success_if_exists` is set, an existing user is
    /// fetched and returned instead of failing.
    async fn create_user(
        &self,
        uid: &str,
        display_name: &str,
        generate_key: bool,
        success_if_exists: bool,
    ) -> Result<UserInfo, ClientError>;

    /// Fetch a user.
    async fn get_user(&self, uid: &str) -> Result<UserInfo, ClientError>;

    /// Set one attribute of a user.
    async fn modify_user(&self, uid: &str, attr: &str, value: &str)
    -> Result<UserInfo, ClientError>;

    /// Suspend a user.
    async fn suspend_user(&self, uid: &str) -> Result<(), ClientError>;

    /// Mint a new S3 key pair for a user.
    async fn create_key(&self, uid: &str) -> Result<UserKey, ClientError>;

    /// Revoke one access key of a user.
    async fn remove_key(&self, uid: &str, access_key: &str) -> Result<(), ClientError>;

    /// Look up a bucket's owner and id. `None` when the bucket does not exist.
    async fn get_bucket_owner_id(
        &self,
        bucket: &str,
    ) -> Result<Option<BucketOwnership>, ClientError>;

    /// Detach a bucket from its owner.
    async fn unlink_bucket(&self, uid: &str, bucket: &str) -> Result<(), ClientError>;

    /// Attach a bucket to a new owner.
    async fn link_bucket(&self, uid: &str, bucket: &str, bucket_id: &str)
    -> Result<(), ClientError>;
}

/// S3 data-plane operations.
#[async_trait]
pub trait ObjectApi: Send + Sync + 'static {
    /// Create a bucket owned by the master credentials.
    async fn make_bucket(&self, bucket: &str) -> Result<(), ClientError>;

    /// Create a bucket owned by the holder of `credentials`.
    async fn make_bucket_as(&self, credentials: &Credentials, bucket: &str)
    -> Result<(), ClientError>;

    /// Store an object and return the size the backend reports for it.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<u64, ClientError>;

    /// Read a whole object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), ClientError>;

    /// Names of the buckets owned by the master credentials.
    async fn list_buckets(&self) -> Result<Vec<String>, ClientError>;
}
