//! In-memory backend for tests.
//!
//! [`FakeBackend`] implements both [`AdminApi`] and [`ObjectApi`] with the
//! semantics the lifecycle manager relies on: users with keys, buckets with
//! an owner and an immutable id, and objects. Failures can be injected per
//! operation, object calls can be paused, and writes can be truncated to
//! simulate short writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rgw_broker_auth::Credentials;
use rgw_broker_client::admin::generate_access_key;
use rgw_broker_client::{AdminApi, BucketOwnership, ClientError, ObjectApi, UserInfo, UserKey};
use tokio::sync::Notify;

/// Owner of buckets created with the master credentials.
pub const MASTER_USER: &str = "rgw-admin";

/// Operations that accept injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    /// `create_user`
    CreateUser,
    /// `modify_user`
    ModifyUser,
    /// `suspend_user`
    SuspendUser,
    /// `create_key`
    CreateKey,
    /// `remove_key`
    RemoveKey,
    /// `get_bucket_owner_id`
    GetBucketOwner,
    /// `unlink_bucket`
    UnlinkBucket,
    /// `link_bucket`
    LinkBucket,
    /// `make_bucket` and `make_bucket_as`
    MakeBucket,
    /// `put_object`
    PutObject,
    /// `get_object`
    GetObject,
    /// `remove_object`
    RemoveObject,
}

impl FakeOp {
    fn is_admin(self) -> bool {
        !matches!(
            self,
            Self::MakeBucket | Self::PutObject | Self::GetObject | Self::RemoveObject
        )
    }
}

/// A call held at its start until released.
#[derive(Debug, Clone, Default)]
pub struct Pause {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl Pause {
    /// Wait until the paused call has started.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the paused call proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug)]
struct FakeBucket {
    id: String,
    owner: String,
    objects: BTreeMap<String, Bytes>,
}

#[derive(Debug, Default)]
struct FakeState {
    users: HashMap<String, UserInfo>,
    buckets: BTreeMap<String, FakeBucket>,
    faults: HashMap<FakeOp, u16>,
    pauses: HashMap<FakeOp, Pause>,
    key_mints: usize,
    next_bucket_id: u64,
    truncate_writes: bool,
}

impl FakeState {
    fn take_fault(&mut self, op: FakeOp) -> Result<(), ClientError> {
        match self.faults.remove(&op) {
            Some(status) if op.is_admin() => Err(admin_error(status, "InjectedFault")),
            Some(status) => Err(s3_error(status, "InjectedFault")),
            None => Ok(()),
        }
    }

    fn user_mut(&mut self, uid: &str) -> Result<&mut UserInfo, ClientError> {
        self.users
            .get_mut(uid)
            .ok_or_else(|| admin_error(404, "NoSuchUser"))
    }

    fn new_bucket(&mut self, name: &str, owner: &str) {
        self.next_bucket_id += 1;
        let id = format!("fake.{}.{name}", self.next_bucket_id);
        self.buckets.insert(
            name.to_owned(),
            FakeBucket {
                id,
                owner: owner.to_owned(),
                objects: BTreeMap::new(),
            },
        );
    }

    fn create_bucket(&mut self, owner: &str, bucket: &str) -> Result<(), ClientError> {
        self.take_fault(FakeOp::MakeBucket)?;
        let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_');
        if bucket.is_empty() || !bucket.chars().all(valid) {
            return Err(s3_error(400, "InvalidBucketName"));
        }
        match self.buckets.get(bucket) {
            Some(existing) if existing.owner == owner => Ok(()),
            Some(_) => Err(s3_error(409, "BucketAlreadyExists")),
            None => {
                self.new_bucket(bucket, owner);
                Ok(())
            }
        }
    }

    fn bucket_mut(&mut self, bucket: &str) -> Result<&mut FakeBucket, ClientError> {
        self.buckets
            .get_mut(bucket)
            .ok_or_else(|| s3_error(404, "NoSuchBucket"))
    }
}

fn admin_error(status: u16, code: &str) -> ClientError {
    ClientError::AdminApi {
        status,
        code: code.to_owned(),
        message: String::new(),
    }
}

fn s3_error(status: u16, code: &str) -> ClientError {
    ClientError::S3 {
        status,
        code: code.to_owned(),
        message: String::new(),
    }
}

fn new_key(uid: &str, access_key: String) -> UserKey {
    UserKey {
        user: uid.to_owned(),
        access_key,
        secret_key: generate_access_key(40),
    }
}

/// In-memory stand-in for the admin API and the S3 data plane.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call of `op` with `status`.
    pub fn fail_next(&self, op: FakeOp, status: u16) {
        self.state.lock().faults.insert(op, status);
    }

    /// Hold the next call of `op` until the returned handle is released.
    ///
    /// Only `put_object`, `get_object` and `remove_object` can be paused.
    pub fn pause_next(&self, op: FakeOp) -> Pause {
        let pause = Pause::default();
        self.state.lock().pauses.insert(op, pause.clone());
        pause
    }

    async fn wait_if_paused(&self, op: FakeOp) {
        let pause = self.state.lock().pauses.remove(&op);
        if let Some(pause) = pause {
            pause.reached.notify_one();
            pause.release.notified().await;
        }
    }

    /// Make `put_object` report one byte less than it received.
    pub fn truncate_writes(&self, enabled: bool) {
        self.state.lock().truncate_writes = enabled;
    }

    /// Create a user without keys.
    pub fn insert_user(&self, uid: &str) {
        self.state.lock().users.insert(
            uid.to_owned(),
            UserInfo {
                user_id: uid.to_owned(),
                display_name: uid.to_owned(),
                suspended: false,
                max_buckets: 1000,
                keys: Vec::new(),
            },
        );
    }

    /// Create a bucket owned by `owner`.
    pub fn insert_bucket(&self, name: &str, owner: &str) {
        self.state.lock().new_bucket(name, owner);
    }

    /// Store an object directly, creating no bucket.
    pub fn insert_object(&self, bucket: &str, key: &str, body: Bytes) {
        if let Some(b) = self.state.lock().buckets.get_mut(bucket) {
            b.objects.insert(key.to_owned(), body);
        }
    }

    /// A user as currently stored.
    #[must_use]
    pub fn user(&self, uid: &str) -> Option<UserInfo> {
        self.state.lock().users.get(uid).cloned()
    }

    /// Ids of all users.
    #[must_use]
    pub fn user_ids(&self) -> Vec<String> {
        self.state.lock().users.keys().cloned().collect()
    }

    /// Current owner of a bucket.
    #[must_use]
    pub fn bucket_owner(&self, bucket: &str) -> Option<String> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map(|b| b.owner.clone())
    }

    /// Id of a bucket.
    #[must_use]
    pub fn bucket_id(&self, bucket: &str) -> Option<String> {
        self.state.lock().buckets.get(bucket).map(|b| b.id.clone())
    }

    /// A stored object.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// How many keys `create_key` has minted.
    #[must_use]
    pub fn key_mints(&self) -> usize {
        self.state.lock().key_mints
    }

    /// Whether `uid` currently holds `access_key`.
    #[must_use]
    pub fn has_key(&self, uid: &str, access_key: &str) -> bool {
        self.state
            .lock()
            .users
            .get(uid)
            .is_some_and(|u| u.keys.iter().any(|k| k.access_key == access_key))
    }
}

#[async_trait]
impl AdminApi for FakeBackend {
    async fn create_user(
        &self,
        uid: &str,
        display_name: &str,
        generate_key: bool,
        success_if_exists: bool,
    ) -> Result<UserInfo, ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::CreateUser)?;
        if let Some(existing) = state.users.get(uid) {
            return if success_if_exists {
                Ok(existing.clone())
            } else {
                Err(admin_error(409, "UserAlreadyExists"))
            };
        }
        let keys = if generate_key {
            vec![new_key(uid, generate_access_key(20))]
        } else {
            Vec::new()
        };
        let user = UserInfo {
            user_id: uid.to_owned(),
            display_name: display_name.to_owned(),
            suspended: false,
            max_buckets: 1000,
            keys,
        };
        state.users.insert(uid.to_owned(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, uid: &str) -> Result<UserInfo, ClientError> {
        self.state
            .lock()
            .users
            .get(uid)
            .cloned()
            .ok_or_else(|| admin_error(404, "NoSuchUser"))
    }

    async fn modify_user(
        &self,
        uid: &str,
        attr: &str,
        value: &str,
    ) -> Result<UserInfo, ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::ModifyUser)?;
        let user = state.user_mut(uid)?;
        match attr {
            "max-buckets" => {
                user.max_buckets = value
                    .parse()
                    .map_err(|_| admin_error(400, "InvalidArgument"))?;
            }
            "suspended" => user.suspended = value == "true" || value == "1",
            "display-name" => user.display_name = value.to_owned(),
            _ => {}
        }
        Ok(user.clone())
    }

    async fn suspend_user(&self, uid: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::SuspendUser)?;
        state.user_mut(uid)?.suspended = true;
        Ok(())
    }

    async fn create_key(&self, uid: &str) -> Result<UserKey, ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::CreateKey)?;
        let key = new_key(uid, generate_access_key(20));
        state.user_mut(uid)?.keys.push(key.clone());
        state.key_mints += 1;
        Ok(key)
    }

    async fn remove_key(&self, uid: &str, access_key: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::RemoveKey)?;
        let user = state.user_mut(uid)?;
        let before = user.keys.len();
        user.keys.retain(|k| k.access_key != access_key);
        if user.keys.len() == before {
            return Err(admin_error(404, "InvalidAccessKeyId"));
        }
        Ok(())
    }

    async fn get_bucket_owner_id(
        &self,
        bucket: &str,
    ) -> Result<Option<BucketOwnership>, ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::GetBucketOwner)?;
        Ok(state.buckets.get(bucket).map(|b| BucketOwnership {
            bucket_id: b.id.clone(),
            owner: b.owner.clone(),
        }))
    }

    async fn unlink_bucket(&self, uid: &str, bucket: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::UnlinkBucket)?;
        let b = state
            .buckets
            .get(bucket)
            .ok_or_else(|| admin_error(404, "NoSuchBucket"))?;
        if b.owner != uid {
            return Err(admin_error(404, "NoSuchBucket"));
        }
        Ok(())
    }

    async fn link_bucket(
        &self,
        uid: &str,
        bucket: &str,
        bucket_id: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        state.take_fault(FakeOp::LinkBucket)?;
        if !state.users.contains_key(uid) {
            return Err(admin_error(404, "NoSuchUser"));
        }
        let b = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| admin_error(404, "NoSuchBucket"))?;
        if b.id != bucket_id {
            return Err(admin_error(400, "InvalidArgument"));
        }
        b.owner = uid.to_owned();
        Ok(())
    }
}

#[async_trait]
impl ObjectApi for FakeBackend {
    async fn make_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        self.state.lock().create_bucket(MASTER_USER, bucket)
    }

    async fn make_bucket_as(
        &self,
        credentials: &Credentials,
        bucket: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        let owner = state
            .users
            .values()
            .find(|u| {
                u.keys
                    .iter()
                    .any(|k| k.access_key == credentials.access_key())
            })
            .map(|u| u.user_id.clone())
            .ok_or_else(|| s3_error(403, "InvalidAccessKeyId"))?;
        state.create_bucket(&owner, bucket)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<u64, ClientError> {
        self.wait_if_paused(FakeOp::PutObject).await;
        let mut state = self.state.lock();
        state.take_fault(FakeOp::PutObject)?;
        let truncate = state.truncate_writes;
        let len = body.len() as u64;
        state
            .bucket_mut(bucket)?
            .objects
            .insert(key.to_owned(), body);
        Ok(if truncate { len.saturating_sub(1) } else { len })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, ClientError> {
        self.wait_if_paused(FakeOp::GetObject).await;
        let mut state = self.state.lock();
        state.take_fault(FakeOp::GetObject)?;
        state
            .bucket_mut(bucket)?
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| s3_error(404, "NoSuchKey"))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        self.wait_if_paused(FakeOp::RemoveObject).await;
        let mut state = self.state.lock();
        state.take_fault(FakeOp::RemoveObject)?;
        state.bucket_mut(bucket)?.objects.remove(key);
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>, ClientError> {
        Ok(self
            .state
            .lock()
            .buckets
            .iter()
            .filter(|(_, b)| b.owner == MASTER_USER)
            .map(|(name, _)| name.clone())
            .collect())
    }
}
