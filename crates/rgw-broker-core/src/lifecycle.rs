//! Tenant lifecycle: provisioning, binding, and removal.
//!
//! [`TenantLifecycleManager`] drives the backend through the [`AdminApi`] and
//! persists its records through a [`CredentialStore`]. The store is the
//! source of truth; the in-memory registry only caches active instances.
//!
//! Create and remove hold the registry write lock for their whole duration,
//! so provisioning is serialized process-wide. Every other operation holds
//! the read lock for its whole duration, so it sees an instance either
//! before or after a create or remove, never in between. Only create and
//! remove change the registry. Bind and unbind are additionally serialized
//! per instance through [`BindingLocks`].
//!
//! An instance record is written in the `provisioning` state before the
//! backend is touched. A create that fails part way leaves that record
//! behind and the next create of the same id resumes from it with the
//! recorded user and bucket names.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rgw_broker_auth::Credentials;
use rgw_broker_client::{
    AdminApi, AdminClient, ClientError, Endpoint, ObjectApi, S3Client, SignedTransport,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::catalog::Catalog;
use crate::config::{BrokerConfig, DEFAULT_GC_USER};
use crate::error::BrokerError;
use crate::gc::{GcHandoff, HandoffOutcome};
use crate::model::{
    BindRequest, Binding, BindingCredentials, CreateInstanceRequest, InstanceState,
    ServiceInstance, generate_id,
};
use crate::registry::{BindingLocks, InstanceRegistry};
use crate::store::{CredentialStore, RecordKey};

/// Display name of the GC user when the broker provisions it.
const GC_USER_DISPLAY_NAME: &str = "RGW broker garbage collector";

/// Settings of a [`TenantLifecycleManager`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ManagerSettings {
    /// Backend URL handed out in instance records and credentials.
    #[builder(setter(into))]
    pub endpoint: String,
    /// Prefix of generated tenant user ids.
    #[builder(default = String::from("kube-rgw."), setter(into))]
    pub uid_prefix: String,
    /// Owner of released buckets.
    #[builder(default = String::from(DEFAULT_GC_USER), setter(into))]
    pub gc_user: String,
    /// Whether [`TenantLifecycleManager::bootstrap`] creates the GC user.
    #[builder(default = true)]
    pub provision_gc_user: bool,
    /// Bucket holding the broker's records.
    #[builder(default = String::from("kube-rgw-data"), setter(into))]
    pub data_bucket: String,
}

impl ManagerSettings {
    /// Derive settings from a broker configuration.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let endpoint = Endpoint::parse(&config.endpoint)
            .map_err(|e| BrokerError::Config(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.as_str().to_owned(),
            uid_prefix: config.uid_prefix.clone(),
            gc_user: config.gc_user().to_owned(),
            provision_gc_user: config.provisions_gc_user(),
            data_bucket: config.data_bucket.clone(),
        })
    }
}

/// Result of [`TenantLifecycleManager::remove_service_instance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// No such instance; nothing was done.
    Absent,
    /// The instance was removed.
    Removed {
        /// What happened to its bucket.
        handoff: HandoffOutcome,
    },
}

/// Result of [`TenantLifecycleManager::bind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// The binding.
    pub binding: Binding,
    /// Whether a key was minted by this call.
    pub created: bool,
}

/// State reported to a polling caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    /// Provisioning completed.
    #[serde(rename = "succeeded")]
    Succeeded,
    /// Provisioning has not completed yet.
    #[serde(rename = "in progress")]
    InProgress,
}

/// Creates, binds, and removes tenants.
pub struct TenantLifecycleManager {
    admin: Arc<dyn AdminApi>,
    objects: Arc<dyn ObjectApi>,
    store: CredentialStore,
    gc: GcHandoff,
    settings: ManagerSettings,
    catalog: Catalog,
    registry: RwLock<InstanceRegistry>,
    binding_locks: BindingLocks,
}

impl fmt::Debug for TenantLifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantLifecycleManager")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .field("gc", &self.gc)
            .finish_non_exhaustive()
    }
}

impl TenantLifecycleManager {
    /// Create a manager over the given backend handles.
    pub fn new(
        admin: Arc<dyn AdminApi>,
        objects: Arc<dyn ObjectApi>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            store: CredentialStore::new(Arc::clone(&objects), settings.data_bucket.clone()),
            objects,
            gc: GcHandoff::new(Arc::clone(&admin), settings.gc_user.clone()),
            admin,
            settings,
            catalog: Catalog::default(),
            registry: RwLock::new(InstanceRegistry::new()),
            binding_locks: BindingLocks::new(),
        }
    }

    /// Create a manager talking to the backend described by `config`.
    pub fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        config.validate()?;
        let settings = ManagerSettings::from_config(config)?;
        let endpoint =
            Endpoint::parse(&config.endpoint).map_err(|e| BrokerError::Config(e.to_string()))?;
        let transport = SignedTransport::new(endpoint, config.region.clone(), config.request_timeout())
            .map_err(|e| BrokerError::Config(e.to_string()))?;

        let admin = AdminClient::new(transport.clone(), config.credentials())
            .with_key_policy(config.key_policy());
        let objects = S3Client::new(transport, config.credentials());
        info!(
            endpoint = %settings.endpoint,
            data_bucket = %settings.data_bucket,
            gc_user = %settings.gc_user,
            timeout = ?config.request_timeout(),
            "connected lifecycle manager"
        );
        Ok(Self::new(Arc::new(admin), Arc::new(objects), settings))
    }

    /// Settings in effect.
    #[must_use]
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The static service catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Prepare the backend: create the GC user when the broker owns it and
    /// make sure the data bucket exists.
    pub async fn bootstrap(&self) -> Result<(), BrokerError> {
        if self.settings.provision_gc_user {
            let gc_user = &self.settings.gc_user;
            self.admin
                .create_user(gc_user, GC_USER_DISPLAY_NAME, false, true)
                .await
                .map_err(BrokerError::admin(format!("provision GC user {gc_user}")))?;
            info!(gc_user = %gc_user, "GC user ready");
        }
        self.store.ensure_bucket().await?;
        Ok(())
    }

    /// Provision a backend user and bucket for `instance_id`.
    pub async fn create_service_instance(
        &self,
        instance_id: &str,
        request: CreateInstanceRequest,
    ) -> Result<ServiceInstance, BrokerError> {
        let mut registry = self.registry.write().await;
        if registry.get(instance_id).is_some() {
            return Err(BrokerError::AlreadyExists {
                instance_id: instance_id.to_owned(),
            });
        }

        let key = RecordKey::instance(instance_id);
        let (mut instance, resumed) = match self.store.find::<ServiceInstance>(&key).await? {
            Some(existing) if existing.is_active() => {
                registry.insert(existing);
                return Err(BrokerError::AlreadyExists {
                    instance_id: instance_id.to_owned(),
                });
            }
            Some(pending) => {
                info!(
                    instance_id,
                    user = %pending.user_name,
                    bucket = %pending.bucket_name,
                    "resuming interrupted provisioning"
                );
                (pending, true)
            }
            None => (self.new_instance(instance_id, request), false),
        };

        self.ensure_bucket_available(&instance).await?;
        if !resumed {
            self.store.put(&key, &instance).await?;
        }

        self.provision(&instance).await?;

        instance.state = InstanceState::Active;
        self.store.put(&key, &instance).await?;
        registry.insert(instance.clone());
        info!(
            instance_id,
            user = %instance.user_name,
            bucket = %instance.bucket_name,
            "service instance created"
        );
        Ok(instance)
    }

    /// Remove `instance_id`: suspend its user and hand its bucket to the GC
    /// user. Unknown ids succeed.
    pub async fn remove_service_instance(
        &self,
        instance_id: &str,
    ) -> Result<RemoveOutcome, BrokerError> {
        let mut registry = self.registry.write().await;
        let key = RecordKey::instance(instance_id);
        let instance = match registry.get(instance_id) {
            Some(cached) => cached.clone(),
            None => match self.store.find::<ServiceInstance>(&key).await? {
                Some(stored) => stored,
                None => {
                    info!(instance_id, "service instance unknown, nothing to remove");
                    return Ok(RemoveOutcome::Absent);
                }
            },
        };
        let user = &instance.user_name;

        match self.admin.suspend_user(user).await {
            Ok(()) => info!(instance_id, user = %user, "suspended user"),
            Err(e) if e.is_not_found() => {
                warn!(instance_id, user = %user, "user not found on backend, continuing removal");
            }
            Err(e) => return Err(BrokerError::admin(format!("suspend user {user}"))(e)),
        }

        let handoff = self.gc.hand_off(user, &instance.bucket_name).await?;

        if let Err(e) = self.store.delete(&key).await {
            warn!(instance_id, error = %e, "failed to delete instance record");
        }
        registry.remove(instance_id);
        self.binding_locks.forget(instance_id);
        info!(
            instance_id,
            user = %user,
            bucket = %instance.bucket_name,
            "service instance removed"
        );
        Ok(RemoveOutcome::Removed { handoff })
    }

    /// Issue credentials for `binding_id`. A repeated bind returns the
    /// stored credentials without minting a new key.
    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        request: BindRequest,
    ) -> Result<BindOutcome, BrokerError> {
        let lock = self.binding_locks.lock_for(instance_id);
        let _guard = lock.lock().await;
        let registry = self.registry.read().await;

        let instance = self.require_active(&registry, instance_id).await?;
        let key = RecordKey::binding(instance_id, binding_id);
        if let Some(existing) = self.store.find::<Binding>(&key).await? {
            if existing.credentials.user_name == instance.user_name {
                debug!(instance_id, binding_id, "binding already exists");
                return Ok(BindOutcome {
                    binding: existing,
                    created: false,
                });
            }
            warn!(
                instance_id,
                binding_id,
                user = %existing.credentials.user_name,
                "replacing binding left by a removed instance"
            );
            debug!(
                instance_id,
                binding_id,
                access_key = %existing.credentials.access_key,
                "old key left in place, its user is suspended"
            );
        }

        let user = &instance.user_name;
        let minted = self
            .admin
            .create_key(user)
            .await
            .map_err(BrokerError::admin(format!("create key for {user}")))?;

        let binding = Binding {
            instance_id: instance_id.to_owned(),
            binding_id: binding_id.to_owned(),
            credentials: BindingCredentials {
                user_name: user.clone(),
                bucket_name: instance.bucket_name.clone(),
                endpoint: instance.endpoint.clone(),
                access_key: minted.access_key,
                secret_key: minted.secret_key,
            },
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.put(&key, &binding).await {
            let access_key = &binding.credentials.access_key;
            match self.admin.remove_key(user, access_key).await {
                Ok(()) => warn!(instance_id, binding_id, "revoked key after failed persist"),
                Err(revoke) => warn!(
                    instance_id,
                    binding_id,
                    user = %user,
                    access_key = %access_key,
                    error = %revoke,
                    "failed to revoke key after failed persist"
                ),
            }
            return Err(e.into());
        }

        info!(
            instance_id,
            binding_id,
            user = %user,
            app_guid = request.app_guid.as_deref().unwrap_or(""),
            "binding created"
        );
        Ok(BindOutcome {
            binding,
            created: true,
        })
    }

    /// Revoke the key of `binding_id`. Unknown instances and bindings
    /// succeed.
    pub async fn unbind(&self, instance_id: &str, binding_id: &str) -> Result<(), BrokerError> {
        let lock = self.binding_locks.lock_for(instance_id);
        let _guard = lock.lock().await;
        let registry = self.registry.read().await;

        if self.lookup(&registry, instance_id).await?.is_none() {
            info!(instance_id, binding_id, "service instance unknown, nothing to unbind");
            return Ok(());
        }
        let key = RecordKey::binding(instance_id, binding_id);
        let Some(binding) = self.store.find::<Binding>(&key).await? else {
            info!(instance_id, binding_id, "binding unknown, nothing to unbind");
            return Ok(());
        };

        let user = &binding.credentials.user_name;
        match self
            .admin
            .remove_key(user, &binding.credentials.access_key)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(instance_id, binding_id, user = %user, "key already gone");
            }
            Err(e) => return Err(BrokerError::admin(format!("remove key of {user}"))(e)),
        }

        if let Err(e) = self.store.delete(&key).await {
            warn!(instance_id, binding_id, error = %e, "failed to delete binding record");
        }
        info!(instance_id, binding_id, user = %user, "binding removed");
        Ok(())
    }

    /// The stored binding of `binding_id`.
    pub async fn fetch_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> Result<Binding, BrokerError> {
        let registry = self.registry.read().await;
        if self.lookup(&registry, instance_id).await?.is_none() {
            return Err(BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            });
        }
        self.store
            .find(&RecordKey::binding(instance_id, binding_id))
            .await?
            .ok_or_else(|| BrokerError::BindingNotFound {
                instance_id: instance_id.to_owned(),
                binding_id: binding_id.to_owned(),
            })
    }

    /// Provisioning state of `instance_id`.
    pub async fn last_operation(&self, instance_id: &str) -> Result<OperationState, BrokerError> {
        match self.find_instance(instance_id).await? {
            Some(instance) if instance.is_active() => Ok(OperationState::Succeeded),
            Some(_) => Ok(OperationState::InProgress),
            None => Err(BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            }),
        }
    }

    /// Look up an instance in the registry, then in the store.
    pub async fn find_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<ServiceInstance>, BrokerError> {
        let registry = self.registry.read().await;
        self.lookup(&registry, instance_id).await
    }

    /// Number of cached instances.
    pub async fn cached_instances(&self) -> usize {
        self.registry.read().await.len()
    }

    async fn lookup(
        &self,
        registry: &InstanceRegistry,
        instance_id: &str,
    ) -> Result<Option<ServiceInstance>, BrokerError> {
        if let Some(cached) = registry.get(instance_id) {
            return Ok(Some(cached.clone()));
        }
        self.store
            .find::<ServiceInstance>(&RecordKey::instance(instance_id))
            .await
            .map_err(BrokerError::from)
    }

    async fn require_active(
        &self,
        registry: &InstanceRegistry,
        instance_id: &str,
    ) -> Result<ServiceInstance, BrokerError> {
        match self.lookup(registry, instance_id).await? {
            Some(instance) if instance.is_active() => Ok(instance),
            Some(_) => Err(BrokerError::InstancePending {
                instance_id: instance_id.to_owned(),
            }),
            None => Err(BrokerError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
            }),
        }
    }

    fn new_instance(&self, instance_id: &str, request: CreateInstanceRequest) -> ServiceInstance {
        let bucket_name = match request.parameters.bucket_name {
            Some(name) if !name.is_empty() => name,
            _ => generate_id(),
        };
        ServiceInstance {
            instance_id: instance_id.to_owned(),
            namespace: request.namespace,
            endpoint: self.settings.endpoint.clone(),
            user_name: format!("{}{}", self.settings.uid_prefix, generate_id()),
            bucket_name,
            state: InstanceState::Provisioning,
            created_at: Utc::now(),
        }
    }

    async fn ensure_bucket_available(&self, instance: &ServiceInstance) -> Result<(), BrokerError> {
        let bucket = &instance.bucket_name;
        let ownership = self
            .admin
            .get_bucket_owner_id(bucket)
            .await
            .map_err(BrokerError::admin(format!("look up owner of bucket {bucket}")))?;
        match ownership {
            Some(ownership) if ownership.owner != instance.user_name => {
                info!(
                    instance_id = %instance.instance_id,
                    bucket = %bucket,
                    owner = %ownership.owner,
                    "bucket owned by another user"
                );
                Err(BrokerError::BucketUnavailable {
                    bucket: bucket.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn provision(&self, instance: &ServiceInstance) -> Result<(), BrokerError> {
        let user = &instance.user_name;
        let bucket = &instance.bucket_name;

        let info = self
            .admin
            .create_user(user, &instance.display_name(), true, true)
            .await
            .map_err(BrokerError::admin(format!("create user {user}")))?;
        let key = info
            .keys
            .iter()
            .find(|k| k.user == *user)
            .or_else(|| info.keys.first())
            .ok_or_else(|| anyhow::anyhow!("user {user} was created without keys"))?;
        debug!(user = %user, access_key = %key.access_key, "tenant user ready");

        let tenant = Credentials::new(key.access_key.clone(), key.secret_key.clone());
        self.create_tenant_bucket(&tenant, bucket).await?;

        self.admin
            .modify_user(user, "max-buckets", "-1")
            .await
            .map_err(BrokerError::admin(format!("set max-buckets of {user}")))?;
        Ok(())
    }

    async fn create_tenant_bucket(
        &self,
        tenant: &Credentials,
        bucket: &str,
    ) -> Result<(), BrokerError> {
        match self.objects.make_bucket_as(tenant, bucket).await {
            Ok(()) => Ok(()),
            Err(e) if is_bucket_taken(&e) => Err(BrokerError::BucketUnavailable {
                bucket: bucket.to_owned(),
            }),
            Err(e) if e.code() == Some("InvalidBucketName") => Err(
                BrokerError::InvalidParameters(format!("invalid bucket name {bucket:?}")),
            ),
            Err(e) => Err(BrokerError::admin(format!("create bucket {bucket}"))(e)),
        }
    }
}

fn is_bucket_taken(err: &ClientError) -> bool {
    err.code() == Some("BucketAlreadyExists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceParameters;
    use crate::testing::{FakeBackend, FakeOp};

    const DATA: &str = "kube-rgw-data";
    const GC: &str = "rgw-kube-gc-user";

    async fn manager_over(fake: &Arc<FakeBackend>) -> TenantLifecycleManager {
        let settings = ManagerSettings::builder()
            .endpoint("http://rgw.local:7480")
            .build();
        let manager = TenantLifecycleManager::new(fake.clone(), fake.clone(), settings);
        manager.bootstrap().await.unwrap();
        manager
    }

    async fn setup() -> (Arc<FakeBackend>, TenantLifecycleManager) {
        let fake = Arc::new(FakeBackend::new());
        let manager = manager_over(&fake).await;
        (fake, manager)
    }

    fn with_bucket(name: &str) -> CreateInstanceRequest {
        CreateInstanceRequest {
            namespace: "default".to_owned(),
            parameters: InstanceParameters {
                bucket_name: Some(name.to_owned()),
            },
        }
    }

    fn tenant_users(fake: &FakeBackend) -> Vec<String> {
        fake.user_ids()
            .into_iter()
            .filter(|u| u.starts_with("kube-rgw."))
            .collect()
    }

    #[tokio::test]
    async fn test_should_bootstrap_gc_user_and_data_bucket() {
        let (fake, _manager) = setup().await;
        assert!(fake.user(GC).is_some());
        assert!(fake.bucket_owner(DATA).is_some());
    }

    #[tokio::test]
    async fn test_should_create_instance() {
        let (fake, manager) = setup().await;

        let instance = manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();

        assert!(instance.is_active());
        assert_eq!(instance.bucket_name, "b1");
        assert_eq!(instance.endpoint, "http://rgw.local:7480");
        assert!(instance.user_name.starts_with("kube-rgw."));
        assert_eq!(fake.bucket_owner("b1").as_deref(), Some(instance.user_name.as_str()));

        let user = fake.user(&instance.user_name).unwrap();
        assert_eq!(user.max_buckets, -1);
        assert_eq!(user.display_name, "default/i1");

        let stored: ServiceInstance = manager
            .store()
            .get(&RecordKey::instance("i1"))
            .await
            .unwrap();
        assert_eq!(stored, instance);
        assert_eq!(manager.cached_instances().await, 1);
    }

    #[tokio::test]
    async fn test_should_generate_bucket_name_when_absent() {
        let (fake, manager) = setup().await;
        let instance = manager
            .create_service_instance("i1", CreateInstanceRequest::default())
            .await
            .unwrap();
        assert_eq!(instance.bucket_name.len(), 32);
        assert_eq!(
            fake.bucket_owner(&instance.bucket_name).as_deref(),
            Some(instance.user_name.as_str())
        );
    }

    #[tokio::test]
    async fn test_should_reject_duplicate_instance() {
        let (fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();

        let err = manager
            .create_service_instance("i1", with_bucket("b2"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::AlreadyExists { .. }));

        // A fresh process only knows the instance through the store.
        let restarted = manager_over(&fake).await;
        let err = restarted
            .create_service_instance("i1", with_bucket("b2"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::AlreadyExists { .. }));
        assert_eq!(tenant_users(&fake).len(), 1);
        assert!(fake.bucket_owner("b2").is_none());
    }

    #[tokio::test]
    async fn test_should_accept_short_bucket_name() {
        let (fake, manager) = setup().await;
        let instance = manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        assert_eq!(instance.bucket_name, "b1");
        assert_eq!(fake.bucket_owner("b1").as_deref(), Some(instance.user_name.as_str()));
    }

    #[tokio::test]
    async fn test_should_report_bucket_name_rejected_by_backend() {
        let (fake, manager) = setup().await;
        let err = manager
            .create_service_instance("i1", with_bucket("bad bucket"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidParameters(_)));
        assert!(fake.bucket_owner("bad bucket").is_none());
        assert_eq!(
            manager.last_operation("i1").await.unwrap(),
            OperationState::InProgress
        );
    }

    #[tokio::test]
    async fn test_should_refuse_bucket_owned_by_someone_else() {
        let (fake, manager) = setup().await;
        fake.insert_user("other");
        fake.insert_bucket("taken", "other");

        let err = manager
            .create_service_instance("i1", with_bucket("taken"))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::BucketUnavailable { ref bucket } if bucket == "taken"));
        assert!(fake.object(DATA, "instance/i1").is_none());
        assert!(tenant_users(&fake).is_empty());
        assert_eq!(fake.bucket_owner("taken").as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_should_resume_interrupted_provisioning() {
        let (fake, manager) = setup().await;
        fake.fail_next(FakeOp::ModifyUser, 500);

        let err = manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap_err();
        assert_eq!(err.admin_status(), Some(500));
        assert_eq!(
            manager.last_operation("i1").await.unwrap(),
            OperationState::InProgress
        );
        let pending = manager.bind("i1", "b1", BindRequest::default()).await;
        assert!(matches!(pending, Err(BrokerError::InstancePending { .. })));

        let instance = manager
            .create_service_instance("i1", with_bucket("ignored"))
            .await
            .unwrap();

        assert_eq!(instance.bucket_name, "b1");
        assert_eq!(tenant_users(&fake), vec![instance.user_name.clone()]);
        assert_eq!(fake.user(&instance.user_name).unwrap().max_buckets, -1);
        assert_eq!(
            manager.last_operation("i1").await.unwrap(),
            OperationState::Succeeded
        );
    }

    #[tokio::test]
    async fn test_should_remove_unknown_instance() {
        let (_fake, manager) = setup().await;
        let outcome = manager.remove_service_instance("nope").await.unwrap();
        assert_eq!(outcome, RemoveOutcome::Absent);
    }

    #[tokio::test]
    async fn test_should_hand_bucket_to_gc_on_remove() {
        let (fake, manager) = setup().await;
        let instance = manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();

        let outcome = manager.remove_service_instance("i1").await.unwrap();

        assert!(matches!(
            outcome,
            RemoveOutcome::Removed {
                handoff: HandoffOutcome::Transferred { .. }
            }
        ));
        assert_eq!(fake.bucket_owner("b1").as_deref(), Some(GC));
        assert!(fake.user(&instance.user_name).unwrap().suspended);
        assert!(fake.object(DATA, "instance/i1").is_none());
        assert_eq!(manager.cached_instances().await, 0);

        let again = manager.remove_service_instance("i1").await.unwrap();
        assert_eq!(again, RemoveOutcome::Absent);
        assert_eq!(fake.bucket_owner("b1").as_deref(), Some(GC));
    }

    #[tokio::test]
    async fn test_should_keep_bucket_created_by_another_user() {
        let (fake, manager) = setup().await;
        fake.fail_next(FakeOp::CreateUser, 500);
        assert!(
            manager
                .create_service_instance("i1", with_bucket("bkt1"))
                .await
                .is_err()
        );
        assert!(fake.object(DATA, "instance/i1").is_some());
        fake.insert_user("other");
        fake.insert_bucket("bkt1", "other");

        let outcome = manager.remove_service_instance("i1").await.unwrap();

        assert_eq!(
            outcome,
            RemoveOutcome::Removed {
                handoff: HandoffOutcome::NotOwned {
                    owner: "other".to_owned()
                }
            }
        );
        assert_eq!(fake.bucket_owner("bkt1").as_deref(), Some("other"));
        assert!(fake.object(DATA, "instance/i1").is_none());
    }

    #[tokio::test]
    async fn test_should_finish_partial_removal() {
        let (fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        fake.fail_next(FakeOp::LinkBucket, 500);

        assert!(manager.remove_service_instance("i1").await.is_err());
        assert!(fake.object(DATA, "instance/i1").is_some());

        let outcome = manager.remove_service_instance("i1").await.unwrap();
        assert!(matches!(outcome, RemoveOutcome::Removed { .. }));
        assert_eq!(fake.bucket_owner("b1").as_deref(), Some(GC));
    }

    #[tokio::test]
    async fn test_should_return_same_binding_twice() {
        let (fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();

        let first = manager.bind("i1", "bind1", BindRequest::default()).await.unwrap();
        let second = manager.bind("i1", "bind1", BindRequest::default()).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.binding, second.binding);
        assert_eq!(fake.key_mints(), 1);
        let creds = &first.binding.credentials;
        assert_eq!(creds.bucket_name, "b1");
        assert_eq!(creds.endpoint, "http://rgw.local:7480");
        assert!(fake.has_key(&creds.user_name, &creds.access_key));
    }

    #[tokio::test]
    async fn test_should_mint_one_key_for_concurrent_binds() {
        let (fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.bind("i1", "bind1", BindRequest::default()).await })
            })
            .collect();
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(fake.key_mints(), 1);
    }

    #[tokio::test]
    async fn test_should_order_bind_before_concurrent_remove() {
        let fake = Arc::new(FakeBackend::new());
        manager_over(&fake)
            .await
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        // A fresh process reads the instance from the store on bind.
        let manager = Arc::new(manager_over(&fake).await);
        let pause = fake.pause_next(FakeOp::GetObject);

        let bind = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.bind("i1", "bind1", BindRequest::default()).await }
        });
        pause.reached().await;
        let remove = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.remove_service_instance("i1").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!remove.is_finished());

        pause.release();
        assert!(bind.await.unwrap().unwrap().created);
        assert!(matches!(
            remove.await.unwrap().unwrap(),
            RemoveOutcome::Removed { .. }
        ));

        assert!(fake.object(DATA, "instance/i1").is_none());
        assert_eq!(manager.cached_instances().await, 0);
        manager
            .create_service_instance("i1", with_bucket("b2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_should_reject_bind_to_unknown_instance() {
        let (fake, manager) = setup().await;
        let err = manager
            .bind("nope", "bind1", BindRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InstanceNotFound { .. }));
        assert_eq!(fake.key_mints(), 0);
    }

    #[tokio::test]
    async fn test_should_revoke_key_when_binding_persist_fails() {
        let (fake, manager) = setup().await;
        let instance = manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        fake.fail_next(FakeOp::PutObject, 500);

        let err = manager
            .bind("i1", "bind1", BindRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::Store(_)));
        assert_eq!(fake.key_mints(), 1);
        // Only the key generated with the user remains.
        assert_eq!(fake.user(&instance.user_name).unwrap().keys.len(), 1);
        assert!(fake.object(DATA, "bind/i1/bind1").is_none());
    }

    #[tokio::test]
    async fn test_should_unbind_idempotently() {
        let (fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();

        manager.unbind("i1", "never-bound").await.unwrap();
        manager.unbind("nope", "bind1").await.unwrap();

        let bound = manager.bind("i1", "bind1", BindRequest::default()).await.unwrap();
        let creds = bound.binding.credentials;
        manager.unbind("i1", "bind1").await.unwrap();
        manager.unbind("i1", "bind1").await.unwrap();

        assert!(!fake.has_key(&creds.user_name, &creds.access_key));
        assert!(fake.object(DATA, "bind/i1/bind1").is_none());
    }

    #[tokio::test]
    async fn test_should_fetch_binding() {
        let (_fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        let bound = manager.bind("i1", "bind1", BindRequest::default()).await.unwrap();

        let fetched = manager.fetch_binding("i1", "bind1").await.unwrap();
        assert_eq!(fetched, bound.binding);

        let missing = manager.fetch_binding("i1", "bind2").await.unwrap_err();
        assert!(matches!(missing, BrokerError::BindingNotFound { .. }));
        let unknown = manager.fetch_binding("nope", "bind1").await.unwrap_err();
        assert!(matches!(unknown, BrokerError::InstanceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_issue_fresh_binding_after_recreate() {
        let (fake, manager) = setup().await;
        manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        let old = manager.bind("i1", "bind1", BindRequest::default()).await.unwrap();
        manager.remove_service_instance("i1").await.unwrap();

        let instance = manager
            .create_service_instance("i1", with_bucket("b2"))
            .await
            .unwrap();
        let new = manager.bind("i1", "bind1", BindRequest::default()).await.unwrap();

        assert!(new.created);
        assert_ne!(new.binding.credentials.user_name, old.binding.credentials.user_name);
        assert_eq!(new.binding.credentials.user_name, instance.user_name);
        assert_eq!(fake.key_mints(), 2);
    }

    #[tokio::test]
    async fn test_should_run_full_tenant_scenario() {
        let (fake, manager) = setup().await;

        let instance = manager
            .create_service_instance("i1", with_bucket("b1"))
            .await
            .unwrap();
        let bound = manager
            .bind(
                "i1",
                "bind1",
                BindRequest {
                    app_guid: Some("app-1".to_owned()),
                },
            )
            .await
            .unwrap();
        let creds = bound.binding.credentials.clone();
        assert!(fake.has_key(&instance.user_name, &creds.access_key));

        manager.unbind("i1", "bind1").await.unwrap();
        assert!(!fake.has_key(&instance.user_name, &creds.access_key));

        manager.remove_service_instance("i1").await.unwrap();
        assert_eq!(fake.bucket_owner("b1").as_deref(), Some(GC));
        assert!(fake.user(&instance.user_name).unwrap().suspended);
        assert!(matches!(
            manager.last_operation("i1").await,
            Err(BrokerError::InstanceNotFound { .. })
        ));
    }

    #[test]
    fn test_should_serialize_operation_state() {
        assert_eq!(
            serde_json::to_string(&OperationState::InProgress).unwrap(),
            "\"in progress\""
        );
        assert_eq!(
            serde_json::to_string(&OperationState::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }

    #[test]
    fn test_should_derive_settings_from_config() {
        let config = BrokerConfig::builder()
            .endpoint("rgw.local:7480")
            .access_key("admin")
            .secret("secret")
            .gc_user("external-gc")
            .build();
        let settings = ManagerSettings::from_config(&config).unwrap();
        assert_eq!(settings.endpoint, "http://rgw.local:7480");
        assert_eq!(settings.gc_user, "external-gc");
        assert!(!settings.provision_gc_user);
    }
}
