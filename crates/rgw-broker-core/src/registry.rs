//! In-memory caches owned by the lifecycle manager.
//!
//! [`InstanceRegistry`] caches active instance records; the credential store
//! stays the source of truth and the registry can be rebuilt from it.
//! [`BindingLocks`] serializes binding operations per instance.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::model::ServiceInstance;

/// Cache of active instances keyed by instance id.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<String, ServiceInstance>,
}

impl InstanceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instance, if any.
    #[must_use]
    pub fn get(&self, instance_id: &str) -> Option<&ServiceInstance> {
        self.instances.get(instance_id)
    }

    /// Cache an instance, replacing a previous entry.
    pub fn insert(&mut self, instance: ServiceInstance) {
        self.instances
            .insert(instance.instance_id.clone(), instance);
    }

    /// Evict an instance.
    pub fn remove(&mut self, instance_id: &str) -> Option<ServiceInstance> {
        self.instances.remove(instance_id)
    }

    /// Number of cached instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// One async mutex per instance id.
#[derive(Debug, Default)]
pub struct BindingLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl BindingLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock of `instance_id`, created on first use.
    #[must_use]
    pub fn lock_for(&self, instance_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(instance_id.to_owned())
                .or_default()
                .value(),
        )
    }

    /// Drop the lock of a removed instance. Holders keep their clone.
    pub fn forget(&self, instance_id: &str) {
        self.locks.remove(instance_id);
    }

    /// Number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
