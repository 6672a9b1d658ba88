//! Tenant lifecycle management for the RGW service broker.
//!
//! Maps service-catalog operations onto a storage backend:
//!
//! - [`TenantLifecycleManager`] provisions a user and bucket per instance,
//!   issues one key per binding, and removes instances.
//! - [`CredentialStore`] persists instance and binding records as JSON
//!   objects in a reserved bucket of the backend itself.
//! - [`GcHandoff`] moves a removed instance's bucket to the GC user.
//!
//! Backend access goes through the [`AdminApi`](rgw_broker_client::AdminApi)
//! and [`ObjectApi`](rgw_broker_client::ObjectApi) traits.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gc;
pub mod lifecycle;
pub mod model;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{Catalog, ServiceOffering, ServicePlan};
pub use config::BrokerConfig;
pub use error::{BrokerError, StoreError};
pub use gc::{GcHandoff, HandoffOutcome};
pub use lifecycle::{
    BindOutcome, ManagerSettings, OperationState, RemoveOutcome, TenantLifecycleManager,
};
pub use model::{
    BindRequest, Binding, BindingCredentials, CreateInstanceRequest, InstanceParameters,
    InstanceState, ServiceInstance,
};
pub use store::{CredentialStore, RecordKey};
