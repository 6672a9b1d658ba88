//! Broker API request router.
//!
//! Paths follow the Open Service Broker v2 layout:
//!
//! ```text
//! GET    /v2/catalog
//! PUT    /v2/service_instances/{id}
//! DELETE /v2/service_instances/{id}
//! GET    /v2/service_instances/{id}/last_operation
//! PUT    /v2/service_instances/{id}/service_bindings/{bid}
//! GET    /v2/service_instances/{id}/service_bindings/{bid}
//! DELETE /v2/service_instances/{id}/service_bindings/{bid}
//! GET    /health
//! ```

use http::Method;

/// A resolved broker operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Liveness probe.
    Health,
    /// Service catalog.
    Catalog,
    /// Provision an instance.
    CreateInstance {
        /// Instance id.
        instance_id: String,
    },
    /// Deprovision an instance.
    RemoveInstance {
        /// Instance id.
        instance_id: String,
    },
    /// Poll provisioning state.
    LastOperation {
        /// Instance id.
        instance_id: String,
    },
    /// Create a binding.
    Bind {
        /// Instance id.
        instance_id: String,
        /// Binding id.
        binding_id: String,
    },
    /// Read a binding.
    FetchBinding {
        /// Instance id.
        instance_id: String,
        /// Binding id.
        binding_id: String,
    },
    /// Delete a binding.
    Unbind {
        /// Instance id.
        instance_id: String,
        /// Binding id.
        binding_id: String,
    },
}

impl Operation {
    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Health => "Health",
            Self::Catalog => "Catalog",
            Self::CreateInstance { .. } => "CreateServiceInstance",
            Self::RemoveInstance { .. } => "RemoveServiceInstance",
            Self::LastOperation { .. } => "LastOperation",
            Self::Bind { .. } => "Bind",
            Self::FetchBinding { .. } => "FetchBinding",
            Self::Unbind { .. } => "UnBind",
        }
    }
}

/// Why a request matched no operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// No such path.
    NotFound,
    /// The path exists but not for this method.
    MethodNotAllowed,
}

/// Resolve the operation addressed by `method` and `path`.
pub fn resolve_operation(method: &Method, path: &str) -> Result<Operation, RouteError> {
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();

    let allowed = |methods: &[Method]| {
        if methods.contains(method) {
            Ok(())
        } else {
            Err(RouteError::MethodNotAllowed)
        }
    };

    match segments.as_slice() {
        ["health"] => {
            allowed(&[Method::GET])?;
            Ok(Operation::Health)
        }
        ["v2", "catalog"] => {
            allowed(&[Method::GET])?;
            Ok(Operation::Catalog)
        }
        ["v2", "service_instances", id] if !id.is_empty() => {
            let instance_id = (*id).to_owned();
            match *method {
                Method::PUT => Ok(Operation::CreateInstance { instance_id }),
                Method::DELETE => Ok(Operation::RemoveInstance { instance_id }),
                _ => Err(RouteError::MethodNotAllowed),
            }
        }
        ["v2", "service_instances", id, "last_operation"] if !id.is_empty() => {
            allowed(&[Method::GET])?;
            Ok(Operation::LastOperation {
                instance_id: (*id).to_owned(),
            })
        }
        ["v2", "service_instances", id, "service_bindings", bid]
            if !id.is_empty() && !bid.is_empty() =>
        {
            let instance_id = (*id).to_owned();
            let binding_id = (*bid).to_owned();
            match *method {
                Method::PUT => Ok(Operation::Bind {
                    instance_id,
                    binding_id,
                }),
                Method::GET => Ok(Operation::FetchBinding {
                    instance_id,
                    binding_id,
                }),
                Method::DELETE => Ok(Operation::Unbind {
                    instance_id,
                    binding_id,
                }),
                _ => Err(RouteError::MethodNotAllowed),
            }
        }
        _ => Err(RouteError::NotFound),
    }
}
