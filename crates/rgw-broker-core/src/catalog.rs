//! Static service catalog.

use serde::{Deserialize, Serialize};

/// Catalog returned to the service-catalog controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Offered services.
    pub services: Vec<ServiceOffering>,
}

/// One offered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    /// Service name.
    pub name: String,
    /// Service id.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Whether instances accept bindings.
    pub bindable: bool,
    /// Plans of the service.
    pub plans: Vec<ServicePlan>,
}

/// One plan of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePlan {
    /// Plan name.
    pub name: String,
    /// Plan id.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the plan is free.
    pub free: bool,
}

impl Default for Catalog {
    /// One bindable bucket service with a single free plan.
    fn default() -> Self {
        Self {
            services: vec![ServiceOffering {
                name: "rgw-bucket-service".to_owned(),
                id: "0".to_owned(),
                description: "An S3 bucket owned by a dedicated RGW user.".to_owned(),
                bindable: true,
                plans: vec![ServicePlan {
                    name: "default".to_owned(),
                    id: "0".to_owned(),
                    description: "The only plan.".to_owned(),
                    free: true,
                }],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_offer_one_bindable_free_plan() {
        let catalog = Catalog::default();
        assert_eq!(catalog.services.len(), 1);
        let service = &catalog.services[0];
        assert!(service.bindable);
        assert_eq!(service.plans.len(), 1);
        assert_eq!(service.plans[0].name, "default");
        assert!(service.plans[0].free);
    }
}
