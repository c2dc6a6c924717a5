//! # Broker Configuration
//!
//! The broker's catalog (service offering, plans, quotas, lifecycle errands)
//! and the handful of settings the orchestration core reads.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use osb_broker_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(Some("config/broker.yml".as_ref()))?;
//! let offering = &manager.config().service_catalog;
//! println!("serving {} with {} plans", offering.name, offering.plans.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::models::ServiceOffering;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

pub const DEFAULT_DEPLOYMENT_PREFIX: &str = "service-instance_";

fn default_deployment_prefix() -> String {
    DEFAULT_DEPLOYMENT_PREFIX.to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub broker: BrokerSettings,

    pub service_catalog: ServiceOffering,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BrokerSettings {
    /// Prepended to the instance ID to form the backend deployment name
    #[serde(default = "default_deployment_prefix")]
    pub deployment_prefix: String,

    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            deployment_prefix: default_deployment_prefix(),
            environment: default_environment(),
        }
    }
}

impl BrokerConfig {
    pub fn new(service_catalog: ServiceOffering) -> Self {
        Self {
            broker: BrokerSettings::default(),
            service_catalog,
        }
    }

    pub fn deployment_name(&self, instance_id: &str) -> String {
        format!("{}{}", self.broker.deployment_prefix, instance_id)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let catalog = &self.service_catalog;
        if catalog.id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "id",
                "service_catalog",
            ));
        }
        if catalog.name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "name",
                "service_catalog",
            ));
        }
        if self.broker.deployment_prefix.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "deployment_prefix",
                "",
                "deployment names need a non-empty prefix",
            ));
        }

        let mut seen = HashSet::new();
        for plan in &catalog.plans {
            if plan.id.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "id",
                    format!("plan '{}'", plan.name),
                ));
            }
            if !seen.insert(plan.id.as_str()) {
                return Err(ConfigurationError::DuplicatePlan {
                    plan_id: plan.id.clone(),
                });
            }
            let errands = plan
                .lifecycle_errands
                .post_deploy
                .iter()
                .chain(plan.lifecycle_errands.pre_delete.iter());
            for errand in errands {
                if errand.name.trim().is_empty() {
                    return Err(ConfigurationError::invalid_value(
                        "lifecycle_errands",
                        "",
                        format!("plan '{}' declares an errand without a name", plan.id),
                    ));
                }
            }
        }
        Ok(())
    }
}
