//! # Plans and Quotas
//!
//! Catalog-side value types the orchestration core reads: plans, their
//! quotas and resource costs, and their lifecycle errands.

use crate::models::operation::Errand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Limit and per-instance cost of one resource kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub cost: Option<u32>,
}

/// Quotas as they appear in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    #[serde(default)]
    pub service_instance_limit: Option<u32>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceQuota>,
}

/// Instance and resource limits for one layer (a plan, or the whole offering).
///
/// Zero or absent means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanQuota {
    pub service_instance_limit: Option<u32>,
    pub resource_limits: BTreeMap<String, u32>,
}

impl PlanQuota {
    pub fn instance_limit(&self) -> Option<u32> {
        self.service_instance_limit.filter(|limit| *limit > 0)
    }

    /// Resource limits with unlimited (zero) entries removed
    pub fn effective_resource_limits(&self) -> impl Iterator<Item = (&String, u32)> {
        self.resource_limits
            .iter()
            .filter(|(_, limit)| **limit > 0)
            .map(|(kind, limit)| (kind, *limit))
    }

    /// Whether any layer of this quota would need instance counts to evaluate
    pub fn is_limited(&self) -> bool {
        self.instance_limit().is_some() || self.effective_resource_limits().next().is_some()
    }
}

/// Per-instance cost of each resource kind
pub type ResourceCost = BTreeMap<String, u32>;

impl Quotas {
    pub fn plan_quota(&self) -> PlanQuota {
        PlanQuota {
            service_instance_limit: self.service_instance_limit,
            resource_limits: self
                .resources
                .iter()
                .filter_map(|(kind, quota)| quota.limit.map(|limit| (kind.clone(), limit)))
                .collect(),
        }
    }

    pub fn resource_cost(&self) -> ResourceCost {
        self.resources
            .iter()
            .filter_map(|(kind, quota)| quota.cost.map(|cost| (kind.clone(), cost)))
            .collect()
    }
}

/// Errands a plan runs around its deploy and delete tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleErrands {
    #[serde(default)]
    pub post_deploy: Option<Errand>,
    #[serde(default)]
    pub pre_delete: Vec<Errand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub quotas: Quotas,
    #[serde(default)]
    pub lifecycle_errands: LifecycleErrands,
}

impl Plan {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            quotas: Quotas::default(),
            lifecycle_errands: LifecycleErrands::default(),
        }
    }

    pub fn post_deploy_errand(&self) -> Option<&Errand> {
        self.lifecycle_errands
            .post_deploy
            .as_ref()
            .filter(|errand| !errand.is_empty())
    }

    pub fn pre_delete_errands(&self) -> &[Errand] {
        &self.lifecycle_errands.pre_delete
    }

    pub fn has_lifecycle_errand(&self) -> bool {
        self.post_deploy_errand().is_some() || !self.pre_delete_errands().is_empty()
    }

    pub fn quota(&self) -> PlanQuota {
        self.quotas.plan_quota()
    }

    pub fn resource_cost(&self) -> ResourceCost {
        self.quotas.resource_cost()
    }
}

/// The service offering the broker serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub global_quotas: Quotas,
    #[serde(default)]
    pub plans: Vec<Plan>,
}

impl ServiceOffering {
    pub fn find_plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == plan_id)
    }

    pub fn global_quota(&self) -> PlanQuota {
        self.global_quotas.plan_quota()
    }
}
