//! # Quota Engine
//!
//! Decides whether one more instance of a plan fits within four independent
//! limits: the plan's instance count, the offering's instance count, the
//! plan's resource costs and the offering's resource costs.
//!
//! Every layer is evaluated and every violation is reported. A zero or absent
//! limit leaves its layer unlimited.

use crate::models::{Plan, PlanQuota};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Current instance counts keyed by plan ID
pub type InstanceCounts = HashMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaViolation {
    PlanInstanceLimit {
        plan_id: String,
        limit: u32,
        current: u32,
    },
    GlobalInstanceLimit {
        limit: u32,
        current: u32,
    },
    PlanResourceLimit {
        plan_id: String,
        resource: String,
        limit: u32,
        used: u64,
        required: u64,
    },
    GlobalResourceLimit {
        resource: String,
        limit: u32,
        used: u64,
        required: u64,
    },
}

impl fmt::Display for QuotaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaViolation::PlanInstanceLimit {
                plan_id, current, ..
            } => write!(
                f,
                "plan instance limit exceeded for plan ID: {plan_id}. Total instances: {current}"
            ),
            QuotaViolation::GlobalInstanceLimit { current, .. } => write!(
                f,
                "global instance limit exceeded. Total instances: {current}"
            ),
            QuotaViolation::PlanResourceLimit {
                plan_id,
                resource,
                limit,
                used,
                required,
            } => write!(
                f,
                "plan resource limit exceeded for plan ID: {plan_id}: {resource} (limit {limit}, used {used}, requires {required})"
            ),
            QuotaViolation::GlobalResourceLimit {
                resource,
                limit,
                used,
                required,
            } => write!(
                f,
                "global resource limit exceeded: {resource} (limit {limit}, used {used}, requires {required})"
            ),
        }
    }
}

/// All violations found for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaError {
    pub violations: Vec<QuotaViolation>,
}

impl fmt::Display for QuotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

impl std::error::Error for QuotaError {}

/// Check whether adding one instance of `target` stays within every quota layer
pub fn check_quotas(
    target: &Plan,
    all_plans: &[Plan],
    counts: &InstanceCounts,
    global: &PlanQuota,
) -> Result<(), QuotaError> {
    let mut violations = Vec::new();
    let plan_quota = target.quota();
    let target_count = counts.get(&target.id).copied().unwrap_or(0);

    if let Some(limit) = plan_quota.instance_limit() {
        if target_count >= limit {
            violations.push(QuotaViolation::PlanInstanceLimit {
                plan_id: target.id.clone(),
                limit,
                current: target_count,
            });
        }
    }

    if let Some(limit) = global.instance_limit() {
        let total: u32 = counts.values().sum();
        if total >= limit {
            violations.push(QuotaViolation::GlobalInstanceLimit {
                limit,
                current: total,
            });
        }
    }

    let target_cost = target.resource_cost();

    for (resource, limit) in plan_quota.effective_resource_limits() {
        let unit = u64::from(target_cost.get(resource).copied().unwrap_or(0));
        let used = unit * u64::from(target_count);
        if used + unit > u64::from(limit) {
            violations.push(QuotaViolation::PlanResourceLimit {
                plan_id: target.id.clone(),
                resource: resource.clone(),
                limit,
                used,
                required: unit,
            });
        }
    }

    let global_limits: Vec<_> = global.effective_resource_limits().collect();
    if !global_limits.is_empty() {
        let mut plans: Vec<&Plan> = all_plans.iter().collect();
        if !all_plans.iter().any(|plan| plan.id == target.id) {
            plans.push(target);
        }

        for (resource, limit) in global_limits {
            let used = resource_usage(resource, &plans, counts);
            let required = u64::from(target_cost.get(resource).copied().unwrap_or(0));
            if used + required > u64::from(limit) {
                violations.push(QuotaViolation::GlobalResourceLimit {
                    resource: resource.clone(),
                    limit,
                    used,
                    required,
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(QuotaError { violations })
    }
}

/// Sum of unit cost times instance count over every plan that costs `resource`
fn resource_usage(resource: &str, plans: &[&Plan], counts: &InstanceCounts) -> u64 {
    let mut seen = BTreeSet::new();
    plans
        .iter()
        .filter(|plan| seen.insert(plan.id.as_str()))
        .map(|plan| {
            let unit = u64::from(plan.resource_cost().get(resource).copied().unwrap_or(0));
            let count = u64::from(counts.get(&plan.id).copied().unwrap_or(0));
            unit * count
        })
        .sum()
}
