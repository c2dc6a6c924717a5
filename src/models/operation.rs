//! # Operation Data
//!
//! The continuation token carried between a triggering OSB call and the
//! last-operation polls that follow it. The broker keeps no copy; everything
//! needed to resume tracking lives in this value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of broker operation recorded in a continuation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    Create,
    Update,
    Upgrade,
    Delete,
    ForceDelete,
    Bind,
    Unbind,
    Recreate,
}

impl OperationType {
    /// Operations whose errand (if any) runs after the deploy task.
    pub fn is_post_deploy(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Upgrade | Self::Recreate
        )
    }

    /// Human-readable subject used in last-operation descriptions.
    pub fn description_subject(&self) -> &'static str {
        match self {
            Self::Create => "Instance provisioning",
            Self::Update => "Instance update",
            Self::Upgrade => "Instance upgrade",
            Self::Delete => "Instance deletion",
            Self::ForceDelete => "Instance forced deletion",
            Self::Bind => "Binding creation",
            Self::Unbind => "Binding deletion",
            Self::Recreate => "Instance recreate",
        }
    }

    /// Verb used in "Currently unable to ..." messages.
    pub fn action_verb(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Upgrade => "upgrade",
            Self::Delete | Self::ForceDelete => "delete",
            Self::Bind => "bind",
            Self::Unbind => "unbind",
            Self::Recreate => "recreate",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Upgrade => write!(f, "upgrade"),
            Self::Delete => write!(f, "delete"),
            Self::ForceDelete => write!(f, "force-delete"),
            Self::Bind => write!(f, "bind"),
            Self::Unbind => write!(f, "unbind"),
            Self::Recreate => write!(f, "recreate"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "upgrade" => Ok(Self::Upgrade),
            "delete" => Ok(Self::Delete),
            "force-delete" => Ok(Self::ForceDelete),
            "bind" => Ok(Self::Bind),
            "unbind" => Ok(Self::Unbind),
            "recreate" => Ok(Self::Recreate),
            _ => Err(format!("Invalid operation type: {s}")),
        }
    }
}

/// A one-off job run against a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Errand {
    #[serde(rename = "Name", alias = "name", default)]
    pub name: String,
    #[serde(
        rename = "Instances",
        alias = "instances",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub instances: Vec<String>,
}

impl Errand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    pub fn with_instances(mut self, instances: Vec<String>) -> Self {
        self.instances = instances;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Continuation token contents.
///
/// An empty `backend_context_id` means the operation is a single backend task.
/// A present one groups every task of a multi-step errand sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationData {
    #[serde(rename = "OperationType")]
    pub operation_type: OperationType,

    #[serde(rename = "BackendTaskID", default)]
    pub backend_task_id: u64,

    #[serde(
        rename = "BackendContextID",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub backend_context_id: String,

    #[serde(rename = "PlanID", default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    #[serde(
        rename = "PostDeployErrand",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub post_deploy_errand: Option<Errand>,

    /// Legacy single pre-delete errand. Older tokens carry this instead of `Errands`.
    #[serde(
        rename = "PreDeleteErrand",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_pre_delete_errand: Option<Errand>,

    #[serde(rename = "Errands", default, skip_serializing_if = "Vec::is_empty")]
    pub pre_delete_errands: Vec<Errand>,
}

impl OperationData {
    pub fn new(operation_type: OperationType, backend_task_id: u64) -> Self {
        Self {
            operation_type,
            backend_task_id,
            backend_context_id: String::new(),
            plan_id: None,
            post_deploy_errand: None,
            legacy_pre_delete_errand: None,
            pre_delete_errands: Vec::new(),
        }
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.backend_context_id = context_id.into();
        self
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn with_post_deploy_errand(mut self, errand: Errand) -> Self {
        self.post_deploy_errand = Some(errand);
        self
    }

    pub fn with_pre_delete_errands(mut self, errands: Vec<Errand>) -> Self {
        self.pre_delete_errands = errands;
        self
    }

    pub fn has_context(&self) -> bool {
        !self.backend_context_id.is_empty()
    }

    /// Pre-delete errands in run order, whichever wire form carried them.
    pub fn effective_pre_delete_errands(&self) -> Vec<Errand> {
        if !self.pre_delete_errands.is_empty() {
            return self.pre_delete_errands.clone();
        }
        match &self.legacy_pre_delete_errand {
            Some(errand) if !errand.is_empty() => vec![errand.clone()],
            _ => Vec::new(),
        }
    }
}
