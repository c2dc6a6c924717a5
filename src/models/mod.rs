//! # Models
//!
//! Value types shared by the orchestration core: continuation tokens,
//! backend tasks, catalog plans and OSB request/response shapes.

pub mod operation;
pub mod osb;
pub mod plan;
pub mod task;

pub use operation::{Errand, OperationData, OperationType};
pub use osb::{
    BindDetails, Binding, Deployment, DeploymentTopology, DeprovisionDetails,
    DeprovisionServiceSpec, LastOperation, LastOperationState, ProvisionDetails,
    ProvisionedServiceSpec, UnbindDetails, UpdateDetails, UpdateServiceSpec,
};
pub use plan::{
    LifecycleErrands, Plan, PlanQuota, Quotas, ResourceCost, ResourceQuota, ServiceOffering,
};
pub use task::{BackendTask, TaskOutcome, TaskState};
