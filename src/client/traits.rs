//! # Collaborator Traits
//!
//! The external systems the broker core drives. Implementations live outside
//! this crate; `test_helpers` (feature `test-utils`) carries in-memory fakes.

use crate::client::errors::{AdapterError, BackendError, SecretsError};
use crate::models::{
    BackendTask, Binding, Deployment, DeploymentTopology, Errand, OperationType, Plan,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Everything the backend needs to submit a deploy task
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub deployment_name: String,
    pub plan_id: String,
    pub previous_plan_id: Option<String>,
    pub parameters: BTreeMap<String, Value>,
    /// Empty when the plan has no lifecycle errand
    pub context_id: String,
    pub operation: OperationType,
}

/// Result of a successfully submitted deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub task_id: u64,
    pub manifest: String,
}

/// Inputs to a binding create or delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingRequest {
    pub binding_id: String,
    pub deployment_topology: DeploymentTopology,
    pub manifest: String,
    pub request_params: BTreeMap<String, Value>,
    pub secrets: BTreeMap<String, String>,
}

/// Deployment automation backend
///
/// Tasks are owned by the backend. The broker submits work and polls; it never
/// mutates a task.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Submit a deploy; adapter failures during manifest generation surface as
    /// [`BackendError::Adapter`]
    async fn submit_deploy(&self, request: DeployRequest) -> Result<DeployOutcome, BackendError>;

    async fn submit_errand(
        &self,
        deployment_name: &str,
        errand: &Errand,
        context_id: &str,
    ) -> Result<u64, BackendError>;

    async fn submit_delete(
        &self,
        deployment_name: &str,
        context_id: &str,
        force: bool,
    ) -> Result<u64, BackendError>;

    async fn submit_recreate(
        &self,
        deployment_name: &str,
        context_id: &str,
    ) -> Result<u64, BackendError>;

    async fn get_task(&self, task_id: u64) -> Result<BackendTask, BackendError>;

    /// All tasks sharing a context, oldest first
    async fn get_tasks_by_context(
        &self,
        deployment_name: &str,
        context_id: &str,
    ) -> Result<Vec<BackendTask>, BackendError>;

    /// Tasks for the deployment that have not reached a terminal state
    async fn get_tasks_in_progress(
        &self,
        deployment_name: &str,
    ) -> Result<Vec<BackendTask>, BackendError>;

    async fn get_deployment(
        &self,
        deployment_name: &str,
    ) -> Result<Option<Deployment>, BackendError>;

    async fn get_vms(&self, deployment_name: &str) -> Result<DeploymentTopology, BackendError>;

    /// Remove backend configs left behind by a deployment
    async fn delete_configs(&self, deployment_name: &str) -> Result<(), BackendError>;
}

/// Platform-side count of provisioned instances
#[async_trait]
pub trait InstanceCounter: Send + Sync {
    async fn count_instances_of_plan(&self, plan_id: &str) -> Result<u32, BackendError>;

    /// Counts keyed by plan ID
    async fn count_instances_of_service_offering(
        &self,
    ) -> Result<HashMap<String, u32>, BackendError>;
}

/// Service-specific adapter
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    async fn generate_dashboard_url(
        &self,
        instance_id: &str,
        plan: &Plan,
        manifest: &str,
    ) -> Result<String, AdapterError>;

    async fn create_binding(&self, request: BindingRequest) -> Result<Binding, AdapterError>;

    async fn delete_binding(&self, request: BindingRequest) -> Result<(), AdapterError>;
}

/// Credential store holding secrets referenced by manifests
#[async_trait]
pub trait SecretManager: Send + Sync {
    async fn resolve_manifest_secrets(
        &self,
        manifest: &str,
    ) -> Result<BTreeMap<String, String>, SecretsError>;

    async fn delete_secrets_for_deployment(
        &self,
        deployment_name: &str,
    ) -> Result<(), SecretsError>;
}
