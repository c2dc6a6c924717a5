//! Scriptable in-memory deployment backend.

use crate::client::{BackendError, DeployOutcome, DeployRequest, DeploymentBackend};
use crate::models::{
    BackendTask, Deployment, DeploymentTopology, Errand, OperationType, TaskState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// ID of the first task created by a submission when no seeded task is higher
pub const FIRST_SUBMITTED_TASK_ID: u64 = 100;

/// One recorded call against the fake
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SubmitDeploy(DeployRequest),
    SubmitErrand {
        deployment: String,
        errand: Errand,
        context_id: String,
    },
    SubmitDelete {
        deployment: String,
        context_id: String,
        force: bool,
    },
    SubmitRecreate {
        deployment: String,
        context_id: String,
    },
    GetTask(u64),
    GetTasksByContext {
        deployment: String,
        context_id: String,
    },
    GetTasksInProgress(String),
    GetDeployment(String),
    GetVms(String),
    DeleteConfigs(String),
}

impl BackendCall {
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            BackendCall::SubmitDeploy(_)
                | BackendCall::SubmitErrand { .. }
                | BackendCall::SubmitDelete { .. }
                | BackendCall::SubmitRecreate { .. }
        )
    }
}

#[derive(Debug)]
struct BackendState {
    deployments: HashMap<String, Deployment>,
    vms: HashMap<String, DeploymentTopology>,
    tasks: BTreeMap<u64, BackendTask>,
    task_deployments: HashMap<u64, String>,
    next_task_id: u64,
    submitted_state: TaskState,
    failures: HashMap<&'static str, BackendError>,
    deploy_delay: Option<Duration>,
    calls: Vec<BackendCall>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            deployments: HashMap::new(),
            vms: HashMap::new(),
            tasks: BTreeMap::new(),
            task_deployments: HashMap::new(),
            next_task_id: FIRST_SUBMITTED_TASK_ID,
            submitted_state: TaskState::Queued,
            failures: HashMap::new(),
            deploy_delay: None,
            calls: Vec::new(),
        }
    }
}

/// In-memory [`DeploymentBackend`] that records every call.
///
/// Failures are scripted per method name (`"submit_deploy"`, `"get_task"`, ...)
/// and returned on every call until cleared.
#[derive(Debug, Default)]
pub struct FakeDeploymentBackend {
    state: Mutex<BackendState>,
}

impl FakeDeploymentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_deployment(&self, name: &str, manifest: &str) {
        self.state.lock().deployments.insert(
            name.to_string(),
            Deployment {
                name: name.to_string(),
                manifest: manifest.to_string(),
            },
        );
    }

    pub fn set_vms(&self, name: &str, topology: DeploymentTopology) {
        self.state.lock().vms.insert(name.to_string(), topology);
    }

    /// Seed a task that belongs to `deployment`
    pub fn add_task(&self, deployment: &str, task: BackendTask) {
        let mut state = self.state.lock();
        state.next_task_id = state.next_task_id.max(task.id + 1);
        state.task_deployments.insert(task.id, deployment.to_string());
        state.tasks.insert(task.id, task);
    }

    pub fn set_task_state(&self, task_id: u64, task_state: TaskState) {
        if let Some(task) = self.state.lock().tasks.get_mut(&task_id) {
            task.state = task_state;
        }
    }

    /// State given to tasks created by later submissions
    pub fn set_submitted_task_state(&self, task_state: TaskState) {
        self.state.lock().submitted_state = task_state;
    }

    pub fn fail(&self, method: &'static str, err: BackendError) {
        self.state.lock().failures.insert(method, err);
    }

    pub fn clear_failure(&self, method: &'static str) {
        self.state.lock().failures.remove(method);
    }

    pub fn set_deploy_delay(&self, delay: Duration) {
        self.state.lock().deploy_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn submissions(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(BackendCall::is_submission)
            .collect()
    }

    pub fn deploy_requests(&self) -> Vec<DeployRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::SubmitDeploy(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn task(&self, task_id: u64) -> Option<BackendTask> {
        self.state.lock().tasks.get(&task_id).cloned()
    }

    pub fn has_deployment(&self, name: &str) -> bool {
        self.state.lock().deployments.contains_key(name)
    }

    fn record(&self, call: BackendCall, method: &'static str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn create_task(&self, deployment: &str, context_id: &str, description: &str) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_task_id;
        state.next_task_id += 1;
        let task = BackendTask::new(id, state.submitted_state)
            .with_context(context_id)
            .with_description(description);
        state.tasks.insert(id, task);
        state.task_deployments.insert(id, deployment.to_string());
        id
    }
}

#[async_trait]
impl DeploymentBackend for FakeDeploymentBackend {
    async fn submit_deploy(&self, request: DeployRequest) -> Result<DeployOutcome, BackendError> {
        self.record(BackendCall::SubmitDeploy(request.clone()), "submit_deploy")?;

        if request.operation != OperationType::Create && !self.has_deployment(&request.deployment_name)
        {
            return Err(BackendError::DeploymentNotFound(request.deployment_name));
        }

        let delay = self.state.lock().deploy_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let manifest = format!("name: {}\nplan: {}\n", request.deployment_name, request.plan_id);
        self.add_deployment(&request.deployment_name, &manifest);
        let task_id = self.create_task(
            &request.deployment_name,
            &request.context_id,
            &format!("deploy {}", request.deployment_name),
        );
        Ok(DeployOutcome { task_id, manifest })
    }

    async fn submit_errand(
        &self,
        deployment_name: &str,
        errand: &Errand,
        context_id: &str,
    ) -> Result<u64, BackendError> {
        self.record(
            BackendCall::SubmitErrand {
                deployment: deployment_name.to_string(),
                errand: errand.clone(),
                context_id: context_id.to_string(),
            },
            "submit_errand",
        )?;
        Ok(self.create_task(
            deployment_name,
            context_id,
            &format!("run errand {}", errand.name),
        ))
    }

    async fn submit_delete(
        &self,
        deployment_name: &str,
        context_id: &str,
        force: bool,
    ) -> Result<u64, BackendError> {
        self.record(
            BackendCall::SubmitDelete {
                deployment: deployment_name.to_string(),
                context_id: context_id.to_string(),
                force,
            },
            "submit_delete",
        )?;
        self.state.lock().deployments.remove(deployment_name);
        Ok(self.create_task(
            deployment_name,
            context_id,
            &format!("delete deployment {deployment_name}"),
        ))
    }

    async fn submit_recreate(
        &self,
        deployment_name: &str,
        context_id: &str,
    ) -> Result<u64, BackendError> {
        self.record(
            BackendCall::SubmitRecreate {
                deployment: deployment_name.to_string(),
                context_id: context_id.to_string(),
            },
            "submit_recreate",
        )?;
        Ok(self.create_task(
            deployment_name,
            context_id,
            &format!("recreate deployment {deployment_name}"),
        ))
    }

    async fn get_task(&self, task_id: u64) -> Result<BackendTask, BackendError> {
        self.record(BackendCall::GetTask(task_id), "get_task")?;
        self.state
            .lock()
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(BackendError::TaskNotFound(task_id))
    }

    async fn get_tasks_by_context(
        &self,
        deployment_name: &str,
        context_id: &str,
    ) -> Result<Vec<BackendTask>, BackendError> {
        self.record(
            BackendCall::GetTasksByContext {
                deployment: deployment_name.to_string(),
                context_id: context_id.to_string(),
            },
            "get_tasks_by_context",
        )?;
        let state = self.state.lock();
        Ok(state
            .tasks
            .values()
            .filter(|task| {
                task.context_id == context_id
                    && state.task_deployments.get(&task.id).map(String::as_str)
                        == Some(deployment_name)
            })
            .cloned()
            .collect())
    }

    async fn get_tasks_in_progress(
        &self,
        deployment_name: &str,
    ) -> Result<Vec<BackendTask>, BackendError> {
        self.record(
            BackendCall::GetTasksInProgress(deployment_name.to_string()),
            "get_tasks_in_progress",
        )?;
        let state = self.state.lock();
        Ok(state
            .tasks
            .values()
            .filter(|task| {
                !task.state.is_terminal()
                    && state.task_deployments.get(&task.id).map(String::as_str)
                        == Some(deployment_name)
            })
            .cloned()
            .collect())
    }

    async fn get_deployment(
        &self,
        deployment_name: &str,
    ) -> Result<Option<Deployment>, BackendError> {
        self.record(
            BackendCall::GetDeployment(deployment_name.to_string()),
            "get_deployment",
        )?;
        Ok(self.state.lock().deployments.get(deployment_name).cloned())
    }

    async fn get_vms(&self, deployment_name: &str) -> Result<DeploymentTopology, BackendError> {
        self.record(BackendCall::GetVms(deployment_name.to_string()), "get_vms")?;
        Ok(self
            .state
            .lock()
            .vms
            .get(deployment_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_configs(&self, deployment_name: &str) -> Result<(), BackendError> {
        self.record(
            BackendCall::DeleteConfigs(deployment_name.to_string()),
            "delete_configs",
        )
    }
}
