//! # Lifecycle Runner
//!
//! Reconstructs where a multi-task operation stands using nothing but the
//! backend's task history, and advances it by at most one submission per poll.
//!
//! ## Overview
//!
//! The broker persists no workflow state. For an operation with a context ID,
//! the number of backend tasks sharing that context is the cursor:
//!
//! ```text
//! post-deploy (create/update/upgrade/recreate)
//!   [deploy]                 deploy running      -> return deploy task
//!   [deploy:done]            deploy finished     -> submit post-deploy errand
//!   [deploy, errand]         errand submitted    -> return errand task
//!
//! pre-delete (delete)
//!   [e0]                     errand 0 running    -> return it
//!   [e0:done]        (N>1)   errand 0 finished   -> submit errand 1
//!   [e0..eN-1:done]          chain finished      -> submit deployment delete
//!   [e0..eN-1, delete]       delete submitted    -> return delete task
//! ```
//!
//! Polling the same token repeatedly is safe: a submission only happens when
//! the latest task is done and the task count says the next step has not been
//! submitted yet.

use crate::client::{BackendError, DeploymentBackend};
use crate::models::{BackendTask, Errand, OperationData, OperationType, ServiceOffering};
use crate::orchestration::request_context::RequestContext;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("no tasks found for context id: {context_id}")]
    NoTasksForContext { context_id: String },

    #[error("unexpected tasks found with context id: {context_id}, tasks: {task_ids:?}")]
    UnexpectedTasks {
        context_id: String,
        task_ids: Vec<u64>,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct LifecycleRunner {
    backend: Arc<dyn DeploymentBackend>,
    offering: Arc<ServiceOffering>,
}

impl std::fmt::Debug for LifecycleRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRunner")
            .field("offering", &self.offering.id)
            .finish()
    }
}

impl LifecycleRunner {
    pub fn new(backend: Arc<dyn DeploymentBackend>, offering: Arc<ServiceOffering>) -> Self {
        Self { backend, offering }
    }

    /// Current task for the operation described by `data`, submitting the next
    /// lifecycle step first when the previous one has finished.
    pub async fn get_task(
        &self,
        deployment_name: &str,
        data: &OperationData,
        ctx: &RequestContext,
    ) -> Result<BackendTask, LifecycleError> {
        if !data.has_context() {
            return self.fetch_task(data.backend_task_id, ctx).await;
        }

        match data.operation_type {
            op if op.is_post_deploy() => self.advance_post_deploy(deployment_name, data, ctx).await,
            OperationType::Delete => self.advance_pre_delete(deployment_name, data, ctx).await,
            _ => self.fetch_task(data.backend_task_id, ctx).await,
        }
    }

    async fn advance_post_deploy(
        &self,
        deployment_name: &str,
        data: &OperationData,
        ctx: &RequestContext,
    ) -> Result<BackendTask, LifecycleError> {
        let context_id = data.backend_context_id.as_str();
        let mut tasks = self.tasks_for_context(deployment_name, context_id, ctx).await?;

        match tasks.len() {
            1 => {
                let deploy_task = tasks.remove(0);
                if !deploy_task.is_done() {
                    return Ok(deploy_task);
                }

                match self.post_deploy_errand(data) {
                    Some(errand) => {
                        info!(
                            deployment = %deployment_name,
                            context_id = %context_id,
                            errand = %errand.name,
                            "submitting post-deploy errand"
                        );
                        self.run_errand(deployment_name, &errand, context_id, ctx)
                            .await
                    }
                    None => Ok(deploy_task),
                }
            }
            2 => Ok(tasks.remove(1)),
            _ => Err(LifecycleError::UnexpectedTasks {
                context_id: context_id.to_string(),
                task_ids: tasks.iter().map(|task| task.id).collect(),
            }),
        }
    }

    async fn advance_pre_delete(
        &self,
        deployment_name: &str,
        data: &OperationData,
        ctx: &RequestContext,
    ) -> Result<BackendTask, LifecycleError> {
        let context_id = data.backend_context_id.as_str();
        let mut tasks = self.tasks_for_context(deployment_name, context_id, ctx).await?;
        let completed = tasks.len();

        let Some(latest) = tasks.pop() else {
            return Err(LifecycleError::NoTasksForContext {
                context_id: context_id.to_string(),
            });
        };
        if !latest.is_done() {
            return Ok(latest);
        }

        // A legacy token carries its single errand outside the list; the
        // effective list folds it in so one finished task ends the chain.
        let errands = data.effective_pre_delete_errands();

        if completed == errands.len() {
            info!(
                deployment = %deployment_name,
                context_id = %context_id,
                errands = errands.len(),
                "pre-delete errands finished, submitting deployment delete"
            );
            let task_id = ctx
                .bounded(
                    "submit delete",
                    self.backend.submit_delete(deployment_name, context_id, false),
                )
                .await?;
            return self.fetch_task(task_id, ctx).await;
        }

        match errands.get(completed) {
            Some(next) => {
                info!(
                    deployment = %deployment_name,
                    context_id = %context_id,
                    errand = %next.name,
                    position = completed + 1,
                    "submitting next pre-delete errand"
                );
                self.run_errand(deployment_name, next, context_id, ctx).await
            }
            // Delete already submitted
            None => Ok(latest),
        }
    }

    /// Errand named in the token, else the one configured on the token's plan
    fn post_deploy_errand(&self, data: &OperationData) -> Option<Errand> {
        if let Some(errand) = data.post_deploy_errand.as_ref().filter(|e| !e.is_empty()) {
            return Some(errand.clone());
        }

        let Some(plan_id) = data.plan_id.as_deref() else {
            info!(
                context_id = %data.backend_context_id,
                "no post-deploy errand in operation data, returning deploy task"
            );
            return None;
        };

        match self.offering.find_plan(plan_id) {
            Some(plan) => match plan.post_deploy_errand() {
                Some(errand) => Some(errand.clone()),
                None => {
                    info!(plan_id = %plan_id, "plan has no post-deploy errand, returning deploy task");
                    None
                }
            },
            None => {
                warn!(plan_id = %plan_id, "plan not found while resolving post-deploy errand");
                None
            }
        }
    }

    /// Submit an errand and fetch the task it produced
    async fn run_errand(
        &self,
        deployment_name: &str,
        errand: &Errand,
        context_id: &str,
        ctx: &RequestContext,
    ) -> Result<BackendTask, LifecycleError> {
        let task_id = ctx
            .bounded(
                "submit errand",
                self.backend.submit_errand(deployment_name, errand, context_id),
            )
            .await?;
        debug!(deployment = %deployment_name, errand = %errand.name, task_id, "errand submitted");
        self.fetch_task(task_id, ctx).await
    }

    async fn tasks_for_context(
        &self,
        deployment_name: &str,
        context_id: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<BackendTask>, LifecycleError> {
        let tasks = ctx
            .bounded(
                "get tasks by context",
                self.backend.get_tasks_by_context(deployment_name, context_id),
            )
            .await?;
        if tasks.is_empty() {
            return Err(LifecycleError::NoTasksForContext {
                context_id: context_id.to_string(),
            });
        }
        Ok(tasks)
    }

    async fn fetch_task(
        &self,
        task_id: u64,
        ctx: &RequestContext,
    ) -> Result<BackendTask, LifecycleError> {
        Ok(ctx
            .bounded("get task", self.backend.get_task(task_id))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Plan, TaskState};
    use crate::test_helpers::{BackendCall, FakeDeploymentBackend, FIRST_SUBMITTED_TASK_ID};

    const DEPLOYMENT: &str = "service-instance_i1";
    const CONTEXT: &str = "ctx-1";

    fn offering() -> Arc<ServiceOffering> {
        let mut with_errand = Plan::new("with-errand", "with errand");
        with_errand.lifecycle_errands.post_deploy = Some(Errand::new("smoke-tests"));
        let plain = Plan::new("plain", "plain");
        Arc::new(ServiceOffering {
            id: "svc".to_string(),
            name: "redis".to_string(),
            global_quotas: Default::default(),
            plans: vec![with_errand, plain],
        })
    }

    fn runner(backend: &Arc<FakeDeploymentBackend>) -> LifecycleRunner {
        LifecycleRunner::new(backend.clone(), offering())
    }

    fn seed(backend: &FakeDeploymentBackend, id: u64, state: TaskState) {
        backend.add_task(DEPLOYMENT, BackendTask::new(id, state).with_context(CONTEXT));
    }

    fn errands(n: usize) -> Vec<Errand> {
        (0..n).map(|i| Errand::new(format!("errand-{i}"))).collect()
    }

    #[tokio::test]
    async fn test_without_context_fetches_task_by_id() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        backend.add_task(DEPLOYMENT, BackendTask::new(7, TaskState::Processing));

        let task = runner(&backend)
            .get_task(DEPLOYMENT, &OperationData::new(OperationType::Create, 7), &RequestContext::new())
            .await
            .unwrap();

        assert_eq!(task.id, 7);
        assert_eq!(backend.calls(), vec![BackendCall::GetTask(7)]);
    }

    #[tokio::test]
    async fn test_post_deploy_incomplete_deploy_is_returned() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Processing);
        let data = OperationData::new(OperationType::Create, 1)
            .with_context(CONTEXT)
            .with_post_deploy_errand(Errand::new("smoke-tests"));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.id, 1);
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_post_deploy_done_runs_token_errand() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        let data = OperationData::new(OperationType::Update, 1)
            .with_context(CONTEXT)
            .with_post_deploy_errand(Errand::new("health-check"));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.id, FIRST_SUBMITTED_TASK_ID);
        assert_eq!(task.context_id, CONTEXT);
        assert_eq!(
            backend.submissions(),
            vec![BackendCall::SubmitErrand {
                deployment: DEPLOYMENT.to_string(),
                errand: Errand::new("health-check"),
                context_id: CONTEXT.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_post_deploy_falls_back_to_plan_errand() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        let data = OperationData::new(OperationType::Create, 1)
            .with_context(CONTEXT)
            .with_plan("with-errand");

        runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        match backend.submissions().as_slice() {
            [BackendCall::SubmitErrand { errand, .. }] => assert_eq!(errand.name, "smoke-tests"),
            other => panic!("unexpected submissions: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_deploy_without_errand_returns_deploy_task() {
        for plan_id in [Some("plain"), Some("missing"), None] {
            let backend = Arc::new(FakeDeploymentBackend::new());
            seed(&backend, 1, TaskState::Done);
            let mut data = OperationData::new(OperationType::Create, 1).with_context(CONTEXT);
            data.plan_id = plan_id.map(str::to_string);

            let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

            assert_eq!(task.id, 1);
            assert!(backend.submissions().is_empty());
        }
    }

    #[tokio::test]
    async fn test_post_deploy_failed_deploy_does_not_run_errand() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Error);
        let data = OperationData::new(OperationType::Create, 1)
            .with_context(CONTEXT)
            .with_post_deploy_errand(Errand::new("smoke-tests"));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.state, TaskState::Error);
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_post_deploy_two_tasks_is_idempotent() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        seed(&backend, 2, TaskState::Done);
        let data = OperationData::new(OperationType::Create, 1)
            .with_context(CONTEXT)
            .with_post_deploy_errand(Errand::new("smoke-tests"));
        let runner = runner(&backend);

        for _ in 0..3 {
            let task = runner.get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();
            assert_eq!(task.id, 2);
            assert_eq!(task.state, TaskState::Done);
        }
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_post_deploy_too_many_tasks_is_fatal() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        for id in 1..=3 {
            seed(&backend, id, TaskState::Done);
        }
        let data = OperationData::new(OperationType::Upgrade, 1).with_context(CONTEXT);

        let err = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap_err();

        assert_eq!(
            err,
            LifecycleError::UnexpectedTasks {
                context_id: CONTEXT.to_string(),
                task_ids: vec![1, 2, 3]
            }
        );
    }

    #[tokio::test]
    async fn test_no_tasks_for_context_is_fatal() {
        for op in [OperationType::Create, OperationType::Delete] {
            let backend = Arc::new(FakeDeploymentBackend::new());
            let data = OperationData::new(op, 1).with_context(CONTEXT);

            let err = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap_err();

            assert_eq!(err.to_string(), "no tasks found for context id: ctx-1");
        }
    }

    #[tokio::test]
    async fn test_pre_delete_submits_errand_matching_task_count() {
        let n = 4;
        for k in 1..n {
            let backend = Arc::new(FakeDeploymentBackend::new());
            for id in 1..=k as u64 {
                seed(&backend, id, TaskState::Done);
            }
            let data = OperationData::new(OperationType::Delete, 1)
                .with_context(CONTEXT)
                .with_pre_delete_errands(errands(n));

            runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

            assert_eq!(
                backend.submissions(),
                vec![BackendCall::SubmitErrand {
                    deployment: DEPLOYMENT.to_string(),
                    errand: Errand::new(format!("errand-{k}")),
                    context_id: CONTEXT.to_string(),
                }],
                "with {k} completed tasks"
            );
        }
    }

    #[tokio::test]
    async fn test_pre_delete_running_errand_is_returned() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        seed(&backend, 2, TaskState::Processing);
        let data = OperationData::new(OperationType::Delete, 1)
            .with_context(CONTEXT)
            .with_pre_delete_errands(errands(3));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.id, 2);
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_pre_delete_failed_errand_stops_chain() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Error);
        let data = OperationData::new(OperationType::Delete, 1)
            .with_context(CONTEXT)
            .with_pre_delete_errands(errands(2));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.state, TaskState::Error);
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_pre_delete_chain_finished_submits_delete() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        backend.add_deployment(DEPLOYMENT, "name: x");
        seed(&backend, 1, TaskState::Done);
        seed(&backend, 2, TaskState::Done);
        let data = OperationData::new(OperationType::Delete, 1)
            .with_context(CONTEXT)
            .with_pre_delete_errands(errands(2));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.id, FIRST_SUBMITTED_TASK_ID);
        assert_eq!(task.context_id, CONTEXT);
        assert_eq!(
            backend.submissions(),
            vec![BackendCall::SubmitDelete {
                deployment: DEPLOYMENT.to_string(),
                context_id: CONTEXT.to_string(),
                force: false,
            }]
        );
        assert!(!backend.has_deployment(DEPLOYMENT));
    }

    #[tokio::test]
    async fn test_pre_delete_after_delete_returns_latest() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        seed(&backend, 2, TaskState::Done);
        let data = OperationData::new(OperationType::Delete, 1)
            .with_context(CONTEXT)
            .with_pre_delete_errands(errands(1));

        let task = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert_eq!(task.id, 2);
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_single_errand_token_submits_delete() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        let mut data = OperationData::new(OperationType::Delete, 1).with_context(CONTEXT);
        data.legacy_pre_delete_errand = Some(Errand::new("cleanup"));

        runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap();

        assert!(matches!(
            backend.submissions().as_slice(),
            [BackendCall::SubmitDelete { force: false, .. }]
        ));
    }

    #[tokio::test]
    async fn test_submission_errors_propagate_untranslated() {
        let backend = Arc::new(FakeDeploymentBackend::new());
        seed(&backend, 1, TaskState::Done);
        backend.fail(
            "submit_errand",
            BackendError::RequestFailed("director unreachable".to_string()),
        );
        let data = OperationData::new(OperationType::Create, 1)
            .with_context(CONTEXT)
            .with_post_deploy_errand(Errand::new("smoke-tests"));

        let err = runner(&backend).get_task(DEPLOYMENT, &data, &RequestContext::new()).await.unwrap_err();

        assert_eq!(
            err,
            LifecycleError::Backend(BackendError::RequestFailed(
                "director unreachable".to_string()
            ))
        );
    }
}
