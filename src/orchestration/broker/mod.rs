//! # Broker
//!
//! Composes the token codec, lifecycle runner, quota engine, lock registries
//! and error classifier into the OSB verbs.
//!
//! ## Request flow
//!
//! ```text
//! provision / update / upgrade / recreate / deprovision
//!   ┌──────────────┐  ┌─────────────┐  ┌──────────────┐  ┌──────────────┐  ┌───────────┐
//!   │ instance lock│─▶│ plan lookup │─▶│ quota checks │─▶│ backend call │─▶│ encode    │
//!   │ (fail fast)  │  │ (fatal)     │  │ (if limited) │  │ (classified) │  │ token     │
//!   └──────────────┘  └─────────────┘  └──────────────┘  └──────────────┘  └───────────┘
//!
//! bind / unbind
//!   binding lock ─▶ deployment lookup ─▶ secrets (best effort) ─▶ service adapter
//! ```
//!
//! Every verb runs inside a `broker_request` span. Lock guards are dropped on
//! every exit path, including errors.

mod binding;
mod deprovision;
mod last_operation;
mod provision;
mod update;

use crate::client::{DeploymentBackend, InstanceCounter, SecretManager, ServiceAdapter};
use crate::config::BrokerConfig;
use crate::error::Result;
use crate::models::{OperationData, OperationType, Plan, ServiceOffering};
use crate::orchestration::error_classifier::{ErrorClassifier, ErrorContext};
use crate::orchestration::instance_lock::{InstanceLockGuard, InstanceLockRegistry};
use crate::orchestration::lifecycle_runner::LifecycleRunner;
use crate::orchestration::operation_token;
use crate::orchestration::quota_engine::{self, InstanceCounts};
use crate::orchestration::request_context::RequestContext;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info_span, Span};
use uuid::Uuid;

/// The collaborators a [`Broker`] drives
#[derive(Clone)]
pub struct BrokerClients {
    pub backend: Arc<dyn DeploymentBackend>,
    pub counter: Arc<dyn InstanceCounter>,
    pub adapter: Arc<dyn ServiceAdapter>,
    pub secrets: Arc<dyn SecretManager>,
}

pub struct Broker {
    config: Arc<BrokerConfig>,
    offering: Arc<ServiceOffering>,
    backend: Arc<dyn DeploymentBackend>,
    counter: Arc<dyn InstanceCounter>,
    adapter: Arc<dyn ServiceAdapter>,
    secrets: Arc<dyn SecretManager>,
    runner: LifecycleRunner,
    classifier: ErrorClassifier,
    instance_locks: Arc<InstanceLockRegistry>,
    binding_locks: Arc<InstanceLockRegistry>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("service", &self.offering.name)
            .field("deployment_prefix", &self.config.broker.deployment_prefix)
            .field("held_instance_locks", &self.instance_locks.held_count())
            .field("held_binding_locks", &self.binding_locks.held_count())
            .finish()
    }
}

impl Broker {
    /// Build a broker. Lock registries are created here and live as long as the broker.
    pub fn new(config: BrokerConfig, clients: BrokerClients) -> Self {
        let offering = Arc::new(config.service_catalog.clone());
        let runner = LifecycleRunner::new(Arc::clone(&clients.backend), Arc::clone(&offering));

        Self {
            config: Arc::new(config),
            offering,
            backend: clients.backend,
            counter: clients.counter,
            adapter: clients.adapter,
            secrets: clients.secrets,
            runner,
            classifier: ErrorClassifier::new(),
            instance_locks: InstanceLockRegistry::new("instance"),
            binding_locks: InstanceLockRegistry::new("binding"),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn instance_locks(&self) -> &Arc<InstanceLockRegistry> {
        &self.instance_locks
    }

    pub fn binding_locks(&self) -> &Arc<InstanceLockRegistry> {
        &self.binding_locks
    }

    fn deployment_name(&self, instance_id: &str) -> String {
        self.config.deployment_name(instance_id)
    }

    fn error_context(
        &self,
        instance_id: &str,
        ctx: &RequestContext,
        operation_type: OperationType,
    ) -> ErrorContext {
        ErrorContext::new(&self.offering.name, instance_id, &ctx.request_id)
            .with_operation(operation_type)
    }

    fn request_span(ctx: &RequestContext, instance_id: &str, operation: OperationType) -> Span {
        info_span!(
            "broker_request",
            request_id = %ctx.request_id,
            instance_id = %instance_id,
            operation = %operation,
        )
    }

    fn lock_instance(&self, instance_id: &str, ectx: &ErrorContext) -> Result<InstanceLockGuard> {
        self.instance_locks
            .try_acquire(instance_id)
            .map_err(|err| self.classifier.classify_lock(err, ectx))
    }

    fn resolve_plan(&self, plan_id: &str, ectx: &ErrorContext) -> Result<&Plan> {
        self.offering.find_plan(plan_id).ok_or_else(|| {
            self.classifier.sentinel(
                crate::error::OsbError::PlanNotFound {
                    plan_id: plan_id.to_string(),
                },
                ectx,
                &format!("plan {plan_id} not found in catalog"),
            )
        })
    }

    /// Fetch instance counts at most once and evaluate every quota layer.
    ///
    /// A global limit needs counts for every plan; otherwise a plan limit only
    /// needs the target plan's count. With neither, nothing is fetched.
    async fn check_quotas(
        &self,
        plan: &Plan,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> Result<()> {
        let global = self.offering.global_quota();

        let counts: InstanceCounts = if global.is_limited() {
            ctx.bounded(
                "count instances of service offering",
                self.counter.count_instances_of_service_offering(),
            )
            .await
            .map_err(|err| self.classifier.classify_backend(err, ectx))?
        } else if plan.quota().is_limited() {
            let count = ctx
                .bounded(
                    "count instances of plan",
                    self.counter.count_instances_of_plan(&plan.id),
                )
                .await
                .map_err(|err| self.classifier.classify_backend(err, ectx))?;
            HashMap::from([(plan.id.clone(), count)])
        } else {
            debug!(plan_id = %plan.id, "no quotas configured, skipping instance count");
            return Ok(());
        };

        quota_engine::check_quotas(plan, &self.offering.plans, &counts, &global)
            .map_err(|err| self.classifier.classify_quota(err, ectx))
    }

    /// Fails with a conflict when the deployment already has unfinished tasks
    async fn ensure_no_tasks_in_progress(
        &self,
        deployment_name: &str,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> Result<()> {
        let tasks = ctx
            .bounded(
                "get tasks in progress",
                self.backend.get_tasks_in_progress(deployment_name),
            )
            .await
            .map_err(|err| self.classifier.classify_backend(err, ectx))?;

        if tasks.is_empty() {
            return Ok(());
        }

        let task_ids: Vec<u64> = tasks.iter().map(|task| task.id).collect();
        debug!(deployment = %deployment_name, ?task_ids, "tasks in progress");
        Err(self.classifier.operation_in_progress(
            ectx,
            "An operation is in progress for your service instance. Please try again later.",
        ))
    }

    fn encode_token(&self, data: &OperationData, ectx: &ErrorContext) -> Result<String> {
        operation_token::encode(data)
            .map_err(|err| self.classifier.classify_operation_data(err, ectx))
    }
}

/// New context ID when the plan runs an errand after its deploy, else empty
fn post_deploy_context_id(plan: &Plan) -> String {
    match plan.post_deploy_errand() {
        Some(_) => Uuid::new_v4().to_string(),
        None => String::new(),
    }
}

/// Token for a deploy-style operation, carrying errand data only when a context exists
fn post_deploy_operation_data(
    operation_type: OperationType,
    task_id: u64,
    context_id: String,
    plan: &Plan,
) -> OperationData {
    let data = OperationData::new(operation_type, task_id);
    if context_id.is_empty() {
        return data;
    }

    let data = data.with_context(context_id).with_plan(&plan.id);
    match plan.post_deploy_errand() {
        Some(errand) => data.with_post_deploy_errand(errand.clone()),
        None => data,
    }
}
