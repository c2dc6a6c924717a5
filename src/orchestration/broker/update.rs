use super::{post_deploy_context_id, post_deploy_operation_data, Broker};
use crate::client::DeployRequest;
use crate::error::{OsbError, Result};
use crate::logging::log_broker_operation;
use crate::models::{OperationData, OperationType, UpdateDetails, UpdateServiceSpec};
use crate::orchestration::request_context::RequestContext;
use tracing::{info, Instrument};

/// How a redeploy of an existing instance is gated and submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redeploy {
    /// Quotas only when the plan changes
    Update,
    /// Quotas always
    Upgrade,
    /// Recreate VMs in place, never quota-checked
    Recreate,
}

impl Redeploy {
    fn operation_type(self) -> OperationType {
        match self {
            Redeploy::Update => OperationType::Update,
            Redeploy::Upgrade => OperationType::Upgrade,
            Redeploy::Recreate => OperationType::Recreate,
        }
    }

    fn checks_quotas(self, details: &UpdateDetails) -> bool {
        match self {
            Redeploy::Update => details.is_plan_change(),
            Redeploy::Upgrade => true,
            Redeploy::Recreate => false,
        }
    }
}

impl Broker {
    /// Redeploy an instance with new parameters or a new plan
    pub async fn update(
        &self,
        instance_id: &str,
        details: UpdateDetails,
        async_allowed: bool,
        ctx: &RequestContext,
    ) -> Result<UpdateServiceSpec> {
        let span = Self::request_span(ctx, instance_id, OperationType::Update);
        self.update_in_span(instance_id, details, async_allowed, ctx)
            .instrument(span)
            .await
    }

    async fn update_in_span(
        &self,
        instance_id: &str,
        details: UpdateDetails,
        async_allowed: bool,
        ctx: &RequestContext,
    ) -> Result<UpdateServiceSpec> {
        if !async_allowed {
            let ectx = self.error_context(instance_id, ctx, OperationType::Update);
            return Err(self.classifier.sentinel(
                OsbError::AsyncRequired,
                &ectx,
                "update requested without accepts_incomplete",
            ));
        }

        let data = self
            .redeploy(instance_id, details, Redeploy::Update, ctx)
            .await?;
        let ectx = self
            .error_context(instance_id, ctx, OperationType::Update)
            .with_task(data.backend_task_id);
        Ok(UpdateServiceSpec {
            is_async: true,
            operation_data: self.encode_token(&data, &ectx)?,
        })
    }

    /// Redeploy an instance onto the current service release
    pub async fn upgrade(
        &self,
        instance_id: &str,
        details: UpdateDetails,
        ctx: &RequestContext,
    ) -> Result<OperationData> {
        let span = Self::request_span(ctx, instance_id, OperationType::Upgrade);
        self.redeploy(instance_id, details, Redeploy::Upgrade, ctx)
            .instrument(span)
            .await
    }

    /// Recreate every VM of an instance without changing its manifest
    pub async fn recreate(
        &self,
        instance_id: &str,
        plan_id: &str,
        ctx: &RequestContext,
    ) -> Result<OperationData> {
        let span = Self::request_span(ctx, instance_id, OperationType::Recreate);
        let details = UpdateDetails {
            plan_id: plan_id.to_string(),
            previous_plan_id: plan_id.to_string(),
            ..UpdateDetails::default()
        };
        self.redeploy(instance_id, details, Redeploy::Recreate, ctx)
            .instrument(span)
            .await
    }

    async fn redeploy(
        &self,
        instance_id: &str,
        details: UpdateDetails,
        kind: Redeploy,
        ctx: &RequestContext,
    ) -> Result<OperationData> {
        let operation_type = kind.operation_type();
        let ectx = self.error_context(instance_id, ctx, operation_type);

        let _guard = self.lock_instance(instance_id, &ectx)?;
        let plan = self.resolve_plan(&details.plan_id, &ectx)?;
        let deployment_name = self.deployment_name(instance_id);

        let existing = ctx
            .bounded("get deployment", self.backend.get_deployment(&deployment_name))
            .await
            .map_err(|err| self.classifier.classify_backend(err, &ectx))?;
        if existing.is_none() {
            return Err(self.classifier.sentinel(
                OsbError::InstanceDoesNotExist,
                &ectx,
                &format!("deployment {deployment_name} not found"),
            ));
        }

        self.ensure_no_tasks_in_progress(&deployment_name, &ectx, ctx)
            .await?;

        if kind.checks_quotas(&details) {
            self.check_quotas(plan, &ectx, ctx).await?;
        }

        let context_id = post_deploy_context_id(plan);
        let task_id = match kind {
            Redeploy::Recreate => ctx
                .bounded(
                    "submit recreate",
                    self.backend.submit_recreate(&deployment_name, &context_id),
                )
                .await
                .map_err(|err| self.classifier.classify_backend(err, &ectx))?,
            Redeploy::Update | Redeploy::Upgrade => {
                let previous_plan_id =
                    Some(details.previous_plan_id.clone()).filter(|id| !id.is_empty());
                let request = DeployRequest {
                    deployment_name: deployment_name.clone(),
                    plan_id: plan.id.clone(),
                    previous_plan_id,
                    parameters: details.parameters,
                    context_id: context_id.clone(),
                    operation: operation_type,
                };
                ctx.bounded("submit deploy", self.backend.submit_deploy(request))
                    .await
                    .map_err(|err| self.classifier.classify_backend(err, &ectx))?
                    .task_id
            }
        };

        info!(
            deployment = %deployment_name,
            task_id,
            context_id = %context_id,
            plan_id = %plan.id,
            operation = %operation_type,
            "redeploy submitted"
        );
        log_broker_operation(
            &operation_type.to_string(),
            instance_id,
            &ctx.request_id,
            "accepted",
            Some(&format!("task {task_id}")),
        );

        Ok(post_deploy_operation_data(
            operation_type,
            task_id,
            context_id,
            plan,
        ))
    }
}
