use super::Broker;
use crate::error::{OsbError, Result};
use crate::logging::log_broker_operation;
use crate::models::{DeprovisionDetails, DeprovisionServiceSpec, OperationData, OperationType};
use crate::orchestration::error_classifier::ErrorContext;
use crate::orchestration::request_context::RequestContext;
use tracing::{info, Instrument};
use uuid::Uuid;

impl Broker {
    /// Start deleting a service instance.
    ///
    /// When the plan has pre-delete errands the first one is submitted here and
    /// the rest of the chain is driven by later last-operation polls. A missing
    /// deployment still gets its leftover configs and secrets removed before
    /// "does not exist" is returned.
    pub async fn deprovision(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
        async_allowed: bool,
        ctx: &RequestContext,
    ) -> Result<DeprovisionServiceSpec> {
        let operation_type = if details.force {
            OperationType::ForceDelete
        } else {
            OperationType::Delete
        };
        let span = Self::request_span(ctx, instance_id, operation_type);
        self.deprovision_in_span(instance_id, details, async_allowed, operation_type, ctx)
            .instrument(span)
            .await
    }

    async fn deprovision_in_span(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
        async_allowed: bool,
        operation_type: OperationType,
        ctx: &RequestContext,
    ) -> Result<DeprovisionServiceSpec> {
        let ectx = self.error_context(instance_id, ctx, operation_type);

        if !async_allowed {
            return Err(self.classifier.sentinel(
                OsbError::AsyncRequired,
                &ectx,
                "deprovision requested without accepts_incomplete",
            ));
        }

        let _guard = self.lock_instance(instance_id, &ectx)?;
        let deployment_name = self.deployment_name(instance_id);

        let existing = ctx
            .bounded("get deployment", self.backend.get_deployment(&deployment_name))
            .await
            .map_err(|err| self.classifier.classify_backend(err, &ectx))?;
        if existing.is_none() {
            return Err(self
                .deprovision_missing(instance_id, &deployment_name, &ectx, ctx)
                .await);
        }

        self.ensure_no_tasks_in_progress(&deployment_name, &ectx, ctx)
            .await?;
        let plan = self.resolve_plan(&details.plan_id, &ectx)?;

        let data = if details.force {
            let task_id = self.submit_delete(&deployment_name, "", true, &ectx, ctx).await?;
            OperationData::new(OperationType::ForceDelete, task_id)
        } else if let Some(first) = plan.pre_delete_errands().first() {
            let context_id = Uuid::new_v4().to_string();
            let task_id = ctx
                .bounded(
                    "submit errand",
                    self.backend
                        .submit_errand(&deployment_name, first, &context_id),
                )
                .await
                .map_err(|err| self.classifier.classify_backend(err, &ectx))?;
            info!(
                deployment = %deployment_name,
                errand = %first.name,
                task_id,
                context_id = %context_id,
                "first pre-delete errand submitted"
            );
            OperationData::new(OperationType::Delete, task_id)
                .with_context(context_id)
                .with_plan(&plan.id)
                .with_pre_delete_errands(plan.pre_delete_errands().to_vec())
        } else {
            let task_id = self.submit_delete(&deployment_name, "", false, &ectx, ctx).await?;
            OperationData::new(OperationType::Delete, task_id)
        };

        let ectx = ectx.with_task(data.backend_task_id);
        let operation_data = self.encode_token(&data, &ectx)?;

        log_broker_operation(
            "deprovision",
            instance_id,
            &ctx.request_id,
            "accepted",
            Some(&format!("task {}", data.backend_task_id)),
        );

        Ok(DeprovisionServiceSpec {
            is_async: true,
            operation_data,
        })
    }

    async fn submit_delete(
        &self,
        deployment_name: &str,
        context_id: &str,
        force: bool,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> Result<u64> {
        let task_id = ctx
            .bounded(
                "submit delete",
                self.backend.submit_delete(deployment_name, context_id, force),
            )
            .await
            .map_err(|err| self.classifier.classify_backend(err, ectx))?;
        info!(deployment = %deployment_name, task_id, force, "delete submitted");
        Ok(task_id)
    }

    /// Remove orphaned configs and secrets, then report the instance as missing.
    /// A cleanup failure replaces the "does not exist" error.
    async fn deprovision_missing(
        &self,
        instance_id: &str,
        deployment_name: &str,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> crate::error::BrokerError {
        if let Err(err) = self.cleanup_deployment(deployment_name, ectx, ctx).await {
            return err;
        }

        self.classifier.displayable_sentinel(
            ectx,
            OsbError::InstanceDoesNotExist,
            format!("error deprovisioning: instance {instance_id}, not found."),
        )
    }

    /// Delete backend configs and stored secrets left behind by a deployment
    pub(super) async fn cleanup_deployment(
        &self,
        deployment_name: &str,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> Result<()> {
        ctx.bounded("delete configs", self.backend.delete_configs(deployment_name))
            .await
            .map_err(|err| self.classifier.classify_backend(err, ectx))?;

        ctx.bounded(
            "delete secrets",
            self.secrets.delete_secrets_for_deployment(deployment_name),
        )
        .await
        .map_err(|err| {
            self.classifier.generic(
                ectx,
                format!("error deleting secrets for deployment {deployment_name}: {err}"),
            )
        })?;

        info!(deployment = %deployment_name, "removed configs and secrets");
        Ok(())
    }
}
