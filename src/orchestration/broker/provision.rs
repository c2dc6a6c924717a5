use super::{post_deploy_context_id, post_deploy_operation_data, Broker};
use crate::client::{AdapterError, DeployRequest};
use crate::error::{OsbError, Result};
use crate::logging::log_broker_operation;
use crate::models::{OperationType, Plan, ProvisionDetails, ProvisionedServiceSpec};
use crate::orchestration::error_classifier::ErrorContext;
use crate::orchestration::request_context::RequestContext;
use tracing::{info, warn, Instrument};

impl Broker {
    /// Start deploying a new service instance.
    ///
    /// Fails with [`OsbError::InstanceAlreadyExists`] when a deployment for the
    /// instance is already known to the backend. Quotas are checked before the
    /// deploy is submitted, so a quota failure never reaches the backend.
    pub async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
        async_allowed: bool,
        ctx: &RequestContext,
    ) -> Result<ProvisionedServiceSpec> {
        let span = Self::request_span(ctx, instance_id, OperationType::Create);
        self.provision_in_span(instance_id, details, async_allowed, ctx)
            .instrument(span)
            .await
    }

    async fn provision_in_span(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
        async_allowed: bool,
        ctx: &RequestContext,
    ) -> Result<ProvisionedServiceSpec> {
        let ectx = self.error_context(instance_id, ctx, OperationType::Create);

        if !async_allowed {
            return Err(self.classifier.sentinel(
                OsbError::AsyncRequired,
                &ectx,
                "provision requested without accepts_incomplete",
            ));
        }

        let _guard = self.lock_instance(instance_id, &ectx)?;
        let plan = self.resolve_plan(&details.plan_id, &ectx)?;
        let deployment_name = self.deployment_name(instance_id);

        let existing = ctx
            .bounded("get deployment", self.backend.get_deployment(&deployment_name))
            .await
            .map_err(|err| self.classifier.classify_backend(err, &ectx))?;
        if existing.is_some() {
            return Err(self.classifier.sentinel(
                OsbError::InstanceAlreadyExists,
                &ectx,
                &format!("deployment {deployment_name} already exists"),
            ));
        }

        self.check_quotas(plan, &ectx, ctx).await?;

        let context_id = post_deploy_context_id(plan);
        let request = DeployRequest {
            deployment_name: deployment_name.clone(),
            plan_id: plan.id.clone(),
            previous_plan_id: None,
            parameters: details.parameters,
            context_id: context_id.clone(),
            operation: OperationType::Create,
        };
        let outcome = ctx
            .bounded("submit deploy", self.backend.submit_deploy(request))
            .await
            .map_err(|err| self.classifier.classify_backend(err, &ectx))?;

        let ectx = ectx.with_task(outcome.task_id);
        info!(
            deployment = %deployment_name,
            task_id = outcome.task_id,
            context_id = %context_id,
            plan_id = %plan.id,
            "deploy submitted"
        );

        let data =
            post_deploy_operation_data(OperationType::Create, outcome.task_id, context_id, plan);
        let operation_data = self.encode_token(&data, &ectx)?;
        let dashboard_url = self
            .dashboard_url(instance_id, plan, &outcome.manifest, &ectx, ctx)
            .await;

        log_broker_operation(
            "provision",
            instance_id,
            &ctx.request_id,
            "accepted",
            Some(&format!("task {}", outcome.task_id)),
        );

        Ok(ProvisionedServiceSpec {
            is_async: true,
            dashboard_url,
            operation_data,
        })
    }

    /// Best effort: any adapter failure degrades to an empty URL
    async fn dashboard_url(
        &self,
        instance_id: &str,
        plan: &Plan,
        manifest: &str,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> String {
        let result = ctx
            .bounded(
                "generate dashboard url",
                self.adapter.generate_dashboard_url(instance_id, plan, manifest),
            )
            .await;

        match result {
            Ok(url) => url,
            Err(AdapterError::NotImplemented) => String::new(),
            Err(err) => {
                warn!(
                    request_id = %ectx.request_id,
                    instance_id = %instance_id,
                    error = %err,
                    "failed to generate dashboard url, continuing without one"
                );
                String::new()
            }
        }
    }
}
