use super::Broker;
use crate::client::BindingRequest;
use crate::error::{OsbError, Result};
use crate::logging::log_broker_operation;
use crate::models::{BindDetails, Binding, OperationType, UnbindDetails};
use crate::orchestration::error_classifier::{AdapterSubject, ErrorContext};
use crate::orchestration::instance_lock::InstanceLockGuard;
use crate::orchestration::request_context::RequestContext;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn, Instrument};

impl Broker {
    /// Create credentials for an application through the service adapter
    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
        ctx: &RequestContext,
    ) -> Result<Binding> {
        let span = Self::request_span(ctx, instance_id, OperationType::Bind);
        self.bind_in_span(instance_id, binding_id, details, ctx)
            .instrument(span)
            .await
    }

    async fn bind_in_span(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
        ctx: &RequestContext,
    ) -> Result<Binding> {
        let ectx = self.error_context(instance_id, ctx, OperationType::Bind);
        let _guard = self.lock_binding(binding_id, &ectx)?;

        let mut parameters = details.parameters;
        if let Some(app_guid) = details.app_guid.filter(|guid| !guid.is_empty()) {
            parameters.insert("app_guid".to_string(), Value::String(app_guid));
        }
        let request = self
            .binding_request(instance_id, binding_id, parameters, &ectx, ctx)
            .await?;

        let binding = ctx
            .bounded("create binding", self.adapter.create_binding(request))
            .await
            .map_err(|err| {
                self.classifier
                    .classify_adapter(err, &ectx, AdapterSubject::Binding)
            })?;

        info!(binding_id = %binding_id, "binding created");
        log_broker_operation("bind", instance_id, &ctx.request_id, "succeeded", None);
        Ok(binding)
    }

    /// Revoke a binding's credentials through the service adapter
    pub async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        _details: UnbindDetails,
        ctx: &RequestContext,
    ) -> Result<()> {
        let span = Self::request_span(ctx, instance_id, OperationType::Unbind);
        self.unbind_in_span(instance_id, binding_id, ctx)
            .instrument(span)
            .await
    }

    async fn unbind_in_span(
        &self,
        instance_id: &str,
        binding_id: &str,
        ctx: &RequestContext,
    ) -> Result<()> {
        let ectx = self.error_context(instance_id, ctx, OperationType::Unbind);
        let _guard = self.lock_binding(binding_id, &ectx)?;

        let request = self
            .binding_request(instance_id, binding_id, BTreeMap::new(), &ectx, ctx)
            .await?;

        ctx.bounded("delete binding", self.adapter.delete_binding(request))
            .await
            .map_err(|err| {
                self.classifier
                    .classify_adapter(err, &ectx, AdapterSubject::Binding)
            })?;

        info!(binding_id = %binding_id, "binding deleted");
        log_broker_operation("unbind", instance_id, &ctx.request_id, "succeeded", None);
        Ok(())
    }

    fn lock_binding(&self, binding_id: &str, ectx: &ErrorContext) -> Result<InstanceLockGuard> {
        self.binding_locks
            .try_acquire(binding_id)
            .map_err(|err| self.classifier.classify_lock(err, ectx))
    }

    /// Gather the deployment's manifest, VMs and (best effort) resolved secrets
    async fn binding_request(
        &self,
        instance_id: &str,
        binding_id: &str,
        request_params: BTreeMap<String, Value>,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) -> Result<BindingRequest> {
        let deployment_name = self.deployment_name(instance_id);

        let deployment = ctx
            .bounded("get deployment", self.backend.get_deployment(&deployment_name))
            .await
            .map_err(|err| self.classifier.classify_backend(err, ectx))?
            .ok_or_else(|| {
                self.classifier.sentinel(
                    OsbError::InstanceDoesNotExist,
                    ectx,
                    &format!("deployment {deployment_name} not found"),
                )
            })?;

        let deployment_topology = ctx
            .bounded("get vms", self.backend.get_vms(&deployment_name))
            .await
            .map_err(|err| self.classifier.classify_backend(err, ectx))?;

        let secrets = match ctx
            .bounded(
                "resolve manifest secrets",
                self.secrets.resolve_manifest_secrets(&deployment.manifest),
            )
            .await
        {
            Ok(secrets) => secrets,
            Err(err) => {
                warn!(
                    request_id = %ectx.request_id,
                    deployment = %deployment_name,
                    error = %err,
                    "failed to resolve manifest secrets, continuing without them"
                );
                BTreeMap::new()
            }
        };

        Ok(BindingRequest {
            binding_id: binding_id.to_string(),
            deployment_topology,
            manifest: deployment.manifest,
            request_params,
            secrets,
        })
    }
}
