use super::Broker;
use crate::error::Result;
use crate::logging::log_error;
use crate::models::{
    BackendTask, LastOperation, LastOperationState, OperationData, OperationType, TaskOutcome,
};
use crate::orchestration::error_classifier::ErrorContext;
use crate::orchestration::operation_token;
use crate::orchestration::request_context::RequestContext;
use tracing::{debug, info, Instrument};

impl Broker {
    /// Report progress of the operation encoded in `operation_data`.
    ///
    /// Polling may submit the next lifecycle errand (or the final delete) when
    /// the previous step has finished.
    pub async fn last_operation(
        &self,
        instance_id: &str,
        operation_data: &str,
        ctx: &RequestContext,
    ) -> Result<LastOperation> {
        let ectx = ErrorContext::new(&self.offering.name, instance_id, &ctx.request_id);
        let data = operation_token::decode(operation_data)
            .map_err(|err| self.classifier.classify_operation_data(err, &ectx))?;

        let span = Self::request_span(ctx, instance_id, data.operation_type);
        let ectx = ectx
            .with_operation(data.operation_type)
            .with_task(data.backend_task_id);
        self.last_operation_in_span(instance_id, data, ectx, ctx)
            .instrument(span)
            .await
    }

    async fn last_operation_in_span(
        &self,
        instance_id: &str,
        data: OperationData,
        ectx: ErrorContext,
        ctx: &RequestContext,
    ) -> Result<LastOperation> {
        let deployment_name = self.deployment_name(instance_id);
        let task = self
            .runner
            .get_task(&deployment_name, &data, ctx)
            .await
            .map_err(|err| self.classifier.classify_lifecycle(err, &ectx))?;
        let ectx = ectx.with_task(task.id);
        let subject = data.operation_type.description_subject();

        debug!(task_id = task.id, state = %task.state, "polled backend task");

        let last_operation = match task.state.outcome() {
            TaskOutcome::Incomplete => LastOperation {
                state: LastOperationState::InProgress,
                description: format!("{subject} in progress"),
            },
            TaskOutcome::Succeeded => {
                if matches!(
                    data.operation_type,
                    OperationType::Delete | OperationType::ForceDelete
                ) {
                    self.cleanup_after_delete(&deployment_name, &ectx, ctx)
                        .await;
                }
                info!(task_id = task.id, "{subject} completed");
                LastOperation {
                    state: LastOperationState::Succeeded,
                    description: format!("{subject} completed"),
                }
            }
            TaskOutcome::Failed => LastOperation {
                state: LastOperationState::Failed,
                description: format!("{subject} failed: {}", self.failed_task_message(&task, &ectx)),
            },
        };

        Ok(last_operation)
    }

    /// Logs the backend's own account of the failure and returns the
    /// correlation message shown instead
    fn failed_task_message(&self, task: &BackendTask, ectx: &ErrorContext) -> String {
        self.classifier
            .generic(
                ectx,
                format!(
                    "task {} finished in state {}: description: {}, result: {}",
                    task.id, task.state, task.description, task.result
                ),
            )
            .to_string()
    }

    async fn cleanup_after_delete(
        &self,
        deployment_name: &str,
        ectx: &ErrorContext,
        ctx: &RequestContext,
    ) {
        if let Err(err) = self.cleanup_deployment(deployment_name, ectx, ctx).await {
            log_error(
                "broker",
                "cleanup after delete",
                &err.operator_message(),
                Some(&format!("deployment {deployment_name}, request {}", ectx.request_id)),
            );
        }
    }
}
