//! # Error Classification
//!
//! Turns collaborator failures into the broker's user-facing taxonomy.
//!
//! ## Overview
//!
//! Errors are classified once, where the failing call was made. The classifier
//! logs the raw error together with correlation data for the operator, then
//! returns a [`BrokerError`] whose user-facing message is one of:
//!
//! - an OSB sentinel (already exists, does not exist, app guid missing, ...)
//! - a message the adapter explicitly marked as safe to show
//! - "Currently unable to ... please try again later" for transient backend failures
//! - a generic message carrying only service name, instance GUID, request ID,
//!   operation type and (when known) backend task ID
//!
//! ```text
//! ┌────────────────────┐     ┌─────────────────┐     ┌──────────────┐
//! │ BackendError /     │────▶│ ErrorClassifier │────▶│ BrokerError  │
//! │ AdapterError + ctx │     │ (logs operator) │     │ (user safe)  │
//! └────────────────────┘     └─────────────────┘     └──────────────┘
//! ```

use crate::client::{AdapterError, BackendError};
use crate::error::{BrokerError, DisplayableError, GenericError, OsbError};
use crate::models::OperationType;
use crate::orchestration::instance_lock::LockError;
use crate::orchestration::lifecycle_runner::LifecycleError;
use crate::orchestration::operation_token::OperationDataError;
use crate::orchestration::quota_engine::QuotaError;
use tracing::error;

/// Correlation data attached to every classified error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub service_name: String,
    pub instance_id: String,
    pub request_id: String,
    pub operation_type: Option<OperationType>,
    /// Set once a backend task exists
    pub task_id: Option<u64>,
}

impl ErrorContext {
    pub fn new(
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: instance_id.into(),
            request_id: request_id.into(),
            operation_type: None,
            task_id: None,
        }
    }

    pub fn with_operation(mut self, operation_type: OperationType) -> Self {
        self.operation_type = Some(operation_type);
        self
    }

    pub fn with_task(mut self, task_id: u64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    fn generic_error(&self, operator_message: String) -> GenericError {
        GenericError {
            service_name: self.service_name.clone(),
            instance_id: self.instance_id.clone(),
            request_id: self.request_id.clone(),
            operation_type: self.operation_type,
            task_id: self.task_id,
            operator_message,
        }
    }
}

/// What an adapter error refers to, which decides the sentinel it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterSubject {
    Instance,
    Binding,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a deployment backend or instance counter failure
    pub fn classify_backend(&self, err: BackendError, ctx: &ErrorContext) -> BrokerError {
        match err {
            BackendError::RequestFailed(_) | BackendError::DeadlineExceeded { .. } => {
                self.transient(ctx, err.to_string())
            }
            BackendError::DeploymentNotFound(_) => {
                self.sentinel(OsbError::InstanceDoesNotExist, ctx, &err.to_string())
            }
            BackendError::Adapter(adapter_err) => {
                self.classify_adapter(adapter_err, ctx, AdapterSubject::Instance)
            }
            BackendError::TaskNotFound(_) | BackendError::Unexpected(_) => {
                self.generic(ctx, err.to_string())
            }
        }
    }

    /// Classify a service adapter failure
    pub fn classify_adapter(
        &self,
        err: AdapterError,
        ctx: &ErrorContext,
        subject: AdapterSubject,
    ) -> BrokerError {
        match err {
            AdapterError::AlreadyExists => {
                let sentinel = match subject {
                    AdapterSubject::Instance => OsbError::InstanceAlreadyExists,
                    AdapterSubject::Binding => OsbError::BindingAlreadyExists,
                };
                self.sentinel(sentinel, ctx, &err.to_string())
            }
            AdapterError::NotFound => {
                let sentinel = match subject {
                    AdapterSubject::Instance => OsbError::InstanceDoesNotExist,
                    AdapterSubject::Binding => OsbError::BindingDoesNotExist,
                };
                self.sentinel(sentinel, ctx, &err.to_string())
            }
            AdapterError::AppGuidMissing => {
                self.sentinel(OsbError::AppGuidNotProvided, ctx, &err.to_string())
            }
            AdapterError::NotImplemented => {
                self.sentinel(OsbError::NotImplemented, ctx, &err.to_string())
            }
            AdapterError::UnknownWithMessage { message } => {
                self.displayable(ctx, message.clone(), message)
            }
            AdapterError::UnknownWithoutMessage { detail } => self.generic(ctx, detail),
            AdapterError::DeadlineExceeded { .. } => self.transient(ctx, err.to_string()),
        }
    }

    /// "Try again later" for failures that may clear up on their own
    fn transient(&self, ctx: &ErrorContext, operator_message: String) -> BrokerError {
        let verb = ctx
            .operation_type
            .map(|op| op.action_verb())
            .unwrap_or("process");
        self.log_operator(ctx, &operator_message);
        BrokerError::BackendRequest(DisplayableError::new(
            format!("Currently unable to {verb} service instance, please try again later"),
            operator_message,
        ))
    }

    /// Classify a lifecycle runner failure
    pub fn classify_lifecycle(&self, err: LifecycleError, ctx: &ErrorContext) -> BrokerError {
        match err {
            LifecycleError::Backend(backend_err) => self.classify_backend(backend_err, ctx),
            other => self.generic(ctx, other.to_string()),
        }
    }

    /// Token codec failures never reveal the parse error to the caller
    pub fn classify_operation_data(
        &self,
        err: OperationDataError,
        ctx: &ErrorContext,
    ) -> BrokerError {
        let mut ctx = ctx.clone();
        if ctx.operation_type.is_none() {
            ctx.operation_type = err.operation_type();
        }
        self.generic(&ctx, err.to_string())
    }

    pub fn classify_quota(&self, err: QuotaError, ctx: &ErrorContext) -> BrokerError {
        let message = err.to_string();
        self.displayable(ctx, message.clone(), message)
    }

    pub fn classify_lock(&self, err: LockError, ctx: &ErrorContext) -> BrokerError {
        let message = err.to_string();
        self.log_operator(ctx, &message);
        BrokerError::OperationInProgress { message }
    }

    pub fn operation_in_progress(&self, ctx: &ErrorContext, message: &str) -> BrokerError {
        self.log_operator(ctx, message);
        BrokerError::OperationInProgress {
            message: message.to_string(),
        }
    }

    pub fn sentinel(
        &self,
        sentinel: OsbError,
        ctx: &ErrorContext,
        operator_message: &str,
    ) -> BrokerError {
        self.log_operator(ctx, operator_message);
        BrokerError::Osb(sentinel)
    }

    pub fn displayable(
        &self,
        ctx: &ErrorContext,
        user_message: impl Into<String>,
        operator_message: impl Into<String>,
    ) -> BrokerError {
        let err = DisplayableError::new(user_message, operator_message);
        self.log_operator(ctx, &err.operator_message);
        BrokerError::Displayable(err)
    }

    /// Displayable error that still reports `sentinel` from [`BrokerError::sentinel`]
    pub fn displayable_sentinel(
        &self,
        ctx: &ErrorContext,
        sentinel: OsbError,
        operator_message: impl Into<String>,
    ) -> BrokerError {
        let err = DisplayableError::from_sentinel(&sentinel, operator_message);
        self.log_operator(ctx, &err.operator_message);
        BrokerError::Displayable(err)
    }

    pub fn generic(&self, ctx: &ErrorContext, operator_message: impl Into<String>) -> BrokerError {
        let operator_message = operator_message.into();
        self.log_operator(ctx, &operator_message);
        BrokerError::Generic(ctx.generic_error(operator_message))
    }

    fn log_operator(&self, ctx: &ErrorContext, message: &str) {
        error!(
            request_id = %ctx.request_id,
            service = %ctx.service_name,
            instance_id = %ctx.instance_id,
            operation = %ctx.operation_type.map(|op| op.to_string()).unwrap_or_default(),
            task_id = ctx.task_id,
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn create_test_context() -> ErrorContext {
        ErrorContext::new("redis", "i1", "req-1").with_operation(OperationType::Create)
    }

    #[test]
    fn test_transient_backend_errors_ask_to_retry() {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify_backend(
            BackendError::RequestFailed("connection refused".to_string()),
            &create_test_context(),
        );

        assert_eq!(err.category(), ErrorCategory::Transient);
        assert_eq!(
            err.to_string(),
            "Currently unable to create service instance, please try again later"
        );
        assert!(err.operator_message().contains("connection refused"));
    }

    #[test]
    fn test_deadline_is_transient() {
        let classifier = ErrorClassifier::new();
        let ctx = create_test_context().with_operation(OperationType::Delete);
        let err = classifier.classify_backend(
            BackendError::DeadlineExceeded {
                operation: "submit delete".to_string(),
            },
            &ctx,
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("unable to delete"));
    }

    #[test]
    fn test_adapter_deadline_is_transient() {
        let classifier = ErrorClassifier::new();
        let ctx = create_test_context().with_operation(OperationType::Bind);
        let err = classifier.classify_adapter(
            AdapterError::DeadlineExceeded {
                operation: "create binding".to_string(),
            },
            &ctx,
            AdapterSubject::Binding,
        );

        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Currently unable to bind service instance, please try again later"
        );
        assert!(err.operator_message().contains("create binding"));
    }

    #[test]
    fn test_adapter_sentinels() {
        let classifier = ErrorClassifier::new();
        let ctx = create_test_context();

        let cases = [
            (AdapterError::AlreadyExists, AdapterSubject::Instance, OsbError::InstanceAlreadyExists),
            (AdapterError::AlreadyExists, AdapterSubject::Binding, OsbError::BindingAlreadyExists),
            (AdapterError::NotFound, AdapterSubject::Binding, OsbError::BindingDoesNotExist),
            (AdapterError::AppGuidMissing, AdapterSubject::Binding, OsbError::AppGuidNotProvided),
            (AdapterError::NotImplemented, AdapterSubject::Instance, OsbError::NotImplemented),
        ];
        for (adapter_err, subject, expected) in cases {
            let err = classifier.classify_adapter(adapter_err, &ctx, subject);
            assert_eq!(err.sentinel(), Some(&expected));
        }
    }

    #[test]
    fn test_adapter_message_passes_through() {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify_backend(
            BackendError::Adapter(AdapterError::UnknownWithMessage {
                message: "disk size must be at least 10GB".to_string(),
            }),
            &create_test_context(),
        );
        assert_eq!(err.category(), ErrorCategory::Displayable);
        assert_eq!(err.to_string(), "disk size must be at least 10GB");
    }

    #[test]
    fn test_adapter_without_message_becomes_generic() {
        let classifier = ErrorClassifier::new();
        let err = classifier.classify_backend(
            BackendError::Adapter(AdapterError::UnknownWithoutMessage {
                detail: "exit status 1: panic in generate-manifest".to_string(),
            }),
            &create_test_context(),
        );

        assert_eq!(err.category(), ErrorCategory::Generic);
        assert!(!err.to_string().contains("panic"));
        assert!(err.to_string().contains("broker-request-id: req-1"));
        assert!(err.operator_message().contains("panic in generate-manifest"));
    }

    #[test]
    fn test_unexpected_backend_error_is_generic_with_task() {
        let classifier = ErrorClassifier::new();
        let ctx = create_test_context().with_task(99);
        let err = classifier.classify_backend(BackendError::Unexpected("500".to_string()), &ctx);
        assert!(err.to_string().contains("task-id: 99"));
    }

    #[test]
    fn test_operation_data_error_recovers_operation_type() {
        let classifier = ErrorClassifier::new();
        let ctx = ErrorContext::new("redis", "i1", "req-1");
        let err = classifier.classify_operation_data(
            OperationDataError::MissingTaskID {
                operation_type: OperationType::Upgrade,
            },
            &ctx,
        );
        assert!(err.to_string().contains("operation: upgrade"));

        let err = classifier.classify_operation_data(
            OperationDataError::MalformedToken("expected value at line 1".to_string()),
            &ctx,
        );
        assert!(!err.to_string().contains("expected value"));
        assert!(!err.to_string().contains("operation:"));
    }
}
