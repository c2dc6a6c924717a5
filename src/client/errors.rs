//! # Client Errors
//!
//! Closed error enums returned by the consumed collaborators. The classifier
//! matches on these tags; nothing above the client layer inspects message text.

use thiserror::Error;

/// Failure reported by the service adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("service adapter reported that the instance or binding already exists")]
    AlreadyExists,

    #[error("service adapter reported that the binding was not found")]
    NotFound,

    #[error("service adapter requires an app_guid")]
    AppGuidMissing,

    /// The adapter supplied a message meant for the end user
    #[error("{message}")]
    UnknownWithMessage { message: String },

    /// The adapter failed without anything safe to show the user
    #[error("service adapter failed: {detail}")]
    UnknownWithoutMessage { detail: String },

    #[error("service adapter does not implement this operation")]
    NotImplemented,

    /// The request deadline passed before the adapter answered
    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: String },
}

/// Failure reported by the deployment backend or the instance counter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network-class failure; the request may succeed later
    #[error("backend request failed: {0}")]
    RequestFailed(String),

    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: String },

    #[error("deployment {0} not found")]
    DeploymentNotFound(String),

    #[error("task {0} not found")]
    TaskNotFound(u64),

    /// Raised while the backend asked the adapter to generate a manifest
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    #[error("{0}")]
    Unexpected(String),
}

/// Failure reported by the credential store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretsError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("secret {0} could not be resolved")]
    Unresolvable(String),
}
