//! # Broker Errors
//!
//! The error taxonomy returned by every broker verb.
//!
//! A [`BrokerError`] always renders its user-facing message through `Display`.
//! Operator-facing detail travels separately (see [`BrokerError::operator_message`])
//! and is logged by the classifier at the point where the error is built, so raw
//! backend or adapter text never reaches the OSB caller.

use crate::models::OperationType;
use thiserror::Error;

/// Sentinel errors defined by the Open Service Broker API contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OsbError {
    #[error("instance already exists")]
    InstanceAlreadyExists,

    #[error("instance does not exist")]
    InstanceDoesNotExist,

    #[error("binding already exists")]
    BindingAlreadyExists,

    #[error("binding does not exist")]
    BindingDoesNotExist,

    #[error("app_guid is a required field but was not provided")]
    AppGuidNotProvided,

    #[error("This service plan requires client support for asynchronous service operations.")]
    AsyncRequired,

    #[error("plan {plan_id} does not exist")]
    PlanNotFound { plan_id: String },

    #[error("the service adapter does not implement this operation")]
    NotImplemented,
}

/// Error whose user message is safe to return verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayableError {
    pub user_message: String,
    pub operator_message: String,
    /// Set when the user message is an OSB sentinel's text
    pub sentinel: Option<OsbError>,
}

impl DisplayableError {
    pub fn new(user_message: impl Into<String>, operator_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            operator_message: operator_message.into(),
            sentinel: None,
        }
    }

    /// Wraps an OSB sentinel, keeping the underlying cause for the operator.
    pub fn from_sentinel(sentinel: &OsbError, operator_message: impl Into<String>) -> Self {
        Self {
            sentinel: Some(sentinel.clone()),
            ..Self::new(sentinel.to_string(), operator_message)
        }
    }
}

/// Error carrying correlation data instead of the raw cause.
///
/// The user message is synthesized from the correlation fields only; the
/// original error lives in `operator_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericError {
    pub service_name: String,
    pub instance_id: String,
    pub request_id: String,
    pub operation_type: Option<OperationType>,
    pub task_id: Option<u64>,
    pub operator_message: String,
}

impl GenericError {
    /// The message shown to the OSB caller.
    pub fn user_message(&self) -> String {
        let mut message = format!(
            "There was a problem completing your request. Please contact your operations team \
             providing the following information: service: {}, service-instance-guid: {}, \
             broker-request-id: {}",
            self.service_name, self.instance_id, self.request_id
        );
        if let Some(task_id) = self.task_id {
            message.push_str(&format!(", task-id: {task_id}"));
        }
        if let Some(operation_type) = self.operation_type {
            message.push_str(&format!(", operation: {operation_type}"));
        }
        message
    }
}

/// Broad handling category of a [`BrokerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Backend unreachable or slow; the caller may try again later
    Transient,
    /// A message meant for the end user
    Displayable,
    /// Another operation holds the instance or binding
    Conflict,
    /// An OSB contract sentinel
    Sentinel,
    /// Unexpected failure wrapped with correlation data
    Generic,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Displayable => write!(f, "displayable"),
            ErrorCategory::Conflict => write!(f, "conflict"),
            ErrorCategory::Sentinel => write!(f, "sentinel"),
            ErrorCategory::Generic => write!(f, "generic"),
        }
    }
}

/// Every failure a broker verb can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("{0}")]
    Osb(#[from] OsbError),

    #[error("{}", .0.user_message)]
    Displayable(DisplayableError),

    /// Transient backend failure, already rendered as "try again later".
    #[error("{}", .0.user_message)]
    BackendRequest(DisplayableError),

    #[error("{}", .0.user_message())]
    Generic(GenericError),

    #[error("{message}")]
    OperationInProgress { message: String },
}

impl BrokerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BrokerError::Osb(_) => ErrorCategory::Sentinel,
            BrokerError::Displayable(_) => ErrorCategory::Displayable,
            BrokerError::BackendRequest(_) => ErrorCategory::Transient,
            BrokerError::Generic(_) => ErrorCategory::Generic,
            BrokerError::OperationInProgress { .. } => ErrorCategory::Conflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// What goes to the operator log. Never returned to the OSB caller.
    pub fn operator_message(&self) -> String {
        match self {
            BrokerError::Osb(sentinel) => sentinel.to_string(),
            BrokerError::Displayable(err) | BrokerError::BackendRequest(err) => {
                err.operator_message.clone()
            }
            BrokerError::Generic(err) => err.operator_message.clone(),
            BrokerError::OperationInProgress { message } => message.clone(),
        }
    }

    /// The sentinel this error stands for, if any.
    pub fn sentinel(&self) -> Option<&OsbError> {
        match self {
            BrokerError::Osb(sentinel) => Some(sentinel),
            BrokerError::Displayable(err) => err.sentinel.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
