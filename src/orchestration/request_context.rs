//! # Request Context
//!
//! Correlation ID and optional deadline for one inbound broker request. Every
//! outbound collaborator call goes through [`RequestContext::bounded`] so a
//! caller-supplied deadline reaches the backend.
//!
//! ```rust
//! use osb_broker_core::client::BackendError;
//! use osb_broker_core::orchestration::RequestContext;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let ctx = RequestContext::with_request_id("req-1").with_timeout(Duration::from_millis(10));
//! let result: Result<(), BackendError> = ctx
//!     .bounded("get deployment", async {
//!         tokio::time::sleep(Duration::from_secs(5)).await;
//!         Ok(())
//!     })
//!     .await;
//! assert!(matches!(result, Err(BackendError::DeadlineExceeded { .. })));
//! # });
//! ```

use crate::client::{AdapterError, BackendError, SecretsError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Raised when an outbound call outlives the request deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineExceeded {
    pub operation: String,
}

impl From<DeadlineExceeded> for BackendError {
    fn from(err: DeadlineExceeded) -> Self {
        BackendError::DeadlineExceeded {
            operation: err.operation,
        }
    }
}

impl From<DeadlineExceeded> for AdapterError {
    fn from(err: DeadlineExceeded) -> Self {
        AdapterError::DeadlineExceeded {
            operation: err.operation,
        }
    }
}

impl From<DeadlineExceeded> for SecretsError {
    fn from(err: DeadlineExceeded) -> Self {
        SecretsError::Unavailable(format!("deadline exceeded during {}", err.operation))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// New context with a generated correlation ID and no deadline
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            deadline: None,
        }
    }

    /// Use the caller's correlation ID; a blank one is replaced with a generated ID
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        if request_id.trim().is_empty() {
            return Self::new();
        }
        Self {
            request_id,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Run an outbound call, failing with the caller's error type if the deadline passes first
    pub async fn bounded<T, E, F>(&self, operation: &str, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DeadlineExceeded>,
    {
        match self.deadline {
            None => call.await,
            Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result,
                Err(_) => Err(DeadlineExceeded {
                    operation: operation.to_string(),
                }
                .into()),
            },
        }
    }
}
