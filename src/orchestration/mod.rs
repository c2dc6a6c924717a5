//! # Orchestration Engine
//!
//! Operation lifecycle orchestration for a stateless service broker.
//!
//! ## Architecture
//!
//! The broker keeps no record of in-flight work. Each triggering call ends by
//! handing the caller an encoded [`OperationData`](crate::models::OperationData)
//! token, and every later poll reconstructs progress from the deployment
//! backend's task history:
//!
//! - **Broker**: the OSB verbs (provision, update, upgrade, recreate,
//!   deprovision, bind, unbind, last operation)
//! - **LifecycleRunner**: advances post-deploy and pre-delete errand sequences
//!   using the task count under a context ID as the cursor
//! - **QuotaEngine**: pure check of plan and global instance/resource limits
//! - **InstanceLockRegistry**: fail-fast mutual exclusion per instance or binding
//! - **ErrorClassifier**: splits every failure into a user message and an
//!   operator log line
//! - **OperationToken**: the continuation token codec
//! - **RequestContext**: correlation ID and deadline for one inbound request

pub mod broker;
pub mod error_classifier;
pub mod instance_lock;
pub mod lifecycle_runner;
pub mod operation_token;
pub mod quota_engine;
pub mod request_context;

pub use broker::{Broker, BrokerClients};
pub use error_classifier::{AdapterSubject, ErrorClassifier, ErrorContext};
pub use instance_lock::{InstanceLockGuard, InstanceLockRegistry, LockError};
pub use lifecycle_runner::{LifecycleError, LifecycleRunner};
pub use operation_token::OperationDataError;
pub use quota_engine::{check_quotas, InstanceCounts, QuotaError, QuotaViolation};
pub use request_context::{DeadlineExceeded, RequestContext};
