//! # Clients
//!
//! Interfaces to the broker's external collaborators: the deployment backend,
//! the instance counter, the service adapter and the credential store.

pub mod errors;
pub mod traits;

pub use errors::{AdapterError, BackendError, SecretsError};
pub use traits::{
    BindingRequest, DeployOutcome, DeployRequest, DeploymentBackend, InstanceCounter,
    SecretManager, ServiceAdapter,
};
