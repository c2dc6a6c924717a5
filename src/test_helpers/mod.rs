// Test Helpers Module - In-Memory Collaborators
//
// Scriptable fakes of every client the broker consumes, plus a tracing
// capture for log assertions. Shared by unit tests and the integration
// tests under tests/.

pub mod fake_backend;
pub mod fake_clients;
pub mod log_capture;

pub use fake_backend::{BackendCall, FakeDeploymentBackend, FIRST_SUBMITTED_TASK_ID};
pub use fake_clients::{
    AdapterCall, CounterCall, FakeInstanceCounter, FakeSecretManager, FakeServiceAdapter,
    SecretsCall,
};
pub use log_capture::LogCapture;
