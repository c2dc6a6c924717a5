#![allow(clippy::doc_markdown)] // Allow technical terms like OSB, BOSH in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # OSB Broker Core
//!
//! Operation lifecycle orchestration for an on-demand Open Service Broker API
//! broker.
//!
//! ## Overview
//!
//! The broker provisions, updates, upgrades, binds, unbinds and deprovisions
//! service instances by driving a deployment backend through long-running
//! tasks. It is stateless across requests: progress of a multi-step operation
//! is reconstructed on demand from the backend's task history using an opaque
//! continuation token handed back to the caller.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Broker verbs, lifecycle runner, quota engine, locks, error classifier
//! - [`models`] - Operation tokens, backend tasks, plans and OSB request/response shapes
//! - [`client`] - Traits for the deployment backend, instance counter, service adapter and credential store
//! - [`config`] - Catalog and broker settings with file and environment layering
//! - [`error`] - User-facing error taxonomy
//! - [`logging`] - Structured logging bootstrap
//! - `test_helpers` - In-memory collaborators for tests (`test-utils` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use osb_broker_core::config::ConfigManager;
//! use osb_broker_core::models::ProvisionDetails;
//! use osb_broker_core::orchestration::{Broker, BrokerClients, RequestContext};
//!
//! # async fn example(clients: BrokerClients) -> Result<(), Box<dyn std::error::Error>> {
//! osb_broker_core::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load(Some("config/broker.yml".as_ref()))?;
//! let broker = Broker::new(manager.config().clone(), clients);
//!
//! let details = ProvisionDetails {
//!     service_id: "redis".to_string(),
//!     plan_id: "small".to_string(),
//!     ..Default::default()
//! };
//! let spec = broker
//!     .provision("instance-1", details, true, &RequestContext::new())
//!     .await?;
//! println!("poll with {}", spec.operation_data);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use config::{BrokerConfig, ConfigManager};
pub use error::{BrokerError, ErrorCategory, OsbError, Result};
pub use orchestration::{Broker, BrokerClients, RequestContext};
