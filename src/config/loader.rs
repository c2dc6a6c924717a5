//! Configuration Loader
//!
//! Layers an optional configuration file (YAML, TOML or JSON, picked by
//! extension) under `BROKER__`-prefixed environment variables and validates
//! the result before handing it out.

use super::error::{ConfigResult, ConfigurationError};
use super::BrokerConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded, validated broker configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: BrokerConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::ConfigFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            debug!("Loading broker configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BROKER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: BrokerConfig = builder.build()?.try_deserialize()?;
        Self::from_config(config)
    }

    /// Load configuration from an in-memory YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Arc<ConfigManager>> {
        let config: BrokerConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Self::from_config(config)
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: BrokerConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        let environment = Self::detect_environment(&config);
        info!(
            environment = %environment,
            service = %config.service_catalog.name,
            plans = config.service_catalog.plans.len(),
            "Broker configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
        }))
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// `BROKER_ENV` wins over the configured environment
    fn detect_environment(config: &BrokerConfig) -> String {
        std::env::var("BROKER_ENV").unwrap_or_else(|_| config.broker.environment.clone())
    }
}
