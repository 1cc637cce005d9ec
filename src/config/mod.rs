//! Configuration management for framestore
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use framestore::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Checkpoint every {} operations", config.store.checkpoint_operations);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FRAMESTORE__<section>__<key>`
//!
//! Examples:
//! - `FRAMESTORE__STORE__DATA_DIR=/var/lib/framestore`
//! - `FRAMESTORE__STORE__CHECKPOINT_OPERATIONS=500`
//! - `FRAMESTORE__STORE__CHECKPOINT_TIMEOUT=1m`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/framestore.toml`.
//! This can be overridden using the `FRAMESTORE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::HumanDuration;
pub use models::{Config, StoreConfig, TelemetryConfig};
pub use validation::{ValidationError, validate_data_dir};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FRAMESTORE__*`)
    /// 2. TOML file (default: `config/framestore.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - The data directory is missing, absent, or not readable and writable
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from the given file (or the default sources) without validating
    ///
    /// Lets callers apply overrides, such as a command-line data directory,
    /// before calling `validate`.
    pub fn load_unvalidated(path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => sources::load_from_sources(path)?,
            None => sources::load()?,
        };
        Ok(config)
    }

    /// Validate an already-assembled configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}
