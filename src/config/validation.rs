use super::models::{Config, StoreConfig, TelemetryConfig};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing configuration parameter: store.data_dir")]
    MissingDataDir,

    #[error("Data directory does not exist: {}", path.display())]
    DataDirNotFound { path: PathBuf },

    #[error("Data directory is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Cannot read data directory: {}", path.display())]
    DataDirNotReadable { path: PathBuf },

    #[error("Cannot write data directory: {}", path.display())]
    DataDirNotWritable { path: PathBuf },

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidLogFilter { filter: String, reason: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_store(&config.store)?;
    validate_telemetry(&config.telemetry)?;
    Ok(())
}

/// Validate the store section
pub fn validate_store(config: &StoreConfig) -> Result<(), ValidationError> {
    validate_data_dir(config.data_dir.as_deref())?;
    Ok(())
}

/// Ensure the data directory is set, exists, and can be read and written
///
/// Returns the checked path so callers can open stores under it.
pub fn validate_data_dir(data_dir: Option<&Path>) -> Result<&Path, ValidationError> {
    let path = data_dir.ok_or(ValidationError::MissingDataDir)?;

    if !path.exists() {
        return Err(ValidationError::DataDirNotFound {
            path: path.to_path_buf(),
        });
    }

    if !path.is_dir() {
        return Err(ValidationError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    if fs::read_dir(path).is_err() {
        return Err(ValidationError::DataDirNotReadable {
            path: path.to_path_buf(),
        });
    }

    // Probe with an unnamed temp file; it is removed when dropped
    if tempfile::tempfile_in(path).is_err() {
        return Err(ValidationError::DataDirNotWritable {
            path: path.to_path_buf(),
        });
    }

    Ok(path)
}

fn validate_telemetry(config: &TelemetryConfig) -> Result<(), ValidationError> {
    EnvFilter::try_new(&config.log_filter).map_err(|e| ValidationError::InvalidLogFilter {
        filter: config.log_filter.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}
