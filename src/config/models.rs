use crate::humanize::HumanDuration;
use crate::queue::checkpoint::{DEFAULT_CHECKPOINT_OPERATIONS, DEFAULT_CHECKPOINT_TIMEOUT};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Queue store configuration
///
/// `data_dir` has no default: a store without one refuses to open.
#[derive(Debug, Clone, Deserialize, Serialize, Builder)]
pub struct StoreConfig {
    /// Directory holding the `metadata` and `frames` stores
    #[builder(into)]
    pub data_dir: Option<PathBuf>,
    /// Flush metadata once more than this many operations are unflushed
    #[serde(default = "default_checkpoint_operations")]
    #[builder(default = DEFAULT_CHECKPOINT_OPERATIONS)]
    pub checkpoint_operations: u64,
    /// Flush metadata once the last flush is older than this
    #[serde(default = "default_checkpoint_timeout")]
    #[builder(default = default_checkpoint_timeout())]
    pub checkpoint_timeout: HumanDuration,
    /// Sync the frame store after every payload write
    #[serde(default)]
    #[builder(default)]
    pub sync_frames: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            checkpoint_operations: default_checkpoint_operations(),
            checkpoint_timeout: default_checkpoint_timeout(),
            sync_frames: false,
        }
    }
}

fn default_checkpoint_operations() -> u64 {
    DEFAULT_CHECKPOINT_OPERATIONS
}

fn default_checkpoint_timeout() -> HumanDuration {
    HumanDuration(DEFAULT_CHECKPOINT_TIMEOUT)
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
