//! Tracing setup and store counters

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), AnyError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()?;
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()?;
    }

    Ok(())
}

/// Counters for store activity
#[derive(Debug, Default)]
pub struct StoreMetrics {
    frames_enqueued: AtomicU64,
    frames_dequeued: AtomicU64,
    frames_rejected: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_enqueued(&self) {
        self.frames_enqueued.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "frames_enqueued", "Metric incremented");
    }

    pub fn frame_dequeued(&self) {
        self.frames_dequeued.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "frames_dequeued", "Metric incremented");
    }

    pub fn frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "frames_rejected", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_enqueued: self.frames_enqueued.load(Ordering::Relaxed),
            frames_dequeued: self.frames_dequeued.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_enqueued: u64,
    pub frames_dequeued: u64,
    pub frames_rejected: u64,
}
