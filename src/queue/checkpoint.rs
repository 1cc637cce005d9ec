//! Checkpoint policy for the metadata write-back cache
//!
//! Metadata changes are only made durable when a checkpoint runs. A checkpoint
//! is due once more than `max_ops` enqueue/dequeue operations have happened
//! since the last one, or once more than `max_age` has elapsed, whichever comes
//! first. Both thresholds bound how much metadata a crash can lose.
//!
//! There is no timer: the check only happens when an operation is recorded, so
//! an idle store stays unflushed until its next operation or `close`.

use std::time::{Duration, Instant};

pub const DEFAULT_CHECKPOINT_OPERATIONS: u64 = 100;
pub const DEFAULT_CHECKPOINT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
pub struct CheckpointScheduler {
    op_count: u64,
    last_flush_at: Instant,
    max_ops: u64,
    max_age: Duration,
    flushes: u64,
}

impl CheckpointScheduler {
    pub fn new(max_ops: u64, max_age: Duration) -> Self {
        Self {
            op_count: 0,
            last_flush_at: Instant::now(),
            max_ops,
            max_age,
            flushes: 0,
        }
    }

    /// Count one enqueue or dequeue; queries are never recorded
    pub fn record_operation(&mut self) {
        self.op_count += 1;
    }

    pub fn should_flush(&self) -> bool {
        self.op_count > self.max_ops || self.last_flush_at.elapsed() > self.max_age
    }

    pub fn mark_flushed(&mut self) {
        self.op_count = 0;
        self.last_flush_at = Instant::now();
        self.flushes += 1;
    }

    /// Operations recorded since the last checkpoint
    pub fn op_count(&self) -> u64 {
        self.op_count
    }

    /// Checkpoints completed since this scheduler was created
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn since_last_flush(&self) -> Duration {
        self.last_flush_at.elapsed()
    }

    pub fn max_ops(&self) -> u64 {
        self.max_ops
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

impl Default for CheckpointScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_OPERATIONS, DEFAULT_CHECKPOINT_TIMEOUT)
    }
}
