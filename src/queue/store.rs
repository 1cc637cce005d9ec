use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::archive::FrameArchive;
use super::checkpoint::CheckpointScheduler;
use super::error::{QueueError, Result};
use super::keys::{FRAME_PARTITION, FRAME_STORE, METADATA_PARTITION, METADATA_STORE};
use super::metadata::MetadataIndex;
use crate::config::{StoreConfig, validate_data_dir};
use crate::observability::{MetricsSnapshot, StoreMetrics};
use crate::proto::Frame;
use crate::storage::{FjallBackend, KvBackend};

/// QueueStore persists per-destination FIFO queues of frames
///
/// Architecture:
/// - `metadata` store: destination → pending message ids + counters, held in a
///   write-back cache and flushed by the checkpoint scheduler
/// - `frames` store: message id → Frame (protobuf), written through on every
///   enqueue and dequeue
///
/// Every public operation runs under one store-wide lock, including any
/// checkpoint it triggers, so callers never observe a half-applied operation
/// or a partial flush.
///
/// A crash between checkpoints can lose the metadata changes made since the
/// last one while their payload writes survive. No reconciliation is attempted:
/// payloads without metadata stay orphaned, and a pending id whose payload is
/// gone fails its dequeue with `FrameNotFound`.
pub struct QueueStore<B: KvBackend = FjallBackend> {
    inner: Mutex<Option<StoreInner<B>>>,
    metrics: StoreMetrics,
}

struct StoreInner<B> {
    metadata: MetadataIndex<B>,
    frames: FrameArchive<B>,
    scheduler: CheckpointScheduler,
}

/// Counters for one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationStats {
    pub destination: String,
    pub depth: usize,
    pub enqueued: u64,
    pub dequeued: u64,
}

/// Store-wide snapshot for inspection
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub destinations: Vec<DestinationStats>,
    pub archived_frames: usize,
    pub unflushed_operations: u64,
    pub checkpoints: u64,
    pub since_last_checkpoint: Duration,
}

impl QueueStore<FjallBackend> {
    /// Open or create a store under `config.data_dir`
    ///
    /// The data directory must already exist and be readable and writable;
    /// otherwise nothing is opened.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let data_dir = validate_data_dir(config.data_dir.as_deref())?;
        info!("Opening QueueStore at: {}", data_dir.display());

        let metadata = FjallBackend::open(data_dir.join(METADATA_STORE), METADATA_PARTITION)?;
        let frames = FjallBackend::open(data_dir.join(FRAME_STORE), FRAME_PARTITION)?;

        Ok(Self::from_backends(metadata, frames, config))
    }
}

impl<B: KvBackend> QueueStore<B> {
    /// Build a store over already-open backends
    ///
    /// `config.data_dir` is ignored here; only the checkpoint and sync settings
    /// apply.
    pub fn from_backends(metadata: B, frames: B, config: &StoreConfig) -> Self {
        let scheduler = CheckpointScheduler::new(
            config.checkpoint_operations,
            config.checkpoint_timeout.as_duration(),
        );

        info!(
            checkpoint_operations = scheduler.max_ops(),
            checkpoint_timeout = %config.checkpoint_timeout,
            sync_frames = config.sync_frames,
            "QueueStore ready"
        );

        Self {
            inner: Mutex::new(Some(StoreInner {
                metadata: MetadataIndex::new(metadata),
                frames: FrameArchive::new(frames, config.sync_frames),
                scheduler,
            })),
            metrics: StoreMetrics::new(),
        }
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut StoreInner<B>) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(QueueError::Closed)?;
        f(inner)
    }

    /// Store a frame at the tail of `destination`'s queue
    ///
    /// Fails with `MissingMessageId` (and changes nothing) when the frame has
    /// no message id.
    pub fn enqueue(&self, destination: &str, frame: Frame) -> Result<()> {
        self.with_inner(|inner| {
            if frame.message_id.is_empty() {
                self.metrics.frame_rejected();
                return Err(QueueError::MissingMessageId(destination.to_string()));
            }

            let created = inner.metadata.enqueue_id(destination, &frame.message_id)?;
            if let Err(e) = inner.frames.put(&frame) {
                inner.metadata.revert_enqueue(destination, created);
                return Err(e);
            }
            if created {
                info!(destination, "Destination not in metadata; created new entry");
            }

            self.metrics.frame_enqueued();
            debug!(destination, message_id = %frame.message_id, "Frame enqueued");

            inner.record_operation()
        })
    }

    /// Remove and return the oldest frame for `destination`
    ///
    /// Returns `None` for unknown or empty destinations.
    pub fn dequeue(&self, destination: &str) -> Result<Option<Frame>> {
        self.with_inner(|inner| {
            if !inner.metadata.has_pending(destination)? {
                return Ok(None);
            }

            let Some(message_id) = inner.metadata.dequeue_id(destination)? else {
                return Ok(None);
            };
            let frame = match inner.frames.take(&message_id) {
                Ok(frame) => frame,
                Err(QueueError::Backend(e)) => {
                    inner.metadata.requeue_front(destination, message_id);
                    return Err(e.into());
                }
                Err(e) => {
                    // The id stays consumed: its payload is gone or unreadable
                    warn!(destination, message_id = %message_id, error = %e, "Dropping pending id");
                    inner.record_operation()?;
                    return Err(e);
                }
            };

            self.metrics.frame_dequeued();
            debug!(destination, message_id = %message_id, "Frame dequeued");

            inner.record_operation()?;
            Ok(Some(frame))
        })
    }

    /// Whether `destination` has any pending frames
    pub fn has_frames(&self, destination: &str) -> Result<bool> {
        self.with_inner(|inner| inner.metadata.has_pending(destination))
    }

    /// Number of pending frames for `destination` (0 if unknown)
    pub fn size(&self, destination: &str) -> Result<usize> {
        self.with_inner(|inner| inner.metadata.depth(destination))
    }

    /// Counters for one destination, or `None` if it was never enqueued to
    pub fn destination_stats(&self, destination: &str) -> Result<Option<DestinationStats>> {
        self.with_inner(|inner| {
            Ok(inner.metadata.entry(destination)?.map(|entry| DestinationStats {
                destination: destination.to_string(),
                depth: entry.depth(),
                enqueued: entry.enqueued,
                dequeued: entry.dequeued,
            }))
        })
    }

    /// Snapshot of every destination plus checkpoint state
    pub fn stats(&self) -> Result<StoreStats> {
        self.with_inner(|inner| {
            let mut destinations = Vec::new();
            for destination in inner.metadata.destinations()? {
                if let Some(entry) = inner.metadata.entry(&destination)? {
                    destinations.push(DestinationStats {
                        depth: entry.depth(),
                        enqueued: entry.enqueued,
                        dequeued: entry.dequeued,
                        destination,
                    });
                }
            }

            Ok(StoreStats {
                destinations,
                archived_frames: inner.frames.message_ids()?.len(),
                unflushed_operations: inner.scheduler.op_count(),
                checkpoints: inner.scheduler.flushes(),
                since_last_checkpoint: inner.scheduler.since_last_flush(),
            })
        })
    }

    /// Operator action: drop a destination and every payload still pending on it
    ///
    /// The removal is checkpointed immediately. Returns the number of frames
    /// dropped.
    pub fn purge(&self, destination: &str) -> Result<usize> {
        self.with_inner(|inner| {
            let pending = inner.metadata.purge(destination)?;
            for message_id in &pending {
                inner.frames.remove(message_id)?;
            }
            info!(destination, purged = pending.len(), "Destination purged");
            inner.checkpoint()?;
            Ok(pending.len())
        })
    }

    /// Force a metadata checkpoint now
    pub fn checkpoint(&self) -> Result<()> {
        self.with_inner(|inner| inner.checkpoint())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Flush metadata and release both stores
    ///
    /// Every later operation fails with `QueueError::Closed`; closing again is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(inner) => inner.checkpoint()?,
            None => {
                debug!("QueueStore already closed");
                return Ok(());
            }
        }

        if let Some(inner) = guard.take() {
            inner.metadata.close()?;
            inner.frames.close()?;
        }
        info!("QueueStore closed");
        Ok(())
    }
}

impl<B: KvBackend> StoreInner<B> {
    /// Count one enqueue/dequeue and checkpoint if a threshold was crossed
    fn record_operation(&mut self) -> Result<()> {
        self.scheduler.record_operation();
        if self.scheduler.should_flush() {
            self.checkpoint()
        } else {
            debug!(ops = self.scheduler.op_count(), "NOT synchronizing queue metadata");
            Ok(())
        }
    }

    /// Flush the metadata index; on failure the operation count is kept so the
    /// next operation retries
    fn checkpoint(&mut self) -> Result<()> {
        debug!(ops = self.scheduler.op_count(), "Synchronizing queue metadata");
        let written = self.metadata.flush()?;
        self.scheduler.mark_flushed();
        debug!(written, "Queue metadata synchronized");
        Ok(())
    }
}

impl<B: KvBackend> Drop for QueueStore<B> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.get_mut().as_mut() {
            if let Err(e) = inner.checkpoint() {
                warn!(error = %e, "Final checkpoint failed while dropping unclosed QueueStore");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::keys::{encode_frame_key, encode_queue_key};
    use crate::storage::MemoryBackend;
    use tempfile::TempDir;

    struct TestStore {
        store: QueueStore<MemoryBackend>,
        metadata: MemoryBackend,
        frames: MemoryBackend,
    }

    fn create_test_store(checkpoint_operations: u64) -> TestStore {
        let metadata = MemoryBackend::new();
        let frames = MemoryBackend::new();
        let config = StoreConfig::builder()
            .checkpoint_operations(checkpoint_operations)
            .checkpoint_timeout(crate::config::HumanDuration::from_secs(3600))
            .build();
        let store = QueueStore::from_backends(metadata.clone(), frames.clone(), &config);
        TestStore {
            store,
            metadata,
            frames,
        }
    }

    fn frame(id: &str) -> Frame {
        Frame::new(id, format!("body-{}", id))
    }

    #[test]
    fn test_enqueue_dequeue_fifo() {
        let t = create_test_store(100);

        for id in ["1", "2", "3"] {
            t.store.enqueue("/queue/a", frame(id)).unwrap();
        }

        for id in ["1", "2", "3"] {
            let dequeued = t.store.dequeue("/queue/a").unwrap().unwrap();
            assert_eq!(dequeued.message_id, id);
            assert_eq!(dequeued.body, format!("body-{}", id).into_bytes());
        }
        assert_eq!(t.store.size("/queue/a").unwrap(), 0);
        assert!(t.store.dequeue("/queue/a").unwrap().is_none());
    }

    #[test]
    fn test_has_frames_matches_size() {
        let t = create_test_store(100);

        assert!(!t.store.has_frames("/queue/b").unwrap());
        assert_eq!(t.store.size("/queue/b").unwrap(), 0);

        t.store.enqueue("/queue/b", frame("1")).unwrap();
        assert!(t.store.has_frames("/queue/b").unwrap());
        assert_eq!(t.store.size("/queue/b").unwrap(), 1);

        t.store.dequeue("/queue/b").unwrap();
        assert!(!t.store.has_frames("/queue/b").unwrap());
    }

    #[test]
    fn test_empty_message_id_rejected() {
        let t = create_test_store(100);

        let result = t.store.enqueue("/queue/d", Frame::new("", "payload"));
        assert!(matches!(result, Err(QueueError::MissingMessageId(d)) if d == "/queue/d"));

        assert_eq!(t.store.size("/queue/d").unwrap(), 0);
        assert!(t.store.destination_stats("/queue/d").unwrap().is_none());
        assert!(t.frames.is_empty());
        assert_eq!(t.store.metrics().frames_rejected, 1);
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 0);
    }

    #[test]
    fn test_checkpoint_after_threshold_crossed() {
        let t = create_test_store(2);

        t.store.enqueue("/queue/c", frame("1")).unwrap();
        t.store.enqueue("/queue/c", frame("2")).unwrap();
        assert_eq!(t.metadata.flushes(), 0);
        assert!(!t.metadata.contains(&encode_queue_key("/queue/c")));
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 2);

        t.store.enqueue("/queue/c", frame("3")).unwrap();
        assert_eq!(t.metadata.flushes(), 1);
        assert!(t.metadata.contains(&encode_queue_key("/queue/c")));

        let stats = t.store.stats().unwrap();
        assert_eq!(stats.unflushed_operations, 0);
        assert_eq!(stats.checkpoints, 1);
    }

    #[test]
    fn test_queries_do_not_count_as_operations() {
        let t = create_test_store(2);

        t.store.enqueue("/queue/c", frame("1")).unwrap();
        for _ in 0..10 {
            t.store.size("/queue/c").unwrap();
            t.store.has_frames("/queue/c").unwrap();
        }
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 1);
        assert_eq!(t.metadata.flushes(), 0);
    }

    #[test]
    fn test_empty_dequeue_is_not_an_operation() {
        let t = create_test_store(100);

        t.store.enqueue("/queue/a", frame("1")).unwrap();
        t.store.dequeue("/queue/a").unwrap();
        assert!(t.store.dequeue("/queue/a").unwrap().is_none());
        assert!(t.store.dequeue("/queue/unknown").unwrap().is_none());

        let stats = t.store.destination_stats("/queue/a").unwrap().unwrap();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.dequeued, 1);
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 2);
    }

    #[test]
    fn test_frames_are_written_through() {
        let t = create_test_store(100);

        t.store.enqueue("/queue/a", frame("1")).unwrap();
        assert!(t.frames.contains(&encode_frame_key("1")));
        assert!(!t.metadata.contains(&encode_queue_key("/queue/a")));

        t.store.dequeue("/queue/a").unwrap();
        assert!(!t.frames.contains(&encode_frame_key("1")));
    }

    #[test]
    fn test_missing_payload_surfaces_error() {
        let t = create_test_store(1);
        let mut frames = t.frames.clone();

        t.store.enqueue("/queue/a", frame("1")).unwrap();
        t.store.enqueue("/queue/a", frame("2")).unwrap();
        assert_eq!(t.metadata.flushes(), 1);
        frames.delete(&encode_frame_key("1")).unwrap();

        let result = t.store.dequeue("/queue/a");
        assert!(matches!(result, Err(QueueError::FrameNotFound(id)) if id == "1"));

        // The consumed id counts toward the next checkpoint
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 1);
        t.store.dequeue("/queue/a").unwrap();
        assert_eq!(t.metadata.flushes(), 2);

        let stats = t.store.destination_stats("/queue/a").unwrap().unwrap();
        assert_eq!(stats.depth, 0);
        assert_eq!(stats.dequeued, 2);
    }

    #[test]
    fn test_enqueue_rolls_back_when_payload_write_fails() {
        let t = create_test_store(100);
        t.store.enqueue("/queue/a", frame("1")).unwrap();

        t.frames.fail_next_writes(1);
        let result = t.store.enqueue("/queue/a", frame("2"));
        assert!(matches!(result, Err(QueueError::Backend(_))));

        t.frames.fail_next_writes(1);
        let result = t.store.enqueue("/queue/new", frame("3"));
        assert!(matches!(result, Err(QueueError::Backend(_))));

        let stats = t.store.destination_stats("/queue/a").unwrap().unwrap();
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.enqueued, 1);
        assert!(t.store.destination_stats("/queue/new").unwrap().is_none());
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 1);
        assert_eq!(t.store.metrics().frames_enqueued, 1);

        assert_eq!(t.store.dequeue("/queue/a").unwrap().unwrap().message_id, "1");
        assert!(t.store.dequeue("/queue/a").unwrap().is_none());
    }

    #[test]
    fn test_dequeue_keeps_frame_when_payload_delete_fails() {
        let t = create_test_store(100);
        t.store.enqueue("/queue/a", frame("1")).unwrap();
        t.store.enqueue("/queue/a", frame("2")).unwrap();

        t.frames.fail_next_writes(1);
        let result = t.store.dequeue("/queue/a");
        assert!(matches!(result, Err(QueueError::Backend(_))));

        assert!(t.frames.contains(&encode_frame_key("1")));
        let stats = t.store.destination_stats("/queue/a").unwrap().unwrap();
        assert_eq!(stats.depth, 2);
        assert_eq!(stats.dequeued, 0);
        assert_eq!(t.store.stats().unwrap().unflushed_operations, 2);

        assert_eq!(t.store.dequeue("/queue/a").unwrap().unwrap().message_id, "1");
        assert_eq!(t.store.dequeue("/queue/a").unwrap().unwrap().message_id, "2");
    }

    #[test]
    fn test_failed_checkpoint_is_retried() {
        let t = create_test_store(100);
        t.store.enqueue("/queue/a", frame("1")).unwrap();
        t.store.enqueue("/queue/b", frame("2")).unwrap();

        t.metadata.fail_next_writes(1);
        assert!(matches!(t.store.checkpoint(), Err(QueueError::Backend(_))));

        let stats = t.store.stats().unwrap();
        assert_eq!(stats.unflushed_operations, 2);
        assert_eq!(stats.checkpoints, 0);

        t.store.close().unwrap();

        let config = StoreConfig::default();
        let reopened = QueueStore::from_backends(t.metadata.clone(), t.frames.clone(), &config);
        assert_eq!(reopened.size("/queue/a").unwrap(), 1);
        assert_eq!(reopened.dequeue("/queue/b").unwrap().unwrap().message_id, "2");
    }

    #[test]
    fn test_failed_threshold_checkpoint_surfaces_and_retries() {
        let t = create_test_store(1);
        t.store.enqueue("/queue/a", frame("1")).unwrap();

        t.metadata.fail_next_writes(1);
        let result = t.store.enqueue("/queue/a", frame("2"));
        assert!(matches!(result, Err(QueueError::Backend(_))));

        // The enqueue itself was applied before the checkpoint failed
        assert_eq!(t.store.size("/queue/a").unwrap(), 2);
        assert!(!t.metadata.contains(&encode_queue_key("/queue/a")));

        t.store.enqueue("/queue/a", frame("3")).unwrap();
        assert!(t.metadata.contains(&encode_queue_key("/queue/a")));
        assert_eq!(t.store.stats().unwrap().checkpoints, 1);
    }

    #[test]
    fn test_counter_invariant() {
        let t = create_test_store(3);

        for i in 0..7 {
            t.store.enqueue("/queue/a", frame(&format!("a{}", i))).unwrap();
            if i % 2 == 0 {
                t.store.dequeue("/queue/a").unwrap();
            }
            let stats = t.store.destination_stats("/queue/a").unwrap().unwrap();
            assert_eq!(stats.enqueued - stats.dequeued, stats.depth as u64);
            assert_eq!(stats.depth, t.store.size("/queue/a").unwrap());
        }
    }

    #[test]
    fn test_purge_drops_metadata_and_payloads() {
        let t = create_test_store(100);

        t.store.enqueue("/queue/a", frame("1")).unwrap();
        t.store.enqueue("/queue/a", frame("2")).unwrap();
        t.store.enqueue("/queue/b", frame("3")).unwrap();

        assert_eq!(t.store.purge("/queue/a").unwrap(), 2);
        assert_eq!(t.store.size("/queue/a").unwrap(), 0);
        assert!(!t.frames.contains(&encode_frame_key("1")));
        assert!(t.frames.contains(&encode_frame_key("3")));
        assert_eq!(t.store.size("/queue/b").unwrap(), 1);
    }

    #[test]
    fn test_stats_lists_destinations() {
        let t = create_test_store(100);

        t.store.enqueue("/queue/b", frame("1")).unwrap();
        t.store.enqueue("/queue/a", frame("2")).unwrap();
        t.store.enqueue("/queue/a", frame("3")).unwrap();
        t.store.dequeue("/queue/a").unwrap();

        let stats = t.store.stats().unwrap();
        assert_eq!(stats.archived_frames, 2);
        assert_eq!(
            stats.destinations,
            vec![
                DestinationStats {
                    destination: "/queue/a".to_string(),
                    depth: 1,
                    enqueued: 2,
                    dequeued: 1,
                },
                DestinationStats {
                    destination: "/queue/b".to_string(),
                    depth: 1,
                    enqueued: 1,
                    dequeued: 0,
                },
            ]
        );
    }

    #[test]
    fn test_close_flushes_and_rejects_later_calls() {
        let t = create_test_store(100);

        t.store.enqueue("/queue/a", frame("1")).unwrap();
        t.store.close().unwrap();

        assert!(t.metadata.contains(&encode_queue_key("/queue/a")));
        assert!(matches!(t.store.size("/queue/a"), Err(QueueError::Closed)));
        assert!(matches!(
            t.store.enqueue("/queue/a", frame("2")),
            Err(QueueError::Closed)
        ));

        // Second close is a no-op
        t.store.close().unwrap();
    }

    #[test]
    fn test_drop_checkpoints_unclosed_store() {
        let t = create_test_store(100);
        let metadata = t.metadata.clone();

        t.store.enqueue("/queue/a", frame("1")).unwrap();
        drop(t);

        assert!(metadata.contains(&encode_queue_key("/queue/a")));
    }

    #[test]
    fn test_open_rejects_missing_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::builder()
            .data_dir(temp_dir.path().join("absent"))
            .build();

        let result = QueueStore::open(&config);
        assert!(matches!(result, Err(QueueError::Config(_))));
        assert!(!temp_dir.path().join("absent").exists());
    }

    #[test]
    fn test_open_creates_both_stores() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::builder().data_dir(temp_dir.path()).build();

        let store = QueueStore::open(&config).unwrap();
        store.enqueue("/queue/a", frame("1")).unwrap();
        store.close().unwrap();

        assert!(temp_dir.path().join(METADATA_STORE).is_dir());
        assert!(temp_dir.path().join(FRAME_STORE).is_dir());
    }
}
