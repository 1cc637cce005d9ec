use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::Result;
use super::keys::{decode_queue_key, encode_queue_key};
use crate::storage::KvBackend;

/// Per-destination queue record
///
/// `pending` holds message ids oldest first. The counters only ever grow, so
/// `enqueued - dequeued == pending.len()` holds for every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetadataEntry {
    pub pending: VecDeque<String>,
    pub enqueued: u64,
    pub dequeued: u64,
}

impl QueueMetadataEntry {
    pub fn depth(&self) -> usize {
        self.pending.len()
    }
}

/// Write-back cache of queue records over a metadata backend
///
/// Records are loaded on first touch and mutated in memory. Nothing reaches the
/// backend until `flush`, which writes every dirty record and then makes the
/// backend durable.
pub struct MetadataIndex<B> {
    backend: B,
    cache: HashMap<String, QueueMetadataEntry>,
    dirty: HashSet<String>,
}

impl<B: KvBackend> MetadataIndex<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    fn load(&mut self, destination: &str) -> Result<Option<&mut QueueMetadataEntry>> {
        if !self.cache.contains_key(destination) {
            if let Some(bytes) = self.backend.get(&encode_queue_key(destination))? {
                let entry: QueueMetadataEntry = serde_json::from_slice(&bytes)?;
                self.cache.insert(destination.to_string(), entry);
            }
        }
        Ok(self.cache.get_mut(destination))
    }

    /// Append `message_id` to the tail of `destination`'s queue
    ///
    /// Returns true when this created the destination's record.
    pub fn enqueue_id(&mut self, destination: &str, message_id: &str) -> Result<bool> {
        let created = self.load(destination)?.is_none();
        let entry = self.cache.entry(destination.to_string()).or_default();
        entry.pending.push_back(message_id.to_string());
        entry.enqueued += 1;
        self.dirty.insert(destination.to_string());
        Ok(created)
    }

    /// Remove and return the oldest pending id, if any
    pub fn dequeue_id(&mut self, destination: &str) -> Result<Option<String>> {
        let Some(entry) = self.load(destination)? else {
            return Ok(None);
        };
        let Some(message_id) = entry.pending.pop_front() else {
            return Ok(None);
        };
        entry.dequeued += 1;
        self.dirty.insert(destination.to_string());
        Ok(Some(message_id))
    }

    /// Undo the `enqueue_id` that just returned `created` for `destination`
    pub fn revert_enqueue(&mut self, destination: &str, created: bool) {
        if created {
            self.cache.remove(destination);
            self.dirty.remove(destination);
        } else if let Some(entry) = self.cache.get_mut(destination) {
            entry.pending.pop_back();
            entry.enqueued = entry.enqueued.saturating_sub(1);
        }
    }

    /// Put a dequeued id back at the head of its queue
    pub fn requeue_front(&mut self, destination: &str, message_id: String) {
        if let Some(entry) = self.cache.get_mut(destination) {
            entry.pending.push_front(message_id);
            entry.dequeued = entry.dequeued.saturating_sub(1);
        }
    }

    pub fn has_pending(&mut self, destination: &str) -> Result<bool> {
        Ok(self
            .load(destination)?
            .is_some_and(|entry| !entry.pending.is_empty()))
    }

    pub fn depth(&mut self, destination: &str) -> Result<usize> {
        Ok(self.load(destination)?.map_or(0, |entry| entry.depth()))
    }

    /// Snapshot of a destination's record
    pub fn entry(&mut self, destination: &str) -> Result<Option<QueueMetadataEntry>> {
        Ok(self.load(destination)?.cloned())
    }

    /// Every destination known to the cache or the backend
    pub fn destinations(&self) -> Result<BTreeSet<String>> {
        let mut destinations: BTreeSet<String> = self
            .backend
            .keys()?
            .iter()
            .filter_map(|key| decode_queue_key(key))
            .collect();
        destinations.extend(self.cache.keys().cloned());
        Ok(destinations)
    }

    /// Drop a destination's record from both cache and backend
    ///
    /// Returns the ids that were still pending so the caller can drop their
    /// payloads.
    pub fn purge(&mut self, destination: &str) -> Result<Vec<String>> {
        let pending: Vec<String> = self
            .load(destination)?
            .map(|entry| entry.pending.drain(..).collect())
            .unwrap_or_default();
        self.cache.remove(destination);
        self.dirty.remove(destination);
        self.backend.delete(&encode_queue_key(destination))?;
        Ok(pending)
    }

    /// Number of records changed since the last flush
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Write dirty records to the backend and make them durable
    ///
    /// A record leaves the dirty set only once its write succeeded, so a failed
    /// flush can be retried. Returns the number of records written.
    pub fn flush(&mut self) -> Result<usize> {
        let mut written = 0;
        let dirty: Vec<String> = self.dirty.iter().cloned().collect();
        for destination in dirty {
            if let Some(entry) = self.cache.get(&destination) {
                let value = serde_json::to_vec(entry)?;
                self.backend.put(&encode_queue_key(&destination), &value)?;
                written += 1;
            }
            self.dirty.remove(&destination);
        }
        self.backend.flush()?;
        debug!(written, "Metadata index flushed");
        Ok(written)
    }

    /// Release the backend; callers flush first
    pub fn close(self) -> Result<()> {
        self.backend.close()?;
        Ok(())
    }
}
