use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{BackendError, KvBackend, Result};

/// In-memory backend for tests and development
///
/// Clones share the same map, so a test can keep a handle and inspect what the
/// store actually wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
    flushes: Arc<AtomicU64>,
    failing_writes: Arc<AtomicU64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has been written (and not deleted)
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of times `flush` (or `close`) has been called
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Make the next `count` calls to `put`, `delete` or `flush` fail with an
    /// I/O error; 0 clears any remaining failures
    pub fn fail_next_writes(&self, count: u64) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        let fail = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(BackendError::Io(io::Error::other("memory backend write failure")));
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_write()?;
        self.entries.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.check_write()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_write()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    fn close(mut self) -> Result<()> {
        self.flush()
    }
}
