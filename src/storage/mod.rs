//! Key-value persistence abstraction for the queue store
//! Backed by Fjall on disk, or an in-memory map for tests

mod disk;
mod memory;

pub use disk::FjallBackend;
pub use memory::MemoryBackend;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backend result type
pub type Result<T> = std::result::Result<T, BackendError>;

/// Minimal key-value interface the metadata index and frame archive are written against
///
/// Single-key writes must be atomic. Nothing is guaranteed durable until `flush`
/// returns.
pub trait KvBackend: Send {
    /// Fetch the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any existing value
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Make every write so far durable
    fn flush(&mut self) -> Result<()>;

    /// List all keys (inspection only, not on any hot path)
    fn keys(&self) -> Result<Vec<Vec<u8>>>;

    /// Flush and release the underlying resources
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
