use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};

use super::{KvBackend, Result};

/// One Fjall keyspace holding a single partition
///
/// The metadata index and the frame archive each get their own keyspace so
/// they can be flushed independently.
pub struct FjallBackend {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallBackend {
    /// Open or create a keyspace at `path` with partition `name`
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        info!(partition = name, "Opening Fjall keyspace at: {}", path.display());

        std::fs::create_dir_all(path)?;

        let keyspace = Config::new(path).open()?;
        let partition = keyspace.open_partition(name, PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            partition,
        })
    }
}

impl KvBackend for FjallBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.partition.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.partition.insert(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.partition.remove(key)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for item in self.partition.iter() {
            let (key, _) = item?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn close(self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Fjall keyspace persisted and released");
        Ok(())
    }
}
