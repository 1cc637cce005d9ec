use prost::Message;
use tracing::debug;

use super::error::{QueueError, Result};
use super::keys::{decode_frame_key, encode_frame_key};
use crate::proto::Frame;
use crate::storage::KvBackend;

/// Payload store keyed by message id
///
/// Frames are written once and read once, so there is no cache: every put and
/// take goes straight to the backend. With `sync_writes` each of those also
/// flushes the backend.
pub struct FrameArchive<B> {
    backend: B,
    sync_writes: bool,
}

impl<B: KvBackend> FrameArchive<B> {
    pub fn new(backend: B, sync_writes: bool) -> Self {
        Self {
            backend,
            sync_writes,
        }
    }

    /// Store a frame under its message id, replacing any previous payload
    pub fn put(&mut self, frame: &Frame) -> Result<()> {
        let key = encode_frame_key(&frame.message_id);
        self.backend.put(&key, &frame.encode_to_vec())?;
        self.sync()?;
        debug!(message_id = %frame.message_id, "Frame archived");
        Ok(())
    }

    /// Return the frame for `message_id` and remove it from the archive
    pub fn take(&mut self, message_id: &str) -> Result<Frame> {
        let key = encode_frame_key(message_id);
        let bytes = self
            .backend
            .get(&key)?
            .ok_or_else(|| QueueError::FrameNotFound(message_id.to_string()))?;
        let frame = Frame::decode(&*bytes)?;
        self.backend.delete(&key)?;
        self.sync()?;
        Ok(frame)
    }

    /// Drop a payload without reading it; returns whether it existed
    pub fn remove(&mut self, message_id: &str) -> Result<bool> {
        let key = encode_frame_key(message_id);
        let existed = self.backend.get(&key)?.is_some();
        if existed {
            self.backend.delete(&key)?;
            self.sync()?;
        }
        Ok(existed)
    }

    /// Ids of every archived payload
    pub fn message_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .keys()?
            .iter()
            .filter_map(|key| decode_frame_key(key))
            .collect())
    }

    fn sync(&mut self) -> Result<()> {
        if self.sync_writes {
            self.backend.flush()?;
        }
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.backend.close()?;
        Ok(())
    }
}
