use thiserror::Error;

use crate::config::ValidationError;
use crate::storage::BackendError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid store configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("Cannot queue a frame without message-id set (destination: {0})")]
    MissingMessageId(String),

    #[error("Storage error: {0}")]
    Backend(#[from] BackendError),

    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protobuf decode error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("Frame not found in archive: {0}")]
    FrameNotFound(String),

    #[error("Queue store is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
