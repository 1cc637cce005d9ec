//! Key layout and encoding utilities for the two stores
//!
//! Store structure:
//! - `metadata` keyspace, `queues` partition: queue:{destination} -> QueueMetadataEntry (JSON)
//! - `frames` keyspace, `frames` partition: frame:{message_id} -> Frame (protobuf)

pub const METADATA_STORE: &str = "metadata";
pub const METADATA_PARTITION: &str = "queues";
pub const FRAME_STORE: &str = "frames";
pub const FRAME_PARTITION: &str = "frames";

/// Encode a queue key: queue:{destination}
pub fn encode_queue_key(destination: &str) -> Vec<u8> {
    format!("queue:{}", destination).into_bytes()
}

/// Decode a queue key: queue:{destination} -> destination
pub fn decode_queue_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("queue:").map(String::from)
}

/// Encode a frame key: frame:{message_id}
pub fn encode_frame_key(message_id: &str) -> Vec<u8> {
    format!("frame:{}", message_id).into_bytes()
}

/// Decode a frame key: frame:{message_id} -> message_id
pub fn decode_frame_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("frame:").map(String::from)
}
