//! Protobuf message types persisted by the frame archive
//!
//! `Frame` is the only message: the broker hands it to the store opaquely and
//! gets the same bytes back on dequeue. The store only ever reads
//! `message_id`.
//!
//! ## Usage
//!
//! ```rust
//! use framestore::proto::Frame;
//! use prost::Message;
//!
//! let frame = Frame::new("msg-1", b"hello".to_vec()).with_header("content-type", "text/plain");
//! let bytes = frame.encode_to_vec();
//! let decoded = Frame::decode(&bytes[..]).unwrap();
//! assert_eq!(decoded, frame);
//! ```

use std::collections::BTreeMap;

/// A message payload with a caller-assigned identifier
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Frame {
    /// Unique id; must be non-empty to be enqueued
    #[prost(string, tag = "1")]
    pub message_id: String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub headers: BTreeMap<String, String>,
    #[prost(bytes = "vec", tag = "3")]
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(message_id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: message_id.into(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
