pub mod archive;
pub mod checkpoint;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod store;

pub use checkpoint::CheckpointScheduler;
pub use error::{QueueError, Result};
pub use metadata::QueueMetadataEntry;
pub use store::{DestinationStats, QueueStore, StoreStats};
