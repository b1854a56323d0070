// Snapshot store adapters
pub mod memory;
pub mod redis_store;

use async_trait::async_trait;

use crate::models::{FieldDeltas, Snapshot};
use crate::Result;

pub use self::memory::MemorySnapshotStore;
pub use self::redis_store::RedisSnapshotStore;

/// Key-value store holding one snapshot record per instrument
///
/// `update` must be all-or-nothing and return the record as it stands after the write.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the current record, None when the instrument was never seen
    async fn get(&self, symbol: &str) -> Result<Option<Snapshot>>;

    /// Write field-level deltas (last write wins) and return the merged record
    async fn update(&self, symbol: &str, deltas: &FieldDeltas) -> Result<Snapshot>;
}
