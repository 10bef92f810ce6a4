//! The persisted key-value substrate shared by every context.
//!
//! Writers never lock across contexts; the last write wins.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DetectionResult;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> DetectionResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> DetectionResult<()>;

    async fn remove(&self, key: &str) -> DetectionResult<()>;
}
