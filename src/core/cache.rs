//! Storage abstractions backing the result cache

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A named, byte-keyed collection of records.
///
/// Implementations must make every successful write durable before returning.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Inserts or replaces the value stored under `key`.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Stores `value` under the next sequence id and returns that id.
    ///
    /// Ids start at 1 and are strictly increasing within a collection. They are
    /// encoded as big-endian `u64` keys so key order matches append order.
    async fn append(&self, value: &[u8]) -> Result<u64>;

    /// All entries in ascending key order.
    async fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Hands out collections by name.
pub trait Store: Send + Sync {
    fn get_collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>>;
}

/// Encodes a sequence id as a collection key.
pub fn sequence_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decodes a collection key produced by [`sequence_key`].
pub fn sequence_id(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
