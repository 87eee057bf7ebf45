use crate::core::cache::{KeyValueCollection, sequence_id, sequence_key};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory collection backed by an ordered map
#[derive(Default)]
pub struct MemoryCollection {
    inner: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let map = self.inner.lock().await;
        let value = map.get(key).cloned();
        if value.is_some() {
            debug!("Cache HIT for key: {:?}", String::from_utf8_lossy(key));
        } else {
            debug!("Cache MISS for key: {:?}", String::from_utf8_lossy(key));
        }
        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut map = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", String::from_utf8_lossy(key));
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn append(&self, value: &[u8]) -> Result<u64> {
        let mut map = self.inner.lock().await;
        let next_id = map
            .keys()
            .next_back()
            .and_then(|key| sequence_id(key))
            .unwrap_or(0)
            + 1;
        map.insert(sequence_key(next_id).to_vec(), value.to_vec());
        debug!("Cache APPEND with id: {}", next_id);
        Ok(next_id)
    }

    async fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let map = self.inner.lock().await;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
