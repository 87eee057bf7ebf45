use crate::core::cache::{KeyValueCollection, sequence_id, sequence_key};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Collection stored in a fjall partition.
///
/// Every write is followed by a synchronous journal flush, so a returned
/// `Ok` survives a crash. Partition access and flushes run on tokio's
/// blocking pool and never stall the calling task's executor thread.
pub struct DiskCollection {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
    // Serializes appends so two writers never pick the same sequence id
    append_lock: Mutex<()>,
}

impl DiskCollection {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
            append_lock: Mutex::new(()),
        }
    }

    /// Runs `op` against the partition on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Keyspace, &PartitionHandle) -> Result<T> + Send + 'static,
    {
        let keyspace = Arc::clone(&self.keyspace);
        let partition = self.partition.clone();
        tokio::task::spawn_blocking(move || op(&keyspace, &partition))
            .await
            .context("Storage task panicked")?
    }
}

fn persist(keyspace: &Keyspace) -> Result<()> {
    keyspace.persist(PersistMode::SyncAll)?;
    Ok(())
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let owned_key = key.to_vec();
        let value = self
            .blocking(move |_, partition| {
                Ok(partition.get(&owned_key)?.map(|slice| slice.to_vec()))
            })
            .await?;
        if value.is_some() {
            debug!("Cache HIT for key: {:?}", String::from_utf8_lossy(key));
        } else {
            debug!("Cache MISS for key: {:?}", String::from_utf8_lossy(key));
        }
        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let (owned_key, owned_value) = (key.to_vec(), value.to_vec());
        self.blocking(move |keyspace, partition| {
            partition.insert(owned_key, owned_value)?;
            persist(keyspace)
        })
        .await?;
        debug!("Cache PUT for key: {:?}", String::from_utf8_lossy(key));
        Ok(())
    }

    async fn append(&self, value: &[u8]) -> Result<u64> {
        let _guard = self.append_lock.lock().await;
        let owned_value = value.to_vec();
        let next_id = self
            .blocking(move |keyspace, partition| {
                let last_id = match partition.last_key_value()? {
                    Some((key, _)) => sequence_id(&key).unwrap_or(0),
                    None => 0,
                };
                let next_id = last_id + 1;
                partition.insert(sequence_key(next_id).to_vec(), owned_value)?;
                persist(keyspace)?;
                Ok(next_id)
            })
            .await?;
        debug!("Cache APPEND with id: {}", next_id);
        Ok(next_id)
    }

    async fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.blocking(|_, partition| {
            partition
                .iter()
                .map(|item| -> Result<(Vec<u8>, Vec<u8>)> {
                    let (key, value) = item?;
                    Ok((key.to_vec(), value.to_vec()))
                })
                .collect()
        })
        .await
    }
}
