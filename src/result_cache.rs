//! Persistent memo of opening averages, computed results and usage.
//!
//! Three collections with different rules live here:
//! - opening averages never expire,
//! - query results are served only while younger than [`FRESHNESS_WINDOW`],
//! - the usage log is append-only.
//!
//! Reads fail open: a storage error is logged and reported as a miss. Writes
//! return a [`CacheError`] for the caller to log; they never panic.

use crate::core::cache::{KeyValueCollection, Store, sequence_id};
use crate::core::error::CacheError;
use crate::core::model::{
    FRESHNESS_WINDOW, OpeningAverage, QueryResult, UsageLogEntry, normalize_symbol, query_key,
};
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, warn};

pub const OPENING_AVERAGES: &str = "opening_averages";
pub const QUERY_RESULTS: &str = "query_results";
pub const USAGE_LOG: &str = "usage_log";

pub struct ResultCache {
    opening_averages: Arc<dyn KeyValueCollection>,
    query_results: Arc<dyn KeyValueCollection>,
    usage_log: Arc<dyn KeyValueCollection>,
}

impl ResultCache {
    pub fn open(store: &dyn Store) -> Result<Self> {
        Ok(Self::from_collections(
            store.get_collection(OPENING_AVERAGES)?,
            store.get_collection(QUERY_RESULTS)?,
            store.get_collection(USAGE_LOG)?,
        ))
    }

    pub fn from_collections(
        opening_averages: Arc<dyn KeyValueCollection>,
        query_results: Arc<dyn KeyValueCollection>,
        usage_log: Arc<dyn KeyValueCollection>,
    ) -> Self {
        Self {
            opening_averages,
            query_results,
            usage_log,
        }
    }

    /// True when a result exists for the pair and is still inside the
    /// freshness window.
    pub async fn has_fresh_result(&self, symbol: &str, investment: u64) -> bool {
        match self.get_result(symbol, investment).await {
            Some(result) => {
                let fresh = result.is_fresh_at(Utc::now());
                if !fresh {
                    debug!(
                        key = %result.key(),
                        generated_at = %result.generated_at,
                        "Cached result is older than {} days",
                        FRESHNESS_WINDOW.num_days()
                    );
                }
                fresh
            }
            None => false,
        }
    }

    /// The stored result for the pair, stale or not.
    pub async fn get_result(&self, symbol: &str, investment: u64) -> Option<QueryResult> {
        let key = query_key(symbol, investment);
        read_record(self.query_results.as_ref(), &key).await
    }

    pub async fn has_opening_average(&self, symbol: &str) -> bool {
        self.get_opening_average(symbol).await.is_some()
    }

    pub async fn get_opening_average(&self, symbol: &str) -> Option<Decimal> {
        let key = normalize_symbol(symbol);
        read_record::<OpeningAverage>(self.opening_averages.as_ref(), &key)
            .await
            .map(|record| record.average_price)
    }

    /// Stores the opening average for `symbol`, replacing any previous value.
    pub async fn put_opening_average(
        &self,
        symbol: &str,
        average_price: Decimal,
    ) -> Result<(), CacheError> {
        let record = OpeningAverage {
            symbol: normalize_symbol(symbol),
            average_price,
        };
        write_record(self.opening_averages.as_ref(), &record.symbol, &record).await
    }

    /// Stamps `result.generated_at` with the current time and upserts it.
    ///
    /// The stamp is applied before the write, so the caller holds exactly what
    /// a later cache hit would return even when persisting fails.
    pub async fn put_result(&self, result: &mut QueryResult) -> Result<(), CacheError> {
        result.generated_at = Utc::now();
        self.store_result(result).await
    }

    pub(crate) async fn store_result(&self, result: &QueryResult) -> Result<(), CacheError> {
        write_record(self.query_results.as_ref(), &result.key(), result).await
    }

    /// Appends a usage entry and returns its sequence id.
    pub async fn log_usage(&self, symbol: &str, investment: u64) -> Result<u64, CacheError> {
        let entry = UsageLogEntry {
            id: 0,
            symbol: normalize_symbol(symbol),
            investment,
            generated_at: Utc::now(),
        };
        let write_failure = |reason: String| CacheError::WriteFailure {
            key: USAGE_LOG.to_string(),
            reason,
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| write_failure(e.to_string()))?;
        let id = self
            .usage_log
            .append(&bytes)
            .await
            .map_err(|e| write_failure(e.to_string()))?;
        debug!(id, symbol = %entry.symbol, investment, "Logged usage");
        Ok(id)
    }

    /// The usage log in the order requests arrived.
    pub async fn usage_entries(&self) -> Result<Vec<UsageLogEntry>, CacheError> {
        let read_failure = |reason: String| CacheError::ReadFailure {
            key: USAGE_LOG.to_string(),
            reason,
        };
        let rows = self
            .usage_log
            .entries()
            .await
            .map_err(|e| read_failure(e.to_string()))?;

        rows.into_iter()
            .map(|(key, value)| {
                let mut entry: UsageLogEntry =
                    serde_json::from_slice(&value).map_err(|e| read_failure(e.to_string()))?;
                entry.id = sequence_id(&key).unwrap_or_default();
                Ok(entry)
            })
            .collect()
    }
}

async fn read_record<T: DeserializeOwned>(
    collection: &dyn KeyValueCollection,
    key: &str,
) -> Option<T> {
    match try_read_record(collection, key).await {
        Ok(record) => record,
        Err(e) => {
            let err = CacheError::ReadFailure {
                key: key.to_string(),
                reason: e.to_string(),
            };
            warn!("{err}; treating as a cache miss");
            None
        }
    }
}

async fn try_read_record<T: DeserializeOwned>(
    collection: &dyn KeyValueCollection,
    key: &str,
) -> Result<Option<T>> {
    let Some(bytes) = collection.get(key.as_bytes()).await? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

async fn write_record<T: Serialize>(
    collection: &dyn KeyValueCollection,
    key: &str,
    record: &T,
) -> Result<(), CacheError> {
    let write_failure = |reason: String| CacheError::WriteFailure {
        key: key.to_string(),
        reason,
    };
    let bytes = serde_json::to_vec(record).map_err(|e| write_failure(e.to_string()))?;
    collection
        .put(key.as_bytes(), &bytes)
        .await
        .map_err(|e| write_failure(e.to_string()))
}
