//! Price data abstractions and core types

use crate::core::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC period as reported by a price source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub vwap: Decimal,
    pub volume: Decimal,
    pub count: u64,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Whether the source knows `symbol`.
    ///
    /// `Ok(false)` is reserved for an explicit "unknown instrument" answer; any
    /// other failure is a [`SourceError::Transient`].
    async fn symbol_exists(&self, symbol: &str) -> Result<bool, SourceError>;

    /// Price series for `symbol` starting at `since`, oldest period first.
    async fn fetch_series(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceCandle>, SourceError>;
}
