//! Records kept by the result cache

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How long a computed [`QueryResult`] may be served from cache.
pub const FRESHNESS_WINDOW: Duration = Duration::days(7);

/// Trims and uppercases a user supplied symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Opaque cache key for a (symbol, investment) pair.
pub fn query_key(symbol: &str, investment: u64) -> String {
    format!("{}-{}", normalize_symbol(symbol), investment)
}

/// Mean closing price over the first trading periods after a symbol listed.
///
/// This never changes once known, so it is cached without expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningAverage {
    pub symbol: String,
    pub average_price: Decimal,
}

/// The outcome of a hypothetical investment made at listing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub number_of_units: Decimal,
    pub profit: Decimal,
    pub growth_factor: Decimal,
    pub affordability_index: Decimal,
    pub investment: u64,
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
}

impl QueryResult {
    pub fn key(&self) -> String {
        query_key(&self.symbol, self.investment)
    }

    /// Whether the result is younger than [`FRESHNESS_WINDOW`] at `now`.
    ///
    /// A result stamped in the future is never fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.generated_at);
        age >= Duration::zero() && age < FRESHNESS_WINDOW
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    #[serde(default)]
    pub id: u64,
    pub symbol: String,
    pub investment: u64,
    pub generated_at: DateTime<Utc>,
}
