//! Per-request driver tying the result cache to the price source.

use crate::core::aggregate::{average_close, build_result, closing_window, opening_window};
use crate::core::config::LookupConfig;
use crate::core::error::{LookupError, SourceError};
use crate::core::model::{QueryResult, normalize_symbol};
use crate::core::price::PriceSource;
use crate::result_cache::ResultCache;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct RequestOrchestrator {
    cache: Arc<ResultCache>,
    source: Arc<dyn PriceSource>,
    opening_since: DateTime<Utc>,
    recent_window: Duration,
    timeout: std::time::Duration,
}

impl RequestOrchestrator {
    pub fn new(
        cache: Arc<ResultCache>,
        source: Arc<dyn PriceSource>,
        config: &LookupConfig,
    ) -> Self {
        Self {
            cache,
            source,
            opening_since: config.opening_since(),
            recent_window: config.recent_window(),
            timeout: config.timeout(),
        }
    }

    /// Overrides the upper bound applied to each price source call.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Resolves what `investment` placed in `symbol` at listing is worth now.
    ///
    /// A fresh cached result is returned without touching the price source.
    /// Storage failures never surface here: reads degrade to an upstream fetch
    /// and writes are logged.
    #[instrument(name = "Lookup", skip(self), fields(symbol = %symbol))]
    pub async fn process(
        &self,
        symbol: &str,
        investment: u64,
    ) -> Result<QueryResult, LookupError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(LookupError::InvalidInput(
                "symbol must not be empty".to_string(),
            ));
        }
        if investment == 0 {
            return Err(LookupError::InvalidInput(
                "investment must be greater than zero".to_string(),
            ));
        }

        if let Err(e) = self.cache.log_usage(&symbol, investment).await {
            warn!("{e}; continuing without a usage record");
        }

        if self.cache.has_fresh_result(&symbol, investment).await
            && let Some(cached) = self.cache.get_result(&symbol, investment).await
        {
            info!("Serving cached result");
            return Ok(cached);
        }

        if !self.bounded(self.source.symbol_exists(&symbol)).await? {
            info!("Symbol is unknown to the price source");
            return Err(LookupError::SymbolNotFound(symbol));
        }

        let start_avg = match self.cache.get_opening_average(&symbol).await {
            Some(average) => {
                debug!(%average, "Reusing cached opening average");
                average
            }
            None => self.resolve_opening_average(&symbol).await?,
        };

        let since = Utc::now() - self.recent_window;
        let recent = self.bounded(self.source.fetch_series(&symbol, since)).await?;
        let end_avg = average_close(closing_window(&recent)).ok_or_else(|| {
            LookupError::UpstreamTransient(format!("no recent price data for {symbol}"))
        })?;
        debug!(%start_avg, %end_avg, periods = recent.len(), "Computed averages");

        let mut result = build_result(investment, start_avg, end_avg, &symbol)?;
        if let Err(e) = self.cache.put_result(&mut result).await {
            warn!("{e}; returning result without caching it");
        }
        info!(profit = %result.profit, "Computed fresh result");
        Ok(result)
    }

    /// Computes and caches the opening average from the earliest series.
    async fn resolve_opening_average(&self, symbol: &str) -> Result<Decimal, LookupError> {
        let series = self
            .bounded(self.source.fetch_series(symbol, self.opening_since))
            .await?;
        let average = average_close(opening_window(&series)).ok_or_else(|| {
            LookupError::UpstreamTransient(format!("no opening price data for {symbol}"))
        })?;
        if average.is_zero() {
            return Err(LookupError::InvalidInput(format!(
                "opening average for {symbol} is zero"
            )));
        }

        if let Err(e) = self.cache.put_opening_average(symbol, average).await {
            warn!("{e}; opening average will be fetched again next time");
        }
        debug!(%average, periods = series.len(), "Computed opening average");
        Ok(average)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, LookupError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(res) => res.map_err(LookupError::from),
            Err(_) => Err(LookupError::UpstreamTransient(format!(
                "price source did not answer within {:?}",
                self.timeout
            ))),
        }
    }
}
