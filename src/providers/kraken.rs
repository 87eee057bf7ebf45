use crate::core::config::KrakenProviderConfig;
use crate::core::model::normalize_symbol;
use crate::core::{PriceCandle, PriceSource, SourceError};
use crate::providers::util::with_retry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2500);
const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 500;

/// Error fragments Kraken uses when a pair does not exist
const UNKNOWN_PAIR_ERRORS: [&str; 2] = ["Unknown asset pair", "Instrument not found"];

// time, open, high, low, close, vwap, volume, count
type OhlcRow = (i64, String, String, String, String, String, String, u64);

#[derive(Deserialize, Debug)]
struct KrakenOhlcResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, serde_json::Value>,
}

fn parse_decimal(value: &str, pair: &str) -> Result<Decimal, SourceError> {
    Decimal::from_str(value).map_err(|e| {
        SourceError::Transient(format!("Invalid price '{value}' for pair: {pair}: {e}"))
    })
}

fn parse_row(row: OhlcRow, pair: &str) -> Result<PriceCandle, SourceError> {
    let (time, open, high, low, close, vwap, volume, count) = row;
    let timestamp = DateTime::from_timestamp(time, 0).ok_or_else(|| {
        SourceError::Transient(format!("Invalid timestamp {time} for pair: {pair}"))
    })?;

    Ok(PriceCandle {
        timestamp,
        open: parse_decimal(&open, pair)?,
        high: parse_decimal(&high, pair)?,
        low: parse_decimal(&low, pair)?,
        close: parse_decimal(&close, pair)?,
        vwap: parse_decimal(&vwap, pair)?,
        volume: parse_decimal(&volume, pair)?,
        count,
    })
}

/// Extracts the candles from a `result` object, which holds one series keyed
/// by Kraken's pair name next to a `last` cursor.
fn extract_candles(
    result: HashMap<String, serde_json::Value>,
    pair: &str,
) -> Result<Vec<PriceCandle>, SourceError> {
    let series = result
        .into_iter()
        .find(|(key, _)| key != "last")
        .map(|(_, value)| value)
        .ok_or_else(|| SourceError::Transient(format!("No price data found for pair: {pair}")))?;

    let rows: Vec<OhlcRow> = serde_json::from_value(series).map_err(|e| {
        SourceError::Transient(format!("Malformed OHLC rows for pair: {pair}: {e}"))
    })?;

    let mut candles = rows
        .into_iter()
        .map(|row| parse_row(row, pair))
        .collect::<Result<Vec<_>, _>>()?;
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

/// Price source backed by the Kraken public OHLC endpoint
pub struct KrakenProvider {
    base_url: String,
    quote_currency: String,
    interval_minutes: u32,
    request_timeout: Duration,
}

impl KrakenProvider {
    pub fn new(config: &KrakenProviderConfig) -> Self {
        KrakenProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            quote_currency: config.quote_currency.to_uppercase(),
            interval_minutes: config.interval_minutes,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Caps each HTTP attempt; retries happen only after an attempt gives up.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn pair(&self, symbol: &str) -> String {
        format!("{}{}", normalize_symbol(symbol), self.quote_currency)
    }

    async fn fetch_ohlc(&self, symbol: &str, since: i64) -> Result<Vec<PriceCandle>, SourceError> {
        let pair = self.pair(symbol);
        let url = format!(
            "{}/0/public/OHLC?pair={}&interval={}&since={}",
            self.base_url, pair, self.interval_minutes, since
        );
        debug!("Requesting price data from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("lambo/0.1")
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| SourceError::Transient(format!("Failed to build HTTP client: {e}")))?;

        let response = with_retry(
            || async { client.get(&url).send().await },
            RETRIES,
            RETRY_DELAY_MS,
        )
            .await
            .map_err(|e| SourceError::Transient(format!("Request error: {e} for pair: {pair}")))?;

        if !response.status().is_success() {
            return Err(SourceError::Transient(format!(
                "HTTP error: {} for pair: {}",
                response.status(),
                pair
            )));
        }

        let text = response.text().await.map_err(|e| {
            SourceError::Transient(format!("Failed to read response for {pair}: {e}"))
        })?;
        let body: KrakenOhlcResponse = serde_json::from_str(&text).map_err(|e| {
            SourceError::Transient(format!("Failed to parse JSON response for {pair}: {e}"))
        })?;

        if body
            .error
            .iter()
            .any(|err| UNKNOWN_PAIR_ERRORS.iter().any(|known| err.contains(known)))
        {
            return Err(SourceError::UnknownSymbol(normalize_symbol(symbol)));
        }
        if !body.error.is_empty() {
            return Err(SourceError::Transient(format!(
                "Kraken error for pair {}: {}",
                pair,
                body.error.join(", ")
            )));
        }

        extract_candles(body.result, &pair)
    }
}

#[async_trait]
impl PriceSource for KrakenProvider {
    #[instrument(name = "KrakenSymbolCheck", skip(self), fields(symbol = %symbol))]
    async fn symbol_exists(&self, symbol: &str) -> Result<bool, SourceError> {
        match self.fetch_ohlc(symbol, Utc::now().timestamp()).await {
            Ok(_) => Ok(true),
            Err(SourceError::UnknownSymbol(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(name = "KrakenSeriesFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_series(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceCandle>, SourceError> {
        let candles = self.fetch_ohlc(symbol, since.timestamp()).await?;
        debug!(periods = candles.len(), "Received Kraken series");
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OHLC_PATH: &str = "/0/public/OHLC";

    async fn create_mock_server(pair: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OHLC_PATH))
            .and(query_param("pair", pair))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(base_url: &str) -> KrakenProvider {
        KrakenProvider::new(&KrakenProviderConfig {
            base_url: base_url.to_string(),
            ..KrakenProviderConfig::default()
        })
    }

    const SERIES_RESPONSE: &str = r#"{
        "error": [],
        "result": {
            "XXBTZUSD": [
                [1549411200, "3450.0", "3500.0", "3400.0", "3460.5", "3455.1", "210.5", 900],
                [1548111600, "3500.0", "3600.0", "3400.0", "3550.5", "3520.1", "100.5", 1200]
            ],
            "last": 1549411200
        }
    }"#;

    #[tokio::test]
    async fn test_successful_series_fetch() {
        let mock_server = create_mock_server("BTCUSD", 200, SERIES_RESPONSE).await;
        let provider = provider(&mock_server.uri());

        let since = DateTime::from_timestamp(1548111600, 0).unwrap();
        let series = provider.fetch_series("btc", since).await.unwrap();

        assert_eq!(series.len(), 2);
        // Sorted oldest first
        assert_eq!(series[0].timestamp.timestamp(), 1548111600);
        assert_eq!(series[0].close, Decimal::new(35505, 1));
        assert_eq!(series[0].count, 1200);
        assert_eq!(series[1].close, Decimal::new(34605, 1));
        assert_eq!(series[1].volume, Decimal::new(2105, 1));
    }

    #[tokio::test]
    async fn test_symbol_exists() {
        let mock_server = create_mock_server("BTCUSD", 200, SERIES_RESPONSE).await;
        let provider = provider(&mock_server.uri());

        assert_eq!(provider.symbol_exists("BTC").await, Ok(true));
    }

    #[tokio::test]
    async fn test_unknown_pair_is_reported_as_unknown_symbol() {
        let body = r#"{"error": ["EQuery:Unknown asset pair"], "result": {}}"#;
        let mock_server = create_mock_server("FAKEUSD", 200, body).await;
        let provider = provider(&mock_server.uri());

        assert_eq!(provider.symbol_exists("FAKE").await, Ok(false));
        assert_eq!(
            provider
                .fetch_series("FAKE", DateTime::<Utc>::UNIX_EPOCH)
                .await,
            Err(SourceError::UnknownSymbol("FAKE".to_string()))
        );
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mock_server = create_mock_server("BTCUSD", 500, "").await;
        let provider = provider(&mock_server.uri());

        let result = provider.symbol_exists("BTC").await;
        assert_eq!(
            result,
            Err(SourceError::Transient(
                "HTTP error: 500 Internal Server Error for pair: BTCUSD".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_other_kraken_errors_are_transient() {
        let body = r#"{"error": ["EAPI:Rate limit exceeded"], "result": {}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;
        let provider = provider(&mock_server.uri());

        let err = provider.symbol_exists("BTC").await.unwrap_err();
        assert_eq!(
            err,
            SourceError::Transient(
                "Kraken error for pair BTCUSD: EAPI:Rate limit exceeded".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_hung_request_is_retried_then_transient() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(OHLC_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SERIES_RESPONSE)
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(3)
            .mount(&mock_server)
            .await;
        let provider =
            provider(&mock_server.uri()).with_request_timeout(Duration::from_millis(100));

        let err = provider
            .fetch_series("BTC", DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Transient(msg) if msg.contains("Request error")));
    }

    #[tokio::test]
    async fn test_malformed_response_is_transient() {
        let mock_server = create_mock_server("BTCUSD", 200, r#"{"error": "#).await;
        let provider = provider(&mock_server.uri());

        let err = provider
            .fetch_series("BTC", DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .contains("Failed to parse JSON response for BTCUSD")
        );
    }

    #[tokio::test]
    async fn test_invalid_price_is_transient() {
        let body = r#"{"error": [], "result": {"XXBTZUSD": [[1548111600, "abc", "1", "1", "1", "1", "1", 1]], "last": 0}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;
        let provider = provider(&mock_server.uri());

        let err = provider
            .fetch_series("BTC", DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Transient(msg) if msg.contains("Invalid price 'abc'")));
    }

    #[tokio::test]
    async fn test_empty_result_is_transient() {
        let body = r#"{"error": [], "result": {"last": 0}}"#;
        let mock_server = create_mock_server("BTCUSD", 200, body).await;
        let provider = provider(&mock_server.uri());

        let err = provider
            .fetch_series("BTC", DateTime::<Utc>::UNIX_EPOCH)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SourceError::Transient("No price data found for pair: BTCUSD".to_string())
        );
    }
}
