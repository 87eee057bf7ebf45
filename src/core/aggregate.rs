//! Pure arithmetic turning price series into investment outcomes

use crate::core::error::LookupError;
use crate::core::model::{QueryResult, normalize_symbol};
use crate::core::price::PriceCandle;
use chrono::Utc;
use rust_decimal::Decimal;

/// Number of periods averaged at either end of a price series.
pub const AVERAGING_PERIODS: usize = 4;

/// Price of the reference item used for the affordability index.
pub const REFERENCE_ITEM_PRICE: Decimal = Decimal::from_parts(200_000, 0, 0, false, 0);

const RESULT_DECIMALS: u32 = 2;

/// Leading periods of a series used for the opening average.
///
/// Falls back to the whole series when it is shorter than [`AVERAGING_PERIODS`].
pub fn opening_window(series: &[PriceCandle]) -> &[PriceCandle] {
    &series[..series.len().min(AVERAGING_PERIODS)]
}

/// Trailing periods of a series used for the closing average.
pub fn closing_window(series: &[PriceCandle]) -> &[PriceCandle] {
    &series[series.len().saturating_sub(AVERAGING_PERIODS)..]
}

/// Arithmetic mean of the close prices, `None` for an empty series.
pub fn average_close(series: &[PriceCandle]) -> Option<Decimal> {
    if series.is_empty() {
        return None;
    }
    let total: Decimal = series.iter().map(|c| c.close).sum();
    total.checked_div(Decimal::from(series.len()))
}

/// Computes what `investment` bought at `start_avg` is worth at `end_avg`.
///
/// Rounding is half-to-even at two decimals; `number_of_units` is left unrounded.
pub fn build_result(
    investment: u64,
    start_avg: Decimal,
    end_avg: Decimal,
    symbol: &str,
) -> Result<QueryResult, LookupError> {
    if investment == 0 {
        return Err(LookupError::InvalidInput(
            "investment must be greater than zero".to_string(),
        ));
    }
    if start_avg.is_zero() {
        return Err(LookupError::InvalidInput(format!(
            "opening average for {symbol} is zero"
        )));
    }

    let overflow = || LookupError::InvalidInput(format!("result for {symbol} overflows"));
    let invested = Decimal::from(investment);

    let number_of_units = invested.checked_div(start_avg).ok_or_else(overflow)?;
    let profit = number_of_units
        .checked_mul(end_avg)
        .and_then(|value| value.checked_sub(invested))
        .ok_or_else(overflow)?
        .round_dp(RESULT_DECIMALS);
    let growth_factor = profit
        .checked_div(invested)
        .ok_or_else(overflow)?
        .round_dp(RESULT_DECIMALS);
    let affordability_index = profit
        .checked_div(REFERENCE_ITEM_PRICE)
        .ok_or_else(overflow)?
        .round_dp(RESULT_DECIMALS);

    Ok(QueryResult {
        number_of_units,
        profit,
        growth_factor,
        affordability_index,
        investment,
        symbol: normalize_symbol(symbol),
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candles(closes: &[i64]) -> Vec<PriceCandle> {
        let start = Utc.timestamp_opt(1_548_111_600, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let close = Decimal::from(*close);
                PriceCandle {
                    timestamp: start + Duration::days(15 * i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    vwap: close,
                    volume: Decimal::ONE,
                    count: 1,
                }
            })
            .collect()
    }

    #[test]
    fn test_build_result_arithmetic() {
        let result = build_result(1000, Decimal::from(10), Decimal::from(15), "btc").unwrap();

        assert_eq!(result.number_of_units, Decimal::from(100));
        assert_eq!(result.profit, Decimal::from(500));
        assert_eq!(result.growth_factor, Decimal::new(5, 1));
        // 500 / 200000 = 0.0025, which rounds half-to-even down to zero
        assert_eq!(result.affordability_index, Decimal::ZERO);
        assert_eq!(result.investment, 1000);
        assert_eq!(result.symbol, "BTC");
    }

    #[test]
    fn test_build_result_with_loss_and_large_profit() {
        let loss = build_result(1000, Decimal::from(20), Decimal::from(5), "ETH").unwrap();
        assert_eq!(loss.number_of_units, Decimal::from(50));
        assert_eq!(loss.profit, Decimal::from(-750));
        assert_eq!(loss.growth_factor, Decimal::new(-75, 2));

        let moon = build_result(10_000, Decimal::ONE, Decimal::from(100), "ETH").unwrap();
        assert_eq!(moon.profit, Decimal::from(990_000));
        assert_eq!(moon.growth_factor, Decimal::from(99));
        assert_eq!(moon.affordability_index, Decimal::new(495, 2));
    }

    #[test]
    fn test_build_result_rounds_profit_to_cents() {
        let result = build_result(100, Decimal::from(3), Decimal::from(4), "XRP").unwrap();
        // 33.333.. units * 4 - 100 = 33.333..
        assert_eq!(result.profit, Decimal::new(3333, 2));
        assert_eq!(result.growth_factor, Decimal::new(33, 2));
    }

    #[test]
    fn test_build_result_rejects_zero_inputs() {
        assert!(matches!(
            build_result(0, Decimal::from(10), Decimal::from(15), "BTC"),
            Err(LookupError::InvalidInput(_))
        ));
        assert!(matches!(
            build_result(1000, Decimal::ZERO, Decimal::from(15), "BTC"),
            Err(LookupError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_average_close() {
        assert_eq!(average_close(&candles(&[10, 20, 30, 40])), Some(Decimal::from(25)));
        assert_eq!(average_close(&candles(&[7])), Some(Decimal::from(7)));
        assert_eq!(average_close(&[]), None);
    }

    #[test]
    fn test_windows_take_four_periods_from_each_end() {
        let series = candles(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let opening: Vec<Decimal> = opening_window(&series).iter().map(|c| c.close).collect();
        assert_eq!(opening, candles(&[1, 2, 3, 4]).iter().map(|c| c.close).collect::<Vec<_>>());

        let closing: Vec<Decimal> = closing_window(&series).iter().map(|c| c.close).collect();
        assert_eq!(closing, candles(&[6, 7, 8, 9]).iter().map(|c| c.close).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_series_uses_all_periods() {
        let series = candles(&[10, 20]);
        assert_eq!(opening_window(&series).len(), 2);
        assert_eq!(closing_window(&series).len(), 2);
        assert_eq!(average_close(closing_window(&series)), Some(Decimal::from(15)));

        assert!(opening_window(&[]).is_empty());
        assert!(closing_window(&[]).is_empty());
    }
}
