use analysis_core::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::{pct_change, rolling_sma, rolling_std, rsi};

pub const MOVING_AVERAGE_PERIOD: usize = 20;
pub const RSI_PERIOD: usize = 14;
pub const VOLATILITY_PERIOD: usize = 20;

/// One trading day of engineered price features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub daily_return: f64,
    pub moving_average: f64,
    pub rsi: f64,
    pub volatility: f64,
    /// Whether the next close is higher. `None` on the last row of a series.
    pub label: Option<bool>,
}

/// Derive feature rows from daily bars (oldest first).
///
/// Rows whose rolling windows are not yet warm are dropped, so the first
/// record corresponds to the 21st bar.
pub fn build_price_records(bars: &[Bar]) -> Vec<PriceRecord> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let returns = pct_change(&closes);
    let moving_average = rolling_sma(&closes, MOVING_AVERAGE_PERIOD);
    let rsi_values = rsi(&closes, RSI_PERIOD);
    let volatility = rolling_std(&returns, VOLATILITY_PERIOD);

    let mut records = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        let (Some(r), Some(ma), Some(rs), Some(vol)) =
            (returns[i], moving_average[i], rsi_values[i], volatility[i])
        else {
            continue;
        };

        let label = closes.get(i + 1).map(|next| *next > closes[i]);

        records.push(PriceRecord {
            date: bar.trading_day(),
            close: bar.close,
            daily_return: r,
            moving_average: ma,
            rsi: rs,
            volatility: vol,
            label,
        });
    }

    records
}

/// Dated closes, used for return covariance downstream.
pub fn close_series(bars: &[Bar]) -> Vec<(NaiveDate, f64)> {
    bars.iter().map(|b| (b.trading_day(), b.close)).collect()
}
