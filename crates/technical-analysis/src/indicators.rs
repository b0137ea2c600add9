//! Rolling-window indicators.
//!
//! `sma` returns only the fully-warmed values. The other functions return a
//! series aligned index-for-index with their input, with `None` wherever the
//! window is not yet warm.

use statrs::statistics::Statistics;

/// Value RSI takes when the window has no losses.
pub const RSI_SATURATED: f64 = 100.0;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Simple Moving Average aligned to `data`.
pub fn rolling_sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let warm = sma(data, period);
    if warm.is_empty() {
        return vec![None; data.len()];
    }

    let mut result = vec![None; period - 1];
    result.extend(warm.into_iter().map(Some));
    result
}

/// Simple percent change from the previous value.
pub fn pct_change(data: &[f64]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(data.len());
    if data.is_empty() {
        return result;
    }

    result.push(None);
    for w in data.windows(2) {
        if w[0] != 0.0 {
            result.push(Some(w[1] / w[0] - 1.0));
        } else {
            result.push(None);
        }
    }
    result
}

/// Relative Strength Index over `period` price changes.
///
/// Average gain and loss are plain means over the window. `RS = gain / loss`
/// and `RSI = 100 - 100 / (1 + RS)`; a window whose mean loss is exactly zero
/// (including a flat window) yields [`RSI_SATURATED`].
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);

    for w in data.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    // gains[j] is the change into data[j + 1]
    for i in period..data.len() {
        let avg_gain = gains[i - period..i].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[i - period..i].iter().sum::<f64>() / period as f64;

        let value = if avg_loss == 0.0 {
            RSI_SATURATED
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        };
        result[i] = Some(value.clamp(0.0, 100.0));
    }

    result
}

/// Sample standard deviation (n - 1) over the last `period` values.
///
/// The window is `None` if any value inside it is `None`.
pub fn rolling_std(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period < 2 || values.len() < period {
        return result;
    }

    for i in period - 1..values.len() {
        let window: Option<Vec<f64>> = values[i + 1 - period..=i].iter().copied().collect();
        if let Some(window) = window {
            let std = window.std_dev();
            if std.is_finite() {
                result[i] = Some(std);
            }
        }
    }

    result
}
