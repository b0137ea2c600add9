/// Pure mathematical utilities for portfolio construction.
/// Stateless functions, no I/O.
use chrono::NaiveDate;
use nalgebra::DMatrix;
use std::collections::{BTreeMap, BTreeSet};

/// Trading days per year used to annualise daily statistics.
pub const TRADING_DAYS: f64 = 252.0;

/// Compute daily returns from a value series.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    values
        .windows(2)
        .filter_map(|w| {
            if w[0] != 0.0 {
                Some((w[1] - w[0]) / w[0])
            } else {
                None
            }
        })
        .collect()
}

/// Align dated close series on the dates every series has, then convert each
/// to daily returns. Output is one return vector per input series, all of
/// equal length.
pub fn aligned_returns(series: &[Vec<(NaiveDate, f64)>]) -> Vec<Vec<f64>> {
    if series.is_empty() {
        return Vec::new();
    }

    let maps: Vec<BTreeMap<NaiveDate, f64>> = series
        .iter()
        .map(|s| s.iter().copied().collect())
        .collect();

    let mut common: BTreeSet<NaiveDate> = maps[0].keys().copied().collect();
    for m in &maps[1..] {
        common.retain(|d| m.contains_key(d));
    }

    // Drop dates where any close is non-positive so every return is defined
    let dates: Vec<NaiveDate> = common
        .into_iter()
        .filter(|d| maps.iter().all(|m| m.get(d).map(|c| *c > 0.0).unwrap_or(false)))
        .collect();

    maps.iter()
        .map(|m| {
            let closes: Vec<f64> = dates.iter().filter_map(|d| m.get(d).copied()).collect();
            daily_returns(&closes)
        })
        .collect()
}

/// Sample covariance (n - 1) of equal-length return vectors, annualised.
///
/// Returns `None` when fewer than two observations are available or the
/// vectors differ in length.
pub fn annualized_covariance(returns: &[Vec<f64>]) -> Option<DMatrix<f64>> {
    let k = returns.len();
    if k == 0 {
        return None;
    }
    let n = returns[0].len();
    if n < 2 || returns.iter().any(|r| r.len() != n) {
        return None;
    }

    let means: Vec<f64> = returns.iter().map(|r| r.iter().sum::<f64>() / n as f64).collect();

    let mut cov = DMatrix::<f64>::zeros(k, k);
    for a in 0..k {
        for b in a..k {
            let s: f64 = (0..n)
                .map(|t| (returns[a][t] - means[a]) * (returns[b][t] - means[b]))
                .sum();
            let value = s / (n as f64 - 1.0) * TRADING_DAYS;
            cov[(a, b)] = value;
            cov[(b, a)] = value;
        }
    }
    Some(cov)
}

/// Portfolio expected return `mu . w`.
pub fn portfolio_return(mu: &[f64], weights: &[f64]) -> f64 {
    mu.iter().zip(weights).map(|(m, w)| m * w).sum()
}

/// Portfolio variance `w' S w`.
pub fn portfolio_variance(cov: &DMatrix<f64>, weights: &[f64]) -> f64 {
    let k = weights.len();
    let mut var = 0.0;
    for a in 0..k {
        for b in 0..k {
            var += weights[a] * cov[(a, b)] * weights[b];
        }
    }
    var
}
