//! Long-only max-Sharpe allocation under a per-asset weight cap.
//!
//! Maximises `(mu . w - rf) / sqrt(w' S w)` over `{sum(w) = 1, 0 <= w <= cap}`
//! by projected gradient ascent with Armijo backtracking.

use chrono::NaiveDate;
use nalgebra::{DMatrix, SymmetricEigen};

use crate::models::{AllocationOutcome, OptimizerError, PortfolioWeights};
use crate::shared_math::{aligned_returns, annualized_covariance, portfolio_return, portfolio_variance};

const ARMIJO_C: f64 = 1e-4;
const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 1e4;
const SINGULAR_RATIO: f64 = 1e-10;
const BISECTION_ROUNDS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub max_weight: f64,
    pub risk_free_rate: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Weights below this are zeroed during clean-up.
    pub cleanup_cutoff: f64,
    pub decimals: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_weight: 0.3,
            risk_free_rate: 0.0,
            max_iterations: 10_000,
            tolerance: 1e-10,
            cleanup_cutoff: 1e-4,
            decimals: 3,
        }
    }
}

/// Euclidean projection of `v` onto `{sum(w) = 1, 0 <= w <= cap}`.
///
/// Finds the shift `tau` with `sum(clamp(v - tau, 0, cap)) = 1` by bisection.
/// Caller guarantees `v.len() * cap >= 1`.
pub fn project_capped_simplex(v: &[f64], cap: f64) -> Vec<f64> {
    let mass = |tau: f64| -> f64 { v.iter().map(|x| (x - tau).clamp(0.0, cap)).sum() };

    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = v.iter().copied().fold(f64::INFINITY, f64::min);

    // mass(lo) = n * cap >= 1, mass(hi) = 0
    let mut lo = min - cap;
    let mut hi = max;
    for _ in 0..BISECTION_ROUNDS {
        let mid = lo + (hi - lo) / 2.0;
        if mass(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= f64::EPSILON * (1.0 + hi.abs()) {
            break;
        }
    }

    let tau = lo + (hi - lo) / 2.0;
    v.iter().map(|x| (x - tau).clamp(0.0, cap)).collect()
}

fn sharpe(mu: &[f64], cov: &DMatrix<f64>, w: &[f64], rf: f64) -> f64 {
    (portfolio_return(mu, w) - rf) / portfolio_variance(cov, w).sqrt()
}

fn sharpe_gradient(mu: &[f64], cov: &DMatrix<f64>, w: &[f64], rf: f64) -> Vec<f64> {
    let excess = portfolio_return(mu, w) - rf;
    let var = portfolio_variance(cov, w);
    let sigma = var.sqrt();
    let n = w.len();

    (0..n)
        .map(|i| {
            let cov_w: f64 = (0..n).map(|j| cov[(i, j)] * w[j]).sum();
            mu[i] / sigma - excess * cov_w / (var * sigma)
        })
        .collect()
}

fn is_singular(cov: &DMatrix<f64>) -> bool {
    let eigen = SymmetricEigen::new(cov.clone());
    let largest = eigen.eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let smallest = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);

    !largest.is_finite() || largest <= 0.0 || smallest <= SINGULAR_RATIO * largest
}

/// Raw max-Sharpe weights, in input order and before clean-up.
pub fn max_sharpe(
    mu: &[f64],
    cov: &DMatrix<f64>,
    config: &OptimizerConfig,
) -> Result<Vec<f64>, OptimizerError> {
    let n = mu.len();
    if n == 0 {
        return Err(OptimizerError::Empty);
    }
    if cov.nrows() != n || cov.ncols() != n {
        return Err(OptimizerError::DimensionMismatch {
            tickers: n,
            series: cov.nrows(),
            returns: n,
        });
    }
    if (n as f64) * config.max_weight < 1.0 {
        return Err(OptimizerError::Infeasible {
            n,
            max_weight: config.max_weight,
        });
    }
    if is_singular(cov) {
        return Err(OptimizerError::SingularCovariance);
    }
    let rf = config.risk_free_rate;
    if !mu.iter().any(|m| *m > rf) {
        return Err(OptimizerError::NoPositiveExcessReturn);
    }

    let mut w = project_capped_simplex(&vec![1.0 / n as f64; n], config.max_weight);
    let mut value = sharpe(mu, cov, &w, rf);
    let mut step = 1.0;

    for iteration in 0..config.max_iterations {
        let grad = sharpe_gradient(mu, cov, &w, rf);

        // Backtrack until the projected step gives sufficient increase
        let mut accepted: Option<(Vec<f64>, f64)> = None;
        while step >= MIN_STEP {
            let trial: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi + step * gi).collect();
            let candidate = project_capped_simplex(&trial, config.max_weight);
            let ascent: f64 = grad
                .iter()
                .zip(candidate.iter().zip(&w))
                .map(|(g, (c, wi))| g * (c - wi))
                .sum();
            let candidate_value = sharpe(mu, cov, &candidate, rf);

            if candidate_value >= value + ARMIJO_C * ascent {
                accepted = Some((candidate, candidate_value));
                break;
            }
            step /= 2.0;
        }

        let Some((next, next_value)) = accepted else {
            tracing::debug!("Max-Sharpe stalled at iteration {}, step below {}", iteration, MIN_STEP);
            return Ok(w);
        };

        let change = next
            .iter()
            .zip(&w)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        let gain = next_value - value;

        w = next;
        value = next_value;

        if change < config.tolerance || gain.abs() <= 1e-15 * value.abs().max(1.0) {
            tracing::debug!(
                "Max-Sharpe converged after {} iterations, sharpe {:.4}",
                iteration + 1,
                value
            );
            return Ok(w);
        }

        step = (step * 2.0).min(MAX_STEP);
    }

    Err(OptimizerError::NonConvergence(config.max_iterations))
}

/// Zero tiny weights, round, and keep only positive allocations.
pub fn clean_weights(tickers: &[String], raw: &[f64], config: &OptimizerConfig) -> PortfolioWeights {
    let scale = 10f64.powi(config.decimals as i32);

    let allocations = tickers
        .iter()
        .zip(raw)
        .filter_map(|(ticker, &w)| {
            let w = if w < config.cleanup_cutoff { 0.0 } else { w };
            let rounded = (w * scale).round() / scale;
            (rounded > 0.0).then(|| (ticker.clone(), rounded))
        })
        .collect();

    PortfolioWeights::new(allocations)
}

/// Exactly `1/n` for every ticker.
pub fn equal_weights(tickers: &[String]) -> PortfolioWeights {
    if tickers.is_empty() {
        return PortfolioWeights::default();
    }
    let w = 1.0 / tickers.len() as f64;
    PortfolioWeights::new(tickers.iter().map(|t| (t.clone(), w)).collect())
}

fn optimize(
    tickers: &[String],
    closes: &[Vec<(NaiveDate, f64)>],
    expected_returns: &[f64],
    config: &OptimizerConfig,
) -> Result<PortfolioWeights, OptimizerError> {
    let n = tickers.len();
    if n == 0 {
        return Err(OptimizerError::Empty);
    }
    if closes.len() != n || expected_returns.len() != n {
        return Err(OptimizerError::DimensionMismatch {
            tickers: n,
            series: closes.len(),
            returns: expected_returns.len(),
        });
    }
    if (n as f64) * config.max_weight < 1.0 {
        return Err(OptimizerError::Infeasible {
            n,
            max_weight: config.max_weight,
        });
    }

    let returns = aligned_returns(closes);
    let observations = returns.first().map(|r| r.len()).unwrap_or(0);
    let cov = annualized_covariance(&returns).ok_or(OptimizerError::InsufficientHistory(observations))?;

    let raw = max_sharpe(expected_returns, &cov, config)?;
    Ok(clean_weights(tickers, &raw, config))
}

/// Allocate over `tickers`. Any optimizer failure falls back to equal weights.
pub fn allocate(
    tickers: &[String],
    closes: &[Vec<(NaiveDate, f64)>],
    expected_returns: &[f64],
    config: &OptimizerConfig,
) -> AllocationOutcome {
    match optimize(tickers, closes, expected_returns, config) {
        Ok(weights) => {
            tracing::info!("Optimized allocation over {} candidates", weights.len());
            AllocationOutcome::Optimized(weights)
        }
        Err(reason) => {
            tracing::warn!(
                "Portfolio optimization failed ({}), using equal weights over {} candidates",
                reason,
                tickers.len()
            );
            AllocationOutcome::FallbackEqual {
                weights: equal_weights(tickers),
                reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{}", i)).collect()
    }

    fn dated(closes: Vec<f64>) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .into_iter()
            .enumerate()
            .map(|(i, c)| (start + chrono::Duration::days(i as i64), c))
            .collect()
    }

    /// Price path whose returns follow a distinct sinusoid per asset.
    fn wavy(freq: f64, phase: f64, drift: f64) -> Vec<(NaiveDate, f64)> {
        let mut price = 100.0;
        let mut closes = vec![price];
        for t in 0..120 {
            price *= 1.0 + drift + 0.01 * (freq * t as f64 + phase).sin();
            closes.push(price);
        }
        dated(closes)
    }

    #[test]
    fn test_projection_respects_bounds_and_sum() {
        for v in [
            vec![0.9, 0.1, 0.0, -0.2, 0.5],
            vec![5.0, 5.0, 5.0, 5.0],
            vec![-3.0, 10.0, 0.2, 0.1],
        ] {
            let w = project_capped_simplex(&v, 0.3);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{:?}", w);
            assert!(w.iter().all(|x| *x >= 0.0 && *x <= 0.3 + 1e-12), "{:?}", w);
        }
    }

    #[test]
    fn test_projection_keeps_feasible_point() {
        let v = vec![0.3, 0.3, 0.2, 0.2];
        let w = project_capped_simplex(&v, 0.3);
        for (a, b) in v.iter().zip(&w) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_symmetric_inputs_give_equal_weights() {
        let cov = DMatrix::from_diagonal_element(4, 4, 0.04);
        let w = max_sharpe(&[0.01; 4], &cov, &OptimizerConfig::default()).unwrap();
        for x in w {
            assert!((x - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cap_binds_on_best_asset() {
        let cov = DMatrix::from_diagonal_element(4, 4, 0.04);
        let mu = [0.01, 0.008, 0.006, 0.004];
        let w = max_sharpe(&mu, &cov, &OptimizerConfig::default()).unwrap();

        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(w.iter().all(|x| *x >= -1e-12 && *x <= 0.3 + 1e-9), "{:?}", w);
        assert!((w[0] - 0.3).abs() < 1e-3, "{:?}", w);
        assert!(w[0] >= w[1] - 1e-9 && w[1] >= w[2] - 1e-9 && w[2] >= w[3] - 1e-9, "{:?}", w);
    }

    #[test]
    fn test_error_cases() {
        let cfg = OptimizerConfig::default();
        let cov = DMatrix::from_diagonal_element(4, 4, 0.04);

        assert_eq!(max_sharpe(&[], &DMatrix::zeros(0, 0), &cfg), Err(OptimizerError::Empty));
        assert!(matches!(
            max_sharpe(&[0.01; 3], &cov, &cfg),
            Err(OptimizerError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            max_sharpe(&[0.01; 2], &DMatrix::from_diagonal_element(2, 2, 0.04), &cfg),
            Err(OptimizerError::Infeasible { n: 2, .. })
        ));
        assert_eq!(
            max_sharpe(&[0.01; 4], &DMatrix::from_element(4, 4, 0.04), &cfg),
            Err(OptimizerError::SingularCovariance)
        );
        assert_eq!(
            max_sharpe(&[-0.01; 4], &cov, &cfg),
            Err(OptimizerError::NoPositiveExcessReturn)
        );
    }

    #[test]
    fn test_clean_weights() {
        let cfg = OptimizerConfig::default();
        let w = clean_weights(&names(4), &[0.30000001, 0.00005, 0.4123, 0.2876], &cfg);
        assert_eq!(
            w.allocations,
            vec![
                ("T0".to_string(), 0.3),
                ("T2".to_string(), 0.412),
                ("T3".to_string(), 0.288)
            ]
        );
    }

    #[test]
    fn test_allocate_optimized_within_bounds() {
        let tickers = names(4);
        let closes = vec![
            wavy(0.3, 0.0, 0.002),
            wavy(0.7, 1.0, 0.001),
            wavy(1.1, 2.0, 0.0015),
            wavy(1.9, 3.0, 0.0005),
        ];
        let mu = [0.012, 0.009, 0.011, 0.005];

        let outcome = allocate(&tickers, &closes, &mu, &OptimizerConfig::default());

        assert!(matches!(outcome, AllocationOutcome::Optimized(_)), "{:?}", outcome);
        let weights = outcome.weights();
        assert!((weights.total() - 1.0).abs() <= 0.002, "{:?}", weights);
        assert!(weights.iter().all(|(_, w)| w > 0.0 && w <= 0.3 + 1e-9), "{:?}", weights);
    }

    #[test]
    fn test_identical_series_fall_back_to_exact_equal_weights() {
        let tickers = names(5);
        let series = wavy(0.5, 0.0, 0.001);
        let closes = vec![series; 5];

        let outcome = allocate(&tickers, &closes, &[0.01, 0.012, 0.009, 0.011, 0.01], &OptimizerConfig::default());

        assert_eq!(outcome.fallback_reason(), Some(&OptimizerError::SingularCovariance));
        for (_, w) in outcome.weights().iter() {
            assert_eq!(w, 1.0 / 5.0);
        }
    }

    #[test]
    fn test_few_candidates_fall_back() {
        let tickers = names(2);
        let closes = vec![wavy(0.3, 0.0, 0.001), wavy(0.9, 1.0, 0.001)];

        let outcome = allocate(&tickers, &closes, &[0.01, 0.012], &OptimizerConfig::default());

        assert!(matches!(
            outcome.fallback_reason(),
            Some(OptimizerError::Infeasible { n: 2, .. })
        ));
        assert_eq!(outcome.weights().weight("T0"), 0.5);
        assert_eq!(outcome.weights().weight("T1"), 0.5);
    }

    #[test]
    fn test_short_history_falls_back() {
        let tickers = names(4);
        let closes = vec![dated(vec![100.0, 101.0]); 4];

        let outcome = allocate(&tickers, &closes, &[0.01; 4], &OptimizerConfig::default());

        assert_eq!(outcome.fallback_reason(), Some(&OptimizerError::InsufficientHistory(1)));
        assert_eq!(outcome.weights().len(), 4);
    }
}
