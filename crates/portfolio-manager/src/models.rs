use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered `(ticker, weight)` allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioWeights {
    pub allocations: Vec<(String, f64)>,
}

impl PortfolioWeights {
    pub fn new(allocations: Vec<(String, f64)>) -> Self {
        Self { allocations }
    }

    /// Weight of `ticker`, 0.0 when it is not allocated.
    pub fn weight(&self, ticker: &str) -> f64 {
        self.allocations
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.allocations.iter().map(|(_, w)| w).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.allocations.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum OptimizerError {
    #[error("no candidates to allocate")]
    Empty,

    #[error("dimension mismatch: {tickers} tickers, {series} price series, {returns} expected returns")]
    DimensionMismatch {
        tickers: usize,
        series: usize,
        returns: usize,
    },

    #[error("insufficient aligned history: {0} common returns")]
    InsufficientHistory(usize),

    #[error("infeasible bounds: {n} assets cannot sum to 1 with max weight {max_weight}")]
    Infeasible { n: usize, max_weight: f64 },

    #[error("covariance matrix is singular")]
    SingularCovariance,

    #[error("no asset has an expected return above the risk-free rate")]
    NoPositiveExcessReturn,

    #[error("optimizer did not converge within {0} iterations")]
    NonConvergence(usize),
}

/// Result of an allocation. Optimizer failures never propagate; they
/// degrade to equal weights and keep the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AllocationOutcome {
    Optimized(PortfolioWeights),
    FallbackEqual {
        weights: PortfolioWeights,
        reason: OptimizerError,
    },
}

impl AllocationOutcome {
    pub fn weights(&self) -> &PortfolioWeights {
        match self {
            AllocationOutcome::Optimized(w) => w,
            AllocationOutcome::FallbackEqual { weights, .. } => weights,
        }
    }

    pub fn fallback_reason(&self) -> Option<&OptimizerError> {
        match self {
            AllocationOutcome::Optimized(_) => None,
            AllocationOutcome::FallbackEqual { reason, .. } => Some(reason),
        }
    }
}
