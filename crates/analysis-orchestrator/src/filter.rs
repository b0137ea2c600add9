use analysis_core::TickerMetadata;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Payoff assumed when the price rises.
pub const UP_PAYOFF: f64 = 0.02;
/// Loss assumed when it does not.
pub const DOWN_PAYOFF: f64 = 0.01;

/// `p * 0.02 - (1 - p) * 0.01`: the optimizer's expected return input.
pub fn expected_return_proxy(probability: f64) -> f64 {
    probability * UP_PAYOFF - (1.0 - probability) * DOWN_PAYOFF
}

/// A scored ticker, before or after filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub ticker: String,
    pub probability: f64,
    pub latest_price: f64,
    pub as_of: NaiveDate,
    pub sector: String,
    /// `INFINITY` when the provider has no usable value.
    pub trailing_pe: f64,
    pub expected_return: f64,
    /// Held-out accuracy of the model that produced `probability`.
    pub accuracy: f64,
}

impl Candidate {
    pub fn new(
        ticker: &str,
        probability: f64,
        latest_price: f64,
        as_of: NaiveDate,
        metadata: &TickerMetadata,
        accuracy: f64,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            probability,
            latest_price,
            as_of,
            sector: metadata.sector_or_default().to_string(),
            trailing_pe: metadata.trailing_pe_or_default(),
            expected_return: expected_return_proxy(probability),
            accuracy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    LowProbability { probability: f64, min: f64 },
    Overvalued { trailing_pe: f64, max: f64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::LowProbability { probability, min } => {
                write!(f, "up-probability {:.1}% not above {:.1}%", probability * 100.0, min * 100.0)
            }
            RejectReason::Overvalued { trailing_pe, max } if trailing_pe.is_infinite() => {
                write!(f, "no trailing P/E (limit {:.1})", max)
            }
            RejectReason::Overvalued { trailing_pe, max } => {
                write!(f, "trailing P/E {:.1} not below {:.1}", trailing_pe, max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterDecision {
    Accepted,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterThresholds {
    /// Strict lower bound on the up-probability.
    pub min_probability: f64,
    /// Strict upper bound on trailing P/E.
    pub max_trailing_pe: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            min_probability: 0.70,
            max_trailing_pe: 30.0,
        }
    }
}

impl FilterThresholds {
    pub fn evaluate(&self, candidate: &Candidate) -> FilterDecision {
        // Written so NaN fails both checks
        if !(candidate.probability > self.min_probability) {
            return FilterDecision::Rejected(RejectReason::LowProbability {
                probability: candidate.probability,
                min: self.min_probability,
            });
        }
        if !(candidate.trailing_pe < self.max_trailing_pe) {
            return FilterDecision::Rejected(RejectReason::Overvalued {
                trailing_pe: candidate.trailing_pe,
                max: self.max_trailing_pe,
            });
        }
        FilterDecision::Accepted
    }
}
