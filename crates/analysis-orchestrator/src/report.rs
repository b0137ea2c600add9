use chrono::NaiveDate;
use portfolio_manager::AllocationOutcome;
use serde::{Deserialize, Serialize};

use crate::filter::{Candidate, RejectReason};

/// Why a ticker produced no candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    PriceFetchFailed(String),
    NoPriceData,
    InsufficientData(String),
    TrainingFailed(String),
    NoRecentFeatures,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::PriceFetchFailed(e) => write!(f, "price fetch failed: {}", e),
            SkipReason::NoPriceData => write!(f, "no price data"),
            SkipReason::InsufficientData(msg) => write!(f, "insufficient data: {}", msg),
            SkipReason::TrainingFailed(e) => write!(f, "training failed: {}", e),
            SkipReason::NoRecentFeatures => write!(f, "no recent feature row"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSkip {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub candidate: Candidate,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub candidate: Candidate,
    /// Portfolio weight in `[0, 1]`.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub as_of: NaiveDate,
    pub recommendations: Vec<Recommendation>,
    pub rejections: Vec<Rejection>,
    pub skipped: Vec<TickerSkip>,
    /// `None` when no ticker passed the filter.
    pub allocation: Option<AllocationOutcome>,
}

impl PipelineReport {
    /// The scored candidate for `ticker`, whether recommended or rejected.
    pub fn candidate(&self, ticker: &str) -> Option<&Candidate> {
        self.recommendations
            .iter()
            .map(|r| &r.candidate)
            .chain(self.rejections.iter().map(|r| &r.candidate))
            .find(|c| c.ticker == ticker)
    }

    pub fn skip_reason(&self, ticker: &str) -> Option<&SkipReason> {
        self.skipped.iter().find(|s| s.ticker == ticker).map(|s| &s.reason)
    }
}
