use analysis_core::{FeatureVector, LabeledSample, SentimentSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use technical_analysis::PriceRecord;

/// Feature vector for the most recent trading day, used for today's decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestFeatures {
    pub date: NaiveDate,
    pub close: f64,
    pub features: FeatureVector,
}

fn feature_vector(record: &PriceRecord, sentiment: f64) -> FeatureVector {
    FeatureVector {
        daily_return: record.daily_return,
        moving_average: record.moving_average,
        rsi: record.rsi,
        volatility: record.volatility,
        sentiment,
    }
}

/// Join price records with daily sentiment on the calendar date.
///
/// Days missing from `sentiment` get 0.0. The unlabeled final row is left out.
pub fn assemble_training_set(records: &[PriceRecord], sentiment: &SentimentSeries) -> Vec<LabeledSample> {
    records
        .iter()
        .filter_map(|record| {
            let label = record.label?;
            let features = feature_vector(record, sentiment.score_on(record.date));
            features.is_finite().then_some(LabeledSample {
                date: record.date,
                features,
                label,
            })
        })
        .collect()
}

/// Last row of a short recent window, paired with one trailing-window
/// sentiment value rather than the per-day series used for training.
pub fn latest_feature_vector(records: &[PriceRecord], sentiment: f64) -> Option<LatestFeatures> {
    let sentiment = if sentiment.is_finite() { sentiment } else { 0.0 };

    records.last().and_then(|record| {
        let features = feature_vector(record, sentiment);
        features.is_finite().then_some(LatestFeatures {
            date: record.date,
            close: record.close,
            features,
        })
    })
}
