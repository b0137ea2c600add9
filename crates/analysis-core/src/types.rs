use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sector reported when the provider has none for a ticker.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

impl Bar {
    /// Calendar day the bar belongs to. Daily US bars are stamped at the
    /// session open, which falls on the same UTC date.
    pub fn trading_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// News article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub published_utc: Option<DateTime<Utc>>,
    pub article_url: Option<String>,
    pub description: Option<String>,
}

impl NewsArticle {
    /// Text fed to the sentiment scorer: the description, or an empty string.
    pub fn scoring_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Company metadata as reported by the price provider.
///
/// Every field is optional; use the `*_or_default` accessors to get the
/// documented fallbacks (`"Unknown"` sector, infinite trailing P/E).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerMetadata {
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub trailing_pe: Option<f64>,
    pub market_cap: Option<f64>,
}

impl TickerMetadata {
    pub fn sector_or_default(&self) -> &str {
        match self.sector.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => UNKNOWN_SECTOR,
        }
    }

    /// Trailing P/E, or `f64::INFINITY` when missing or not a finite number.
    pub fn trailing_pe_or_default(&self) -> f64 {
        match self.trailing_pe {
            Some(pe) if pe.is_finite() => pe,
            _ => f64::INFINITY,
        }
    }
}

/// The five independent variables consumed by the direction classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub daily_return: f64,
    pub moving_average: f64,
    pub rsi: f64,
    pub volatility: f64,
    pub sentiment: f64,
}

impl FeatureVector {
    pub const LEN: usize = 5;
    pub const NAMES: [&'static str; Self::LEN] =
        ["daily_return", "moving_average", "rsi", "volatility", "sentiment"];

    pub fn as_array(&self) -> [f64; Self::LEN] {
        [
            self.daily_return,
            self.moving_average,
            self.rsi,
            self.volatility,
            self.sentiment,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}

/// One training row: features for a day plus whether the next close was higher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub label: bool,
}

/// Mean compound sentiment per calendar day. Lookups never fail: a day
/// without an entry scores 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSeries {
    scores: BTreeMap<NaiveDate, f64>,
}

impl SentimentSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, day: NaiveDate, score: f64) {
        self.scores.insert(day, score);
    }

    pub fn score_on(&self, day: NaiveDate) -> f64 {
        self.scores.get(&day).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.scores.contains_key(&day)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.scores.iter().map(|(d, s)| (*d, *s))
    }
}

impl FromIterator<(NaiveDate, f64)> for SentimentSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_sentiment_series_defaults_to_zero_on_miss() {
        let series: SentimentSeries = [(day(1), 0.4), (day(2), -0.2)].into_iter().collect();
        assert_eq!(series.score_on(day(1)), 0.4);
        assert_eq!(series.score_on(day(2)), -0.2);
        assert_eq!(series.score_on(day(3)), 0.0);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_metadata_defaults() {
        let meta = TickerMetadata::default();
        assert_eq!(meta.sector_or_default(), "Unknown");
        assert!(meta.trailing_pe_or_default().is_infinite());

        let meta = TickerMetadata {
            sector: Some("Technology".to_string()),
            trailing_pe: Some(f64::NAN),
            ..Default::default()
        };
        assert_eq!(meta.sector_or_default(), "Technology");
        assert!(meta.trailing_pe_or_default().is_infinite());
    }

    #[test]
    fn test_feature_vector_order() {
        let fv = FeatureVector {
            daily_return: 0.01,
            moving_average: 100.0,
            rsi: 55.0,
            volatility: 0.02,
            sentiment: -0.1,
        };
        assert_eq!(fv.as_array(), [0.01, 100.0, 55.0, 0.02, -0.1]);
        assert!(fv.is_finite());
    }

    #[test]
    fn test_article_scoring_text_empty_when_missing() {
        let article = NewsArticle {
            title: "t".to_string(),
            author: None,
            source: None,
            published_utc: None,
            article_url: None,
            description: None,
        };
        assert_eq!(article.scoring_text(), "");
    }
}
