use async_trait::async_trait;
use chrono::NaiveDate;
use crate::{AnalysisError, Bar, NewsArticle, TickerMetadata};

/// Source of daily price history and company metadata.
#[async_trait]
pub trait PriceDataProvider: Send + Sync {
    /// Daily bars for `symbol` over the inclusive calendar range `[start, end]`,
    /// oldest first. An unknown symbol or empty range yields an empty vector.
    async fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, AnalysisError>;

    async fn metadata(&self, symbol: &str) -> Result<TickerMetadata, AnalysisError>;
}

/// Full-text news search restricted to a date range.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError>;
}

/// Text to compound polarity in [-1, 1].
pub trait SentimentScorer: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}
