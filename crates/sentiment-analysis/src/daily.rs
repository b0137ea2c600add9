//! Day-by-day news sentiment.
//!
//! Each calendar day is fetched and scored independently; a failed fetch only
//! zeroes that day's score. Once the provider denies access, the remaining
//! days are zeroed without further requests.

use analysis_core::{AnalysisError, NewsArticle, NewsProvider, SentimentScorer, SentimentSeries};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Why a sentiment value fell back to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZeroReason {
    NoArticles,
    FetchFailed(String),
}

/// Outcome of scoring one query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DaySentiment {
    Scored { mean: f64, articles: usize },
    DefaultedZero(ZeroReason),
}

impl DaySentiment {
    pub fn value(&self) -> f64 {
        match self {
            DaySentiment::Scored { mean, .. } => *mean,
            DaySentiment::DefaultedZero(_) => 0.0,
        }
    }

    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, DaySentiment::DefaultedZero(ZeroReason::FetchFailed(_)))
    }
}

/// Search query matching the ticker or any of the keywords.
pub fn build_query(ticker: &str, keywords: &[String]) -> String {
    std::iter::once(ticker.trim())
        .chain(keywords.iter().map(|k| k.trim()))
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub struct SentimentFetcher<N, S> {
    news: N,
    scorer: S,
}

impl<N: NewsProvider, S: SentimentScorer> SentimentFetcher<N, S> {
    pub fn new(news: N, scorer: S) -> Self {
        Self { news, scorer }
    }

    /// Mean polarity of the articles' descriptions.
    pub fn score_articles(&self, articles: &[NewsArticle]) -> DaySentiment {
        if articles.is_empty() {
            return DaySentiment::DefaultedZero(ZeroReason::NoArticles);
        }

        let total: f64 = articles
            .iter()
            .map(|a| self.scorer.polarity(a.scoring_text()))
            .sum();

        DaySentiment::Scored {
            mean: total / articles.len() as f64,
            articles: articles.len(),
        }
    }

    async fn fetch_window(
        &self,
        ticker: &str,
        keywords: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DaySentiment, AnalysisError> {
        let query = build_query(ticker, keywords);
        let articles = self.news.search(&query, from, to).await?;
        Ok(self.score_articles(&articles))
    }

    /// One search over `[from, to]`, scored as a single window. Never fails.
    pub async fn score_window(
        &self,
        ticker: &str,
        keywords: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> DaySentiment {
        match self.fetch_window(ticker, keywords, from, to).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("News fetch for {} {}..={} failed: {}", ticker, from, to, e);
                DaySentiment::DefaultedZero(ZeroReason::FetchFailed(e.to_string()))
            }
        }
    }

    /// Per-day sentiment for every calendar day in `[start, end]`.
    pub async fn daily_scores(
        &self,
        ticker: &str,
        keywords: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> SentimentSeries {
        let mut series = SentimentSeries::new();
        let mut failed = 0usize;
        let mut with_articles = 0usize;
        let mut last_error: Option<String> = None;
        let mut denied: Option<String> = None;

        let mut day = start;
        while day <= end {
            let outcome = match &denied {
                Some(reason) => DaySentiment::DefaultedZero(ZeroReason::FetchFailed(reason.clone())),
                None => match self.fetch_window(ticker, keywords, day, day).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        if matches!(e, AnalysisError::AccessDenied(_)) {
                            tracing::warn!(
                                "{}: news provider denied access on {} ({}); zeroing sentiment through {}",
                                ticker,
                                day,
                                e,
                                end
                            );
                            denied = Some(e.to_string());
                        } else {
                            tracing::debug!("News fetch for {} on {} failed: {}", ticker, day, e);
                        }
                        DaySentiment::DefaultedZero(ZeroReason::FetchFailed(e.to_string()))
                    }
                },
            };

            match &outcome {
                DaySentiment::Scored { .. } => with_articles += 1,
                DaySentiment::DefaultedZero(ZeroReason::FetchFailed(e)) => {
                    failed += 1;
                    last_error = Some(e.clone());
                }
                DaySentiment::DefaultedZero(ZeroReason::NoArticles) => {}
            }
            series.insert(day, outcome.value());
            day += Duration::days(1);
        }

        if failed > 0 {
            tracing::warn!(
                "{}: {} of {} sentiment days defaulted to zero after fetch errors (last: {})",
                ticker,
                failed,
                series.len(),
                last_error.unwrap_or_default()
            );
        }
        tracing::info!(
            "{}: sentiment for {} days, {} with articles",
            ticker,
            series.len(),
            with_articles
        );

        series
    }
}
