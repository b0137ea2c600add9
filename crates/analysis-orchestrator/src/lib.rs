use analysis_core::{AnalysisError, NewsProvider, PriceDataProvider, SentimentScorer, TickerMetadata};
use chrono::{Duration, NaiveDate};
use ml_engine::{train_direction_model, TrainingConfig};
use portfolio_manager::{allocate, OptimizerConfig};
use sentiment_analysis::SentimentFetcher;
use technical_analysis::{build_price_records, close_series};

pub mod assembler;
pub mod filter;
pub mod report;

pub use assembler::{assemble_training_set, latest_feature_vector, LatestFeatures};
pub use filter::{expected_return_proxy, Candidate, FilterDecision, FilterThresholds, RejectReason};
pub use report::{PipelineReport, Recommendation, Rejection, SkipReason, TickerSkip};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub keywords: Vec<String>,
    /// Calendar days of history used for training.
    pub training_lookback_days: i64,
    /// Calendar days of history fetched to build today's feature row.
    pub inference_lookback_days: i64,
    pub training: TrainingConfig,
    pub thresholds: FilterThresholds,
    pub optimizer: OptimizerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            training_lookback_days: 365,
            inference_lookback_days: 60,
            training: TrainingConfig::default(),
            thresholds: FilterThresholds::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// A ticker that made it through training and scoring.
struct Scored {
    candidate: Candidate,
    closes: Vec<(NaiveDate, f64)>,
}

/// Runs tickers one at a time through fetch, feature assembly, training and
/// filtering, then allocates once over the surviving candidates.
pub struct AdvisorPipeline<P, N, S> {
    prices: P,
    sentiment: SentimentFetcher<N, S>,
    config: PipelineConfig,
}

impl<P, N, S> AdvisorPipeline<P, N, S>
where
    P: PriceDataProvider,
    N: NewsProvider,
    S: SentimentScorer,
{
    pub fn new(prices: P, news: N, scorer: S, config: PipelineConfig) -> Self {
        Self {
            prices,
            sentiment: SentimentFetcher::new(news, scorer),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, tickers: &[String], today: NaiveDate) -> PipelineReport {
        tracing::info!("Running advisor over {} tickers as of {}", tickers.len(), today);

        let mut accepted: Vec<Scored> = Vec::new();
        let mut rejections = Vec::new();
        let mut skipped = Vec::new();

        for ticker in tickers {
            match self.score_ticker(ticker, today).await {
                Ok(scored) => match self.config.thresholds.evaluate(&scored.candidate) {
                    FilterDecision::Accepted => {
                        tracing::info!(
                            "{}: candidate, up-probability {:.3}, P/E {:.1}",
                            ticker,
                            scored.candidate.probability,
                            scored.candidate.trailing_pe
                        );
                        accepted.push(scored);
                    }
                    FilterDecision::Rejected(reason) => {
                        tracing::info!("{}: filtered out, {}", ticker, reason);
                        rejections.push(Rejection {
                            candidate: scored.candidate,
                            reason,
                        });
                    }
                },
                Err(reason) => {
                    tracing::warn!("{}: skipped, {}", ticker, reason);
                    skipped.push(TickerSkip {
                        ticker: ticker.clone(),
                        reason,
                    });
                }
            }
        }

        let allocation = if accepted.is_empty() {
            None
        } else {
            let names: Vec<String> = accepted.iter().map(|s| s.candidate.ticker.clone()).collect();
            let closes: Vec<Vec<(NaiveDate, f64)>> = accepted.iter().map(|s| s.closes.clone()).collect();
            let mu: Vec<f64> = accepted.iter().map(|s| s.candidate.expected_return).collect();
            Some(allocate(&names, &closes, &mu, &self.config.optimizer))
        };

        let recommendations = accepted
            .into_iter()
            .map(|s| {
                let weight = allocation
                    .as_ref()
                    .map(|a| a.weights().weight(&s.candidate.ticker))
                    .unwrap_or(0.0);
                Recommendation {
                    candidate: s.candidate,
                    weight,
                }
            })
            .collect();

        PipelineReport {
            as_of: today,
            recommendations,
            rejections,
            skipped,
            allocation,
        }
    }

    async fn score_ticker(&self, ticker: &str, today: NaiveDate) -> Result<Scored, SkipReason> {
        let keywords = &self.config.keywords;
        let start = today - Duration::days(self.config.training_lookback_days);

        let bars = self
            .prices
            .daily_bars(ticker, start, today)
            .await
            .map_err(|e| SkipReason::PriceFetchFailed(e.to_string()))?;
        if bars.is_empty() {
            return Err(SkipReason::NoPriceData);
        }

        let metadata = match self.prices.metadata(ticker).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("{}: metadata unavailable ({}), using defaults", ticker, e);
                TickerMetadata::default()
            }
        };

        let records = build_price_records(&bars);
        let labeled = records.iter().filter(|r| r.label.is_some()).count();
        if labeled < self.config.training.min_rows {
            return Err(SkipReason::InsufficientData(format!(
                "{} labeled rows from {} bars, need at least {}",
                labeled,
                bars.len(),
                self.config.training.min_rows
            )));
        }

        let sentiment = self.sentiment.daily_scores(ticker, keywords, start, today).await;
        let samples = assemble_training_set(&records, &sentiment);

        let model = train_direction_model(&samples, &self.config.training).map_err(|e| match e {
            AnalysisError::InsufficientData(msg) => SkipReason::InsufficientData(msg),
            other => SkipReason::TrainingFailed(other.to_string()),
        })?;
        tracing::info!(
            "{}: trained on {} rows, held-out accuracy {:.1}%",
            ticker,
            model.train_rows,
            model.accuracy * 100.0
        );

        let recent_start = today - Duration::days(self.config.inference_lookback_days);
        let recent_bars = self
            .prices
            .daily_bars(ticker, recent_start, today)
            .await
            .map_err(|e| SkipReason::PriceFetchFailed(e.to_string()))?;
        let recent_records = build_price_records(&recent_bars);

        let recent_sentiment = self
            .sentiment
            .score_window(ticker, keywords, today - Duration::days(1), today)
            .await;
        if recent_sentiment.is_fetch_failure() {
            tracing::warn!("{}: recent sentiment fetch failed, using 0.0", ticker);
        }

        let latest = latest_feature_vector(&recent_records, recent_sentiment.value())
            .ok_or(SkipReason::NoRecentFeatures)?;
        let probability = model.predict_up_probability(&latest.features);

        Ok(Scored {
            candidate: Candidate::new(ticker, probability, latest.close, latest.date, &metadata, model.accuracy),
            closes: close_series(&bars),
        })
    }
}
