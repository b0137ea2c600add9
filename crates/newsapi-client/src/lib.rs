use analysis_core::{AnalysisError, NewsArticle, NewsProvider};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://newsapi.org";
const LANGUAGE: &str = "en";
const PAGE_SIZE: u32 = 100;
const MAX_ATTEMPTS: u32 = 3;

/// Error codes that stay true for the rest of the run.
const ACCESS_DENIED_CODES: &[&str] = &[
    "rateLimited",
    "apiKeyExhausted",
    "apiKeyInvalid",
    "apiKeyDisabled",
    "apiKeyMissing",
];

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for NewsAPI slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Client for the NewsAPI `everything` search endpoint.
#[derive(Clone)]
pub struct NewsApiClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl NewsApiClient {
    pub fn new(api_key: String) -> Self {
        // Developer plan allows bursts well above this; 60/min keeps a full
        // year of day-by-day queries from tripping the 429 path constantly.
        let rate_limit: usize = std::env::var("NEWSAPI_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let timeout_secs: u64 = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self::with_settings(api_key, rate_limit, Duration::from_secs(timeout_secs))
    }

    pub fn with_settings(api_key: String, requests_per_minute: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
        }
    }

    /// Point the client at a different host (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a request with rate limiting and retry on 429, 5xx and transport errors.
    ///
    /// A 429 whose body names an exhausted quota or a rejected key is not
    /// retried; it fails with `AccessDenied` straight away.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;

            match self.client.execute(req_clone).await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let body = response.text().await.unwrap_or_default();
                        if let Err(e @ AnalysisError::AccessDenied(_)) = parse_everything(&body) {
                            return Err(e);
                        }
                    } else if !status.is_server_error() {
                        return Ok(response);
                    }
                    last_error = format!("HTTP {}", status);
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < MAX_ATTEMPTS {
                let wait = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "NewsAPI request failed ({}), retrying in {}s ({}/{})",
                    last_error,
                    wait.as_secs(),
                    attempt,
                    MAX_ATTEMPTS
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(AnalysisError::ApiError(format!(
            "NewsAPI request failed after {} attempts: {}",
            MAX_ATTEMPTS, last_error
        )))
    }

    /// Search English-language articles matching `query` published within `[from, to]`.
    pub async fn get_everything(
        &self,
        query: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        let url = format!("{}/v2/everything", self.base_url);
        let from_s = from.format("%Y-%m-%d").to_string();
        let to_s = to.format("%Y-%m-%d").to_string();
        let page_size = PAGE_SIZE.to_string();

        tracing::debug!("NewsAPI search q={:?} from={} to={}", query, from_s, to_s);

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("q", query),
                ("from", from_s.as_str()),
                ("to", to_s.as_str()),
                ("language", LANGUAGE),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ]))
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        if !status.is_success() {
            // NewsAPI reports failures as a JSON envelope; prefer its message.
            return Err(match parse_everything(&body) {
                Err(e) => e,
                Ok(_) => AnalysisError::ApiError(format!("HTTP {}", status)),
            });
        }

        parse_everything(&body)
    }
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    async fn search(
        &self,
        query: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        self.get_everything(query, from, to).await
    }
}

/// Parse an `everything` response body into articles.
pub fn parse_everything(body: &str) -> Result<Vec<NewsArticle>, AnalysisError> {
    let envelope: EverythingResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

    if envelope.status != "ok" {
        let code = envelope.code.unwrap_or_else(|| "error".to_string());
        let detail = format!("NewsAPI {}: {}", code, envelope.message.unwrap_or_default());
        return Err(if ACCESS_DENIED_CODES.contains(&code.as_str()) {
            AnalysisError::AccessDenied(detail)
        } else {
            AnalysisError::ApiError(detail)
        });
    }

    Ok(envelope
        .articles
        .into_iter()
        .map(|a| NewsArticle {
            title: a.title.unwrap_or_default(),
            author: a.author,
            source: a.source.and_then(|s| s.name),
            published_utc: a
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            article_url: a.url,
            description: a.description,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ArticleResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleResult {
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}
