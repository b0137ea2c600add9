use analysis_core::{AnalysisError, Bar, PriceDataProvider, TickerMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
const MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct YahooFinanceClient {
    client: reqwest::Client,
    /// quoteSummary needs a crumb bound to the session cookie.
    crumb: Arc<Mutex<Option<String>>>,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        let timeout_secs: u64 = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            crumb: Arc::new(Mutex::new(None)),
        }
    }

    /// Cached crumb, fetched on first use or when `refresh` is set.
    async fn crumb(&self, refresh: bool) -> Result<String, AnalysisError> {
        let mut cached = self.crumb.lock().await;
        if !refresh {
            if let Some(crumb) = cached.as_ref() {
                return Ok(crumb.clone());
            }
        }

        // fc.yahoo.com answers 404 but sets the session cookie the crumb is tied to
        if let Err(e) = self.client.get(COOKIE_URL).send().await {
            tracing::debug!("Yahoo cookie request failed: {}", e);
        }

        let response = self
            .client
            .get(CRUMB_URL)
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(format!("Yahoo crumb request failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let crumb = parse_crumb(&body).ok_or_else(|| {
            AnalysisError::ApiError(format!("Yahoo crumb unavailable (HTTP {})", status))
        })?;
        tracing::debug!("Yahoo crumb refreshed");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    /// GET `url`, retrying 429/5xx and transport errors. Returns status and body.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<(StatusCode, Value), AnalysisError> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        let json: Value = response
                            .json()
                            .await
                            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;
                        return Ok((status, json));
                    }
                    last_error = format!("HTTP {}", status);
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < MAX_ATTEMPTS {
                let wait = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "Yahoo request failed ({}), retrying in {}s ({}/{})",
                    last_error,
                    wait.as_secs(),
                    attempt,
                    MAX_ATTEMPTS
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(AnalysisError::ApiError(format!(
            "Yahoo request failed after {} attempts: {}",
            MAX_ATTEMPTS, last_error
        )))
    }

    /// Get daily bars over the inclusive calendar range `[start, end]`.
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, AnalysisError> {
        if end < start {
            return Ok(Vec::new());
        }

        let url = format!("{}/{}", CHART_URL, symbol);
        let period1 = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp()).unwrap_or(0);
        // period2 is exclusive on Yahoo's side
        let period2 = (end + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(period1);

        tracing::debug!("Yahoo chart {} {}..={}", symbol, start, end);

        let (status, json) = self
            .get_json(
                &url,
                &[
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                    ("interval", "1d".to_string()),
                    ("events", "history".to_string()),
                ],
            )
            .await?;

        if status == StatusCode::NOT_FOUND {
            tracing::info!("Yahoo has no chart data for {}", symbol);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(AnalysisError::ApiError(format!("Yahoo chart HTTP {}: {}", status, chart_error(&json))));
        }

        parse_chart(&json)
    }

    /// Get sector, industry and valuation fields for a symbol.
    pub async fn get_metadata(&self, symbol: &str) -> Result<TickerMetadata, AnalysisError> {
        let url = format!("{}/{}", SUMMARY_URL, symbol);
        let query = |crumb: String| {
            [
                ("modules", "assetProfile,summaryDetail,price".to_string()),
                ("crumb", crumb),
            ]
        };

        let crumb = self.crumb(false).await?;
        let (mut status, mut json) = self.get_json(&url, &query(crumb)).await?;

        // Crumbs expire with the cookie; refresh once
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("Yahoo rejected crumb for {}, refreshing", symbol);
            let crumb = self.crumb(true).await?;
            (status, json) = self.get_json(&url, &query(crumb)).await?;
        }

        if !status.is_success() {
            let detail = summary_error(&json).unwrap_or_else(|| "unknown error".to_string());
            return Err(AnalysisError::ApiError(format!("Yahoo quoteSummary HTTP {}: {}", status, detail)));
        }

        parse_quote_summary(&json)
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceDataProvider for YahooFinanceClient {
    async fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, AnalysisError> {
        self.get_daily_bars(symbol, start, end).await
    }

    async fn metadata(&self, symbol: &str) -> Result<TickerMetadata, AnalysisError> {
        self.get_metadata(symbol).await
    }
}

fn chart_error(json: &Value) -> String {
    json.get("chart")
        .and_then(|v| v.get("error"))
        .and_then(|v| v.get("description"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string()
}

/// Error envelope of a quoteSummary response, as `code: description`.
///
/// Yahoo uses `{"finance": {"error": ...}}` for auth failures and
/// `{"quoteSummary": {"error": ...}}` for unknown symbols.
fn summary_error(json: &Value) -> Option<String> {
    let error = [json.get("finance"), json.get("quoteSummary")]
        .into_iter()
        .flatten()
        .filter_map(|v| v.get("error"))
        .find(|e| !e.is_null())?;

    let field = |name: &str| error.get(name).and_then(|v| v.as_str()).unwrap_or("");
    Some(format!("{}: {}", field("code"), field("description")))
}

/// A crumb is a short opaque token; anything else (HTML, JSON, an error
/// sentence) means the cookie was not accepted.
pub fn parse_crumb(body: &str) -> Option<String> {
    let crumb = body.trim();
    let plausible = !crumb.is_empty()
        && crumb.len() <= 64
        && !crumb.starts_with('<')
        && !crumb.starts_with('{')
        && !crumb.chars().any(char::is_whitespace);
    plausible.then(|| crumb.to_string())
}

fn quote_series<'a>(quotes: &'a Value, name: &str) -> Result<&'a Vec<Value>, AnalysisError> {
    quotes
        .get(name)
        .and_then(|v| v.as_array())
        .ok_or_else(|| AnalysisError::InvalidData(format!("No {} series", name)))
}

/// Parse a chart response into bars, oldest first.
///
/// Rows where any OHLC value is null are skipped. When an adjusted close
/// series is present it replaces the raw close.
pub fn parse_chart(json: &Value) -> Result<Vec<Bar>, AnalysisError> {
    let chart = json
        .get("chart")
        .ok_or_else(|| AnalysisError::InvalidData("missing chart object".to_string()))?;

    let result = match chart
        .get("result")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
    {
        Some(r) => r,
        None => {
            // Unknown symbol: result is null and error carries a description
            if chart.get("error").map(|e| !e.is_null()).unwrap_or(false) {
                tracing::info!("Yahoo chart error: {}", chart_error(json));
            }
            return Ok(Vec::new());
        }
    };

    // A range without sessions has no timestamp array at all
    let timestamps = match result.get("timestamp").and_then(|v| v.as_array()) {
        Some(ts) => ts,
        None => return Ok(Vec::new()),
    };

    let quotes = result
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::InvalidData("No quote data found".to_string()))?;

    let opens = quote_series(quotes, "open")?;
    let highs = quote_series(quotes, "high")?;
    let lows = quote_series(quotes, "low")?;
    let closes = quote_series(quotes, "close")?;
    let volumes = quote_series(quotes, "volume")?;

    let adj_closes = result
        .get("indicators")
        .and_then(|v| v.get("adjclose"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("adjclose"))
        .and_then(|v| v.as_array());

    let mut bars = Vec::with_capacity(timestamps.len());

    for (i, ts) in timestamps.iter().enumerate() {
        let at = |s: &Vec<Value>| s.get(i).and_then(|v| v.as_f64());

        if let (Some(ts), Some(o), Some(h), Some(l), Some(c)) = (
            ts.as_i64(),
            at(opens),
            at(highs),
            at(lows),
            at(closes),
        ) {
            let timestamp = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| AnalysisError::InvalidData(format!("Invalid timestamp {}", ts)))?;
            let close = adj_closes.and_then(|adj| at(adj)).unwrap_or(c);

            bars.push(Bar {
                timestamp,
                open: o,
                high: h,
                low: l,
                close,
                volume: at(volumes).unwrap_or(0.0),
                vwap: None,
            });
        }
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Parse a quoteSummary response. Fields Yahoo omits stay `None`.
pub fn parse_quote_summary(json: &Value) -> Result<TickerMetadata, AnalysisError> {
    if let Some(error) = summary_error(json) {
        return Err(AnalysisError::ApiError(format!("Yahoo quoteSummary {}", error)));
    }

    let data = json
        .get("quoteSummary")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::InvalidData("No quoteSummary result".to_string()))?;

    // Numeric fields come wrapped as {"raw": 28.5, "fmt": "28.50"}
    let raw = |module: &str, field: &str| -> Option<f64> {
        let v = data.get(module)?.get(field)?;
        v.get("raw").and_then(|r| r.as_f64()).or_else(|| v.as_f64())
    };
    let text = |module: &str, field: &str| -> Option<String> {
        data.get(module)?
            .get(field)?
            .as_str()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    };

    Ok(TickerMetadata {
        long_name: text("price", "longName").or_else(|| text("price", "shortName")),
        sector: text("assetProfile", "sector"),
        industry: text("assetProfile", "industry"),
        trailing_pe: raw("summaryDetail", "trailingPE"),
        market_cap: raw("summaryDetail", "marketCap").or_else(|| raw("price", "marketCap")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chart_skips_null_rows() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL"},
                    "timestamp": [1709303400, 1709562600, 1709649000],
                    "indicators": {
                        "quote": [{
                            "open": [179.5, null, 176.1],
                            "high": [180.5, null, 176.9],
                            "low": [177.4, null, 173.8],
                            "close": [179.7, null, 175.1],
                            "volume": [73488000, null, 81510100]
                        }]
                    }
                }],
                "error": null
            }
        });

        let bars = parse_chart(&body).unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[0].close - 179.7).abs() < 1e-9);
        assert_eq!(bars[0].trading_day(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(bars[0].timestamp < bars[1].timestamp);
    }

    #[test]
    fn test_parse_chart_prefers_adjusted_close() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1709303400],
                    "indicators": {
                        "quote": [{
                            "open": [10.0], "high": [11.0], "low": [9.0],
                            "close": [10.5], "volume": [100]
                        }],
                        "adjclose": [{"adjclose": [10.2]}]
                    }
                }],
                "error": null
            }
        });

        let bars = parse_chart(&body).unwrap();
        assert!((bars[0].close - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_parse_chart_unknown_symbol_is_empty() {
        let body = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        });
        assert!(parse_chart(&body).unwrap().is_empty());

        let no_sessions = json!({"chart": {"result": [{"meta": {}, "indicators": {"quote": [{}]}}], "error": null}});
        assert!(parse_chart(&no_sessions).unwrap().is_empty());
    }

    #[test]
    fn test_parse_quote_summary() {
        let body = json!({
            "quoteSummary": {
                "result": [{
                    "assetProfile": {"sector": "Technology", "industry": "Consumer Electronics"},
                    "summaryDetail": {"trailingPE": {"raw": 28.4, "fmt": "28.40"}, "marketCap": {"raw": 2.6e12}},
                    "price": {"longName": "Apple Inc."}
                }],
                "error": null
            }
        });

        let meta = parse_quote_summary(&body).unwrap();
        assert_eq!(meta.sector.as_deref(), Some("Technology"));
        assert_eq!(meta.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(meta.trailing_pe, Some(28.4));
        assert_eq!(meta.market_cap, Some(2.6e12));
    }

    #[test]
    fn test_parse_quote_summary_missing_fields() {
        let body = json!({
            "quoteSummary": {"result": [{"summaryDetail": {"trailingPE": {}}}], "error": null}
        });

        let meta = parse_quote_summary(&body).unwrap();
        assert_eq!(meta.sector_or_default(), "Unknown");
        assert!(meta.trailing_pe_or_default().is_infinite());
    }

    #[test]
    fn test_parse_quote_summary_error_envelopes() {
        let invalid_crumb = json!({
            "finance": {"result": null, "error": {"code": "Unauthorized", "description": "Invalid Crumb"}}
        });
        match parse_quote_summary(&invalid_crumb) {
            Err(AnalysisError::ApiError(msg)) => assert!(msg.contains("Unauthorized: Invalid Crumb")),
            other => panic!("expected ApiError, got {:?}", other),
        }

        let unknown = json!({
            "quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}}
        });
        match parse_quote_summary(&unknown) {
            Err(AnalysisError::ApiError(msg)) => assert!(msg.contains("Quote not found")),
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_crumb() {
        assert_eq!(parse_crumb("Xq2.mWsk/aB\n").as_deref(), Some("Xq2.mWsk/aB"));
        assert_eq!(parse_crumb("  abcDEF123 \n").as_deref(), Some("abcDEF123"));
        assert!(parse_crumb("").is_none());
        assert!(parse_crumb("Too Many Requests").is_none());
        assert!(parse_crumb("<html><body>blocked</body></html>").is_none());
        assert!(parse_crumb(r#"{"finance":{"error":{}}}"#).is_none());
    }
}
