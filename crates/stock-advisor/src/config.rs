use analysis_orchestrator::{FilterThresholds, PipelineConfig};
use anyhow::{bail, Context, Result};
use ml_engine::TrainingConfig;
use portfolio_manager::OptimizerConfig;
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TICKERS: &str = "AAPL,TSLA,JPM";
pub const DEFAULT_KEYWORDS: &str = "tariff,election,regulation,inflation";

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub news_api_key: Option<String>,
    pub tickers: Vec<String>,
    pub keywords: Vec<String>,

    // Filter
    pub min_probability: f64,     // 0.70, strict
    pub max_trailing_pe: f64,     // 30, strict

    // Optimizer
    pub max_weight: f64,          // 0.3 per ticker
    pub risk_free_rate: f64,      // annualised

    // History windows (calendar days)
    pub training_lookback_days: i64,
    pub inference_lookback_days: i64,
    pub min_training_rows: usize,

    // HTTP
    pub http_timeout_secs: u64,
    pub newsapi_rate_limit: usize, // requests per minute

    // Form behaviour
    pub assume_yes: bool,
    pub no_prompt: bool,
    pub json_output: bool,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} has invalid value {:?}", key, raw))
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Uppercased tickers in input order, each listed once.
pub fn parse_tickers(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    parse_list(raw)
        .into_iter()
        .map(|t| t.to_uppercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            news_api_key: lookup("NEWS_API_KEY").filter(|k| !k.trim().is_empty()),
            tickers: parse_tickers(&lookup("ADVISOR_TICKERS").unwrap_or_else(|| DEFAULT_TICKERS.to_string())),
            keywords: parse_list(&lookup("ADVISOR_KEYWORDS").unwrap_or_else(|| DEFAULT_KEYWORDS.to_string())),

            min_probability: parse_var(&lookup, "MIN_PROBABILITY", "0.70")?,
            max_trailing_pe: parse_var(&lookup, "MAX_TRAILING_PE", "30.0")?,

            max_weight: parse_var(&lookup, "MAX_WEIGHT", "0.3")?,
            risk_free_rate: parse_var(&lookup, "RISK_FREE_RATE", "0.0")?,

            training_lookback_days: parse_var(&lookup, "TRAINING_LOOKBACK_DAYS", "365")?,
            inference_lookback_days: parse_var(&lookup, "INFERENCE_LOOKBACK_DAYS", "60")?,
            min_training_rows: parse_var(&lookup, "MIN_TRAINING_ROWS", "30")?,

            http_timeout_secs: parse_var(&lookup, "HTTP_TIMEOUT_SECS", "30")?,
            newsapi_rate_limit: parse_var(&lookup, "NEWSAPI_RATE_LIMIT", "60")?,

            assume_yes: false,
            no_prompt: false,
            json_output: false,
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let value_of = |flag: &str| -> Result<Option<String>> {
            match args.iter().position(|a| a == flag) {
                None => Ok(None),
                Some(i) => match args.get(i + 1) {
                    Some(v) if !v.starts_with("--") => Ok(Some(v.clone())),
                    _ => bail!("{} requires a value", flag),
                },
            }
        };

        if let Some(key) = value_of("--api-key")? {
            self.news_api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        if let Some(tickers) = value_of("--tickers")? {
            self.tickers = parse_tickers(&tickers);
        }
        if let Some(keywords) = value_of("--keywords")? {
            self.keywords = parse_list(&keywords);
        }

        self.assume_yes |= args.iter().any(|a| a == "--yes" || a == "-y");
        self.no_prompt |= args.iter().any(|a| a == "--no-prompt");
        self.json_output |= args.iter().any(|a| a == "--json");

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.min_probability) {
            bail!("MIN_PROBABILITY must be in [0, 1), got {}", self.min_probability);
        }
        if !(self.max_trailing_pe > 0.0) {
            bail!("MAX_TRAILING_PE must be positive, got {}", self.max_trailing_pe);
        }
        if !(self.max_weight > 0.0 && self.max_weight <= 1.0) {
            bail!("MAX_WEIGHT must be in (0, 1], got {}", self.max_weight);
        }
        if !self.risk_free_rate.is_finite() {
            bail!("RISK_FREE_RATE must be finite");
        }
        if self.training_lookback_days <= 0 || self.inference_lookback_days <= 0 {
            bail!("lookback windows must be positive");
        }
        if self.min_training_rows < 2 {
            bail!("MIN_TRAINING_ROWS must be at least 2, got {}", self.min_training_rows);
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            keywords: self.keywords.clone(),
            training_lookback_days: self.training_lookback_days,
            inference_lookback_days: self.inference_lookback_days,
            training: TrainingConfig {
                min_rows: self.min_training_rows,
                ..TrainingConfig::default()
            },
            thresholds: FilterThresholds {
                min_probability: self.min_probability,
                max_trailing_pe: self.max_trailing_pe,
            },
            optimizer: OptimizerConfig {
                max_weight: self.max_weight,
                risk_free_rate: self.risk_free_rate,
                ..OptimizerConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AdvisorConfig> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AdvisorConfig::from_lookup(move |key| map.get(key).cloned())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.news_api_key.is_none());
        assert_eq!(config.tickers, vec!["AAPL", "TSLA", "JPM"]);
        assert_eq!(config.keywords.len(), 4);
        assert_eq!(config.min_probability, 0.70);
        assert_eq!(config.max_weight, 0.3);
        assert_eq!(config.risk_free_rate, 0.0);
        assert_eq!(config.training_lookback_days, 365);
        assert_eq!(config.inference_lookback_days, 60);

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.training.min_rows, 30);
        assert_eq!(pipeline.thresholds.max_trailing_pe, 30.0);
    }

    #[test]
    fn test_env_values_parsed() {
        let config = config_from(&[
            ("NEWS_API_KEY", "secret"),
            ("ADVISOR_TICKERS", " msft , ,nvda"),
            ("MAX_WEIGHT", "0.5"),
        ])
        .unwrap();
        assert_eq!(config.news_api_key.as_deref(), Some("secret"));
        assert_eq!(config.tickers, vec!["MSFT", "NVDA"]);
        assert_eq!(config.max_weight, 0.5);
    }

    #[test]
    fn test_bad_values_rejected() {
        let err = config_from(&[("MIN_PROBABILITY", "high")]).unwrap_err();
        assert!(err.to_string().contains("MIN_PROBABILITY"));
        assert!(config_from(&[("MAX_WEIGHT", "0")]).is_err());
        assert!(config_from(&[("TRAINING_LOOKBACK_DAYS", "-5")]).is_err());
    }

    #[test]
    fn test_blank_key_is_missing() {
        let config = config_from(&[("NEWS_API_KEY", "  ")]).unwrap();
        assert!(config.news_api_key.is_none());
    }

    #[test]
    fn test_args_override_env() {
        let mut config = config_from(&[("NEWS_API_KEY", "from-env")]).unwrap();
        config
            .apply_args(&args(&["stock-advisor", "--api-key", "from-flag", "--tickers", "ibm", "--yes", "--json"]))
            .unwrap();

        assert_eq!(config.news_api_key.as_deref(), Some("from-flag"));
        assert_eq!(config.tickers, vec!["IBM"]);
        assert!(config.assume_yes);
        assert!(config.json_output);
        assert!(!config.no_prompt);
    }

    #[test]
    fn test_flag_without_value() {
        let mut config = config_from(&[]).unwrap();
        assert!(config.apply_args(&args(&["stock-advisor", "--tickers"])).is_err());
        assert!(config.apply_args(&args(&["stock-advisor", "--api-key", "--yes"])).is_err());
    }

    #[test]
    fn test_duplicate_tickers_listed_once() {
        assert_eq!(parse_tickers("AAPL, msft,aapl,MSFT ,jpm"), vec!["AAPL", "MSFT", "JPM"]);

        let config = config_from(&[("ADVISOR_TICKERS", "tsla,TSLA")]).unwrap();
        assert_eq!(config.tickers, vec!["TSLA"]);
    }
}
