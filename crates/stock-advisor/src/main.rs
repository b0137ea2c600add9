//! stock-advisor: next-day direction recommendations with a capped max-Sharpe allocation.
//!
//! Usage:
//!   cargo run -p stock-advisor
//!   cargo run -p stock-advisor -- --api-key KEY --tickers AAPL,MSFT --yes
//!   cargo run -p stock-advisor -- --no-prompt --json

use analysis_orchestrator::AdvisorPipeline;
use anyhow::Result;
use newsapi_client::NewsApiClient;
use sentiment_analysis::VaderScorer;
use yahoo_client::YahooFinanceClient;

mod config;
mod form;
mod render;

use config::AdvisorConfig;

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("stock_advisor=info,analysis_orchestrator=info,warn")
        })
    };

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let args: Vec<String> = std::env::args().collect();
    let mut config = AdvisorConfig::from_env()?;
    config.apply_args(&args)?;

    if !config.no_prompt {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        if !form::fill(&mut config, &mut input, &mut output)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let Some(api_key) = config.news_api_key.clone() else {
        tracing::error!("NewsAPI key missing; set NEWS_API_KEY or pass --api-key");
        eprintln!("Error: a NewsAPI key is required (NEWS_API_KEY or --api-key).");
        std::process::exit(1);
    };

    if config.tickers.is_empty() {
        eprintln!("Error: no tickers given.");
        std::process::exit(1);
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  Tickers: {}", config.tickers.join(", "));
    tracing::info!("  Keywords: {}", config.keywords.join(", "));
    tracing::info!(
        "  Min probability: {:.0}%, max P/E: {}",
        config.min_probability * 100.0,
        config.max_trailing_pe
    );
    tracing::info!("  Max weight: {:.0}%, risk-free rate: {}", config.max_weight * 100.0, config.risk_free_rate);

    let prices = YahooFinanceClient::with_timeout(config.http_timeout());
    let news = NewsApiClient::with_settings(api_key, config.newsapi_rate_limit, config.http_timeout());
    let pipeline = AdvisorPipeline::new(prices, news, VaderScorer::new(), config.pipeline_config());

    let today = chrono::Utc::now().date_naive();
    let report = pipeline.run(&config.tickers, today).await;

    if config.json_output {
        println!("{}", render::render_json(&report)?);
    } else {
        print!("{}", render::render_text(&report));
    }

    tracing::info!(
        "Done: {} recommended, {} filtered out, {} skipped",
        report.recommendations.len(),
        report.rejections.len(),
        report.skipped.len()
    );

    Ok(())
}
