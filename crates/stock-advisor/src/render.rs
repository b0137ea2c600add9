use analysis_orchestrator::PipelineReport;
use portfolio_manager::AllocationOutcome;
use std::fmt::Write;

fn format_pe(pe: f64) -> String {
    if pe.is_finite() {
        format!("{:.2}", pe)
    } else {
        "n/a".to_string()
    }
}

/// Human-readable report.
pub fn render_text(report: &PipelineReport) -> String {
    let mut out = String::new();

    if report.recommendations.is_empty() {
        out.push_str("No recommendations today.\n");
    } else {
        let _ = writeln!(out, "Recommendations for {}", report.as_of);
        for rec in &report.recommendations {
            let c = &rec.candidate;
            let _ = writeln!(
                out,
                "  {:<6} {:<24} buy at ${:.2}  confidence {:.1}%  P/E {}  allocation {:.1}%",
                c.ticker,
                c.sector,
                c.latest_price,
                c.probability * 100.0,
                format_pe(c.trailing_pe),
                rec.weight * 100.0
            );
        }
    }

    if let Some(AllocationOutcome::FallbackEqual { reason, .. }) = &report.allocation {
        let _ = writeln!(out, "Note: equal weights used ({})", reason);
    }

    if !report.rejections.is_empty() {
        out.push_str("Filtered out:\n");
        for r in &report.rejections {
            let _ = writeln!(out, "  {:<6} {}", r.candidate.ticker, r.reason);
        }
    }

    if !report.skipped.is_empty() {
        out.push_str("Warnings:\n");
        for s in &report.skipped {
            let _ = writeln!(out, "  {:<6} skipped: {}", s.ticker, s.reason);
        }
    }

    out
}

pub fn render_json(report: &PipelineReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_orchestrator::{Candidate, Recommendation, SkipReason, TickerSkip};
    use chrono::NaiveDate;
    use portfolio_manager::{OptimizerError, PortfolioWeights};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn empty_report() -> PipelineReport {
        PipelineReport {
            as_of: day(),
            recommendations: Vec::new(),
            rejections: Vec::new(),
            skipped: Vec::new(),
            allocation: None,
        }
    }

    #[test]
    fn test_no_recommendations_message() {
        let mut report = empty_report();
        report.skipped.push(TickerSkip {
            ticker: "ZZZ".to_string(),
            reason: SkipReason::NoPriceData,
        });

        let text = render_text(&report);

        assert!(text.starts_with("No recommendations today."));
        assert!(text.contains("ZZZ    skipped: no price data"));
    }

    #[test]
    fn test_recommendation_line_and_fallback_note() {
        let candidate = Candidate {
            ticker: "JPM".to_string(),
            probability: 0.8123,
            latest_price: 195.5,
            as_of: day(),
            sector: "Financial Services".to_string(),
            trailing_pe: 11.876,
            expected_return: 0.0144,
            accuracy: 0.61,
        };
        let weights = PortfolioWeights::new(vec![("JPM".to_string(), 1.0)]);
        let report = PipelineReport {
            recommendations: vec![Recommendation { candidate, weight: 1.0 }],
            allocation: Some(AllocationOutcome::FallbackEqual {
                weights,
                reason: OptimizerError::Infeasible { n: 1, max_weight: 0.3 },
            }),
            ..empty_report()
        };

        let text = render_text(&report);

        assert!(text.contains("JPM"));
        assert!(text.contains("buy at $195.50"));
        assert!(text.contains("confidence 81.2%"));
        assert!(text.contains("P/E 11.88"));
        assert!(text.contains("allocation 100.0%"));
        assert!(text.contains("Note: equal weights used"));
    }

    #[test]
    fn test_json_output_parses() {
        let json = render_json(&empty_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["as_of"], "2024-06-03");
        assert!(value["recommendations"].as_array().unwrap().is_empty());
    }
}
