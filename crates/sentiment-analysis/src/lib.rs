use analysis_core::SentimentScorer;
use vader_sentiment::SentimentIntensityAnalyzer;

pub mod daily;
pub use daily::{build_query, DaySentiment, SentimentFetcher, ZeroReason};

/// Rule-based compound polarity scorer (VADER lexicon).
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn polarity(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }

        let scores = self.analyzer.polarity_scores(text);
        scores
            .get("compound")
            .copied()
            .filter(|c| c.is_finite())
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_text() {
        let scorer = VaderScorer::new();
        let score = scorer.polarity("Shares surged after a great quarter and excellent guidance.");
        assert!(score > 0.0, "got {}", score);
    }

    #[test]
    fn test_negative_text() {
        let scorer = VaderScorer::new();
        let score = scorer.polarity("Terrible results, the company faces a horrible lawsuit and losses.");
        assert!(score < 0.0, "got {}", score);
    }

    #[test]
    fn test_empty_text_is_neutral() {
        let scorer = VaderScorer::new();
        assert_eq!(scorer.polarity(""), 0.0);
        assert_eq!(scorer.polarity("   "), 0.0);
    }

    #[test]
    fn test_scores_bounded() {
        let scorer = VaderScorer::new();
        for text in [
            "GREAT GREAT GREAT!!! best ever, love it, amazing, wonderful :)",
            "worst disaster ever, hate, awful, horrible, terrible!!!",
            "The meeting is on Tuesday.",
        ] {
            let score = scorer.polarity(text);
            assert!((-1.0..=1.0).contains(&score), "{} -> {}", text, score);
        }
    }
}
