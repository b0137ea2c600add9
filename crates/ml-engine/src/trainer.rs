use analysis_core::{AnalysisError, FeatureVector, LabeledSample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::gradient_boosted::{BoostingParams, FeatureRow, GradientBoostedClassifier};

/// Below this many labeled rows a ticker is skipped as insufficient data.
pub const MIN_TRAINING_ROWS: usize = 30;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub min_rows: usize,
    pub params: BoostingParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            min_rows: MIN_TRAINING_ROWS,
            params: BoostingParams::default(),
        }
    }
}

/// A fitted classifier plus its held-out accuracy. Lives for one run only.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub classifier: GradientBoostedClassifier,
    /// Fraction of held-out rows classified correctly at a 0.5 cut-off.
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl TrainedModel {
    pub fn predict_up_probability(&self, features: &FeatureVector) -> f64 {
        self.classifier.predict_up_probability(features)
    }
}

/// Seeded shuffle split. The test side gets `ceil(n * test_fraction)` rows,
/// at least one and never all of them when `n >= 2`.
pub fn train_test_split<T: Clone>(rows: &[T], test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = rows.len();
    if n < 2 {
        return (rows.to_vec(), Vec::new());
    }

    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices[..n_test].iter().map(|&i| rows[i].clone()).collect();
    let train = indices[n_test..].iter().map(|&i| rows[i].clone()).collect();
    (train, test)
}

fn to_matrix(samples: &[LabeledSample]) -> (Vec<FeatureRow>, Vec<bool>) {
    samples
        .iter()
        .map(|s| (s.features.as_array(), s.label))
        .unzip()
}

/// Split, fit and score a next-day direction model for one ticker.
pub fn train_direction_model(
    samples: &[LabeledSample],
    config: &TrainingConfig,
) -> Result<TrainedModel, AnalysisError> {
    if samples.len() < config.min_rows.max(2) {
        return Err(AnalysisError::InsufficientData(format!(
            "{} labeled rows, need at least {}",
            samples.len(),
            config.min_rows
        )));
    }
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(AnalysisError::InvalidData(format!(
            "test fraction {} outside (0, 1)",
            config.test_fraction
        )));
    }

    let (train, test) = train_test_split(samples, config.test_fraction, config.seed);
    let (x_train, y_train) = to_matrix(&train);

    let classifier = GradientBoostedClassifier::fit(&x_train, &y_train, &config.params)?;

    let correct = test
        .iter()
        .filter(|s| (classifier.predict_up_probability(&s.features) > 0.5) == s.label)
        .count();
    let accuracy = correct as f64 / test.len() as f64;

    tracing::debug!(
        "Trained direction model on {} rows, held-out accuracy {:.3} over {} rows",
        train.len(),
        accuracy,
        test.len()
    );

    Ok(TrainedModel {
        classifier,
        accuracy,
        train_rows: train.len(),
        test_rows: test.len(),
    })
}
