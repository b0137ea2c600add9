//! Next-day direction classifier: gradient boosted trees trained per ticker.

pub mod gradient_boosted;
pub mod trainer;

pub use gradient_boosted::{BoostingParams, GradientBoostedClassifier, RegressionTree, TreeNode};
pub use trainer::{train_direction_model, train_test_split, TrainedModel, TrainingConfig, MIN_TRAINING_ROWS};
