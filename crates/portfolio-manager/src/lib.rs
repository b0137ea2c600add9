pub mod models;
pub mod optimizer;
pub mod shared_math;

pub use models::*;
pub use optimizer::{allocate, clean_weights, equal_weights, max_sharpe, project_capped_simplex, OptimizerConfig};
