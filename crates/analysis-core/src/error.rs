use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    /// The provider refuses further requests (exhausted quota, bad key).
    /// Retrying within the same run will not help.
    #[error("Access denied: {0}")]
    AccessDenied(String),
}
