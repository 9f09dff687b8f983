use corral_core::DimensionError;
use corral_pool::PoolError;
use thiserror::Error;

/// Error type for clustering runs.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Rejected configuration: zero clusters, empty input, or more
    /// clusters than points.
    #[error("Invalid clustering configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    /// A batch job failed; the run aborts rather than continue with a
    /// partial reduction.
    #[error("Worker pool failure: {0}")]
    Pool(#[from] PoolError),
}
