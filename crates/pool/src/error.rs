use thiserror::Error;

/// Error type for pool construction and job results.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Job failed before producing a result")]
    JobFailed,
}
