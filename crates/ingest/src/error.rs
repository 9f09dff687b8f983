use thiserror::Error;

/// Error type for CSV ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV file has no data rows")]
    Empty,

    #[error("Unknown field: {0}")]
    UnknownField(String),
}
