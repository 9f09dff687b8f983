pub mod error;
pub mod kmeans;

pub use error::ComputeError;
pub use kmeans::{FitSummary, Kmeans};
