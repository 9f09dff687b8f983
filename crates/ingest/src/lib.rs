//! CSV ingestion and point preparation.
//!
//! Reads a header-first CSV file into a [`CsvTable`], sniffs which
//! fields are numeric, and min-max normalizes the selected fields into
//! the coordinate vectors the clustering engine consumes.

pub mod error;
pub mod points;
pub mod table;

pub use error::IngestError;
pub use points::points_from_table;
pub use table::{numeric_fields, read_csv, CsvTable};
