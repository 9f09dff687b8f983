use std::path::Path;

use tracing::debug;

use crate::error::IngestError;

/// In-memory CSV contents: one header row plus string-valued data rows.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Column names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows, each aligned with [`CsvTable::headers`].
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of a named field in a row.
    pub fn field(&self, row: usize, name: &str) -> Option<&str> {
        let column = self.column_index(name)?;
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}

/// Read a CSV file whose first line is a header.
///
/// `limit` caps the number of data rows read. A file without any data
/// row is rejected.
pub fn read_csv(path: impl AsRef<Path>, limit: Option<usize>) -> Result<CsvTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_ref())?;

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
        if limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
    }

    if rows.is_empty() {
        return Err(IngestError::Empty);
    }

    debug!("Read {} rows from {}", rows.len(), path.as_ref().display());
    Ok(CsvTable { headers, rows })
}

/// Fields whose value in the first data row parses as a number, in
/// header order. These become the clustering features.
pub fn numeric_fields(table: &CsvTable) -> Vec<String> {
    let Some(first) = table.rows().first() else {
        return Vec::new();
    };
    table
        .headers()
        .iter()
        .zip(first)
        .filter(|(_, value)| value.parse::<f64>().is_ok())
        .map(|(header, _)| header.clone())
        .collect()
}
