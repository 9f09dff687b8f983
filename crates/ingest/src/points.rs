use corral_core::Point;

use crate::error::IngestError;
use crate::table::CsvTable;

/// Build one point per table row from the selected fields, min-max
/// normalized per field to [0, 1].
///
/// Values that fail to parse count as 0.0, matching the ingest policy
/// for sparse exports. A constant field normalizes to 0.0 everywhere
/// (the span is padded with a small epsilon to avoid dividing by zero).
pub fn points_from_table(table: &CsvTable, fields: &[String]) -> Result<Vec<Point>, IngestError> {
    let columns: Vec<usize> = fields
        .iter()
        .map(|field| {
            table
                .column_index(field)
                .ok_or_else(|| IngestError::UnknownField(field.clone()))
        })
        .collect::<Result<_, _>>()?;

    // First pass: per-field extremes across the whole table.
    let mut mins = vec![f64::INFINITY; columns.len()];
    let mut maxs = vec![f64::NEG_INFINITY; columns.len()];
    for row in table.rows() {
        for (j, &column) in columns.iter().enumerate() {
            let value = parse_value(&row[column]);
            mins[j] = mins[j].min(value);
            maxs[j] = maxs[j].max(value);
        }
    }

    // Second pass: normalize each row into a coordinate vector.
    let points = table
        .rows()
        .iter()
        .map(|row| {
            let coords = columns
                .iter()
                .enumerate()
                .map(|(j, &column)| {
                    let value = parse_value(&row[column]);
                    let mut span = maxs[j] - mins[j];
                    if span == 0.0 {
                        span = 1e-6;
                    }
                    (value - mins[j]) / span
                })
                .collect();
            Point::new(coords)
        })
        .collect();

    Ok(points)
}

fn parse_value(raw: &str) -> f64 {
    raw.parse().unwrap_or(0.0)
}
