//! Grouping of clustered points and text report emission.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use thiserror::Error;

use corral_core::Point;
use corral_ingest::CsvTable;

/// Error type for report emission.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Group point indices by cluster label, in ascending label order.
///
/// Unassigned points (label −1) group under their sentinel label so a
/// report over unfitted data stays visible instead of vanishing.
pub fn group_by_cluster(points: &[Point]) -> BTreeMap<i64, Vec<usize>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (index, point) in points.iter().enumerate() {
        groups.entry(point.cluster()).or_default().push(index);
    }
    groups
}

/// Cluster ids in `0..k` that no point is assigned to.
pub fn empty_clusters(points: &[Point], k: usize) -> Vec<usize> {
    let seen: HashSet<i64> = points.iter().map(|p| p.cluster()).collect();
    (0..k).filter(|&id| !seen.contains(&(id as i64))).collect()
}

/// Write one section per cluster: a `Cluster N:` heading followed by
/// the selected fields of each member row, semicolon-separated.
pub fn write_report<W: Write>(
    mut out: W,
    groups: &BTreeMap<i64, Vec<usize>>,
    table: &CsvTable,
    fields: &[String],
) -> Result<(), ReportError> {
    let columns: Vec<usize> = fields
        .iter()
        .map(|field| {
            table
                .column_index(field)
                .ok_or_else(|| ReportError::UnknownField(field.clone()))
        })
        .collect::<Result<_, _>>()?;

    for (cluster, members) in groups {
        writeln!(out, "Cluster {}:", cluster)?;
        for &row in members {
            let values: Vec<&str> = columns
                .iter()
                .filter_map(|&column| table.rows().get(row).and_then(|r| r.get(column)))
                .map(String::as_str)
                .collect();
            writeln!(out, "{}", values.join("; "))?;
        }
        writeln!(out)?;
    }
    Ok(())
}
