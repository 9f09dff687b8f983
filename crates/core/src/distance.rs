use thiserror::Error;

use crate::point::Point;

/// A point whose coordinate count differs from the run's fixed dimensionality.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Point {index} has {found} dimensions, expected {expected}")]
pub struct DimensionError {
    pub index: usize,
    pub expected: usize,
    pub found: usize,
}

/// Check that every point has exactly `expected` coordinates.
///
/// Distance itself assumes equal lengths; callers validate a whole batch
/// once instead of paying the check per pair.
pub fn validate_dimensions(points: &[Point], expected: usize) -> Result<(), DimensionError> {
    for (index, point) in points.iter().enumerate() {
        if point.dimensions() != expected {
            return Err(DimensionError {
                index,
                expected,
                found: point.dimensions(),
            });
        }
    }
    Ok(())
}

/// Squared Euclidean distance.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance.
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}
