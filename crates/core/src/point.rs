use std::sync::atomic::{AtomicI64, Ordering};

/// Label of a point that has not been assigned to any cluster yet.
pub const UNASSIGNED: i64 = -1;

/// A coordinate vector with a cluster label.
///
/// Coordinates are fixed at construction. The label lives in an atomic
/// cell so assignment jobs can write it through a shared reference;
/// each job owns a disjoint index range, and phases are separated by a
/// join barrier, so `Relaxed` ordering is enough.
#[derive(Debug)]
pub struct Point {
    coords: Vec<f64>,
    cluster: AtomicI64,
}

impl Point {
    /// Create an unassigned point from its coordinates.
    pub fn new(coords: Vec<f64>) -> Self {
        Self {
            coords,
            cluster: AtomicI64::new(UNASSIGNED),
        }
    }

    /// Coordinate read access.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Number of coordinates.
    pub fn dimensions(&self) -> usize {
        self.coords.len()
    }

    /// Current cluster label, or [`UNASSIGNED`].
    pub fn cluster(&self) -> i64 {
        self.cluster.load(Ordering::Relaxed)
    }

    /// Reassign the point to a cluster.
    pub fn set_cluster(&self, cluster: i64) {
        self.cluster.store(cluster, Ordering::Relaxed);
    }
}

impl Clone for Point {
    fn clone(&self) -> Self {
        Self {
            coords: self.coords.clone(),
            cluster: AtomicI64::new(self.cluster()),
        }
    }
}
