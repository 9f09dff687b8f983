use std::ops::Range;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use corral_core::{squared_euclidean, validate_dimensions, Point};
use corral_pool::TaskPool;

use crate::error::ComputeError;

/// Metadata about a completed clustering run. The labels themselves are
/// written into the points.
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Whether an assignment phase finished with zero label changes.
    pub converged: bool,
}

/// Lloyd's k-means engine running both phases on a [`TaskPool`].
///
/// Every iteration fans the point collection out in contiguous batches,
/// one per pool worker, joins every handle, and only then moves on, so
/// the assignment and update phases never overlap. Centroids are
/// replaced wholesale between iterations, never edited in place.
#[derive(Debug)]
pub struct Kmeans {
    k: usize,
    dimensions: usize,
    max_iterations: usize,
    centers: Arc<Vec<Vec<f64>>>,
}

impl Kmeans {
    /// Create an engine for `k` clusters over `dimensions`-dimensional
    /// points. Rejects `k == 0`.
    pub fn new(k: usize, dimensions: usize, max_iterations: usize) -> Result<Self, ComputeError> {
        if k == 0 {
            return Err(ComputeError::Config(
                "cluster count must be positive".to_string(),
            ));
        }
        Ok(Self {
            k,
            dimensions,
            max_iterations,
            centers: Arc::new(Vec::new()),
        })
    }

    /// Snapshot of the current centroid vectors, indexed by cluster id.
    pub fn centers(&self) -> Vec<Vec<f64>> {
        self.centers.as_ref().clone()
    }

    /// Cluster `points`, writing each point's label in place.
    ///
    /// Initial centroids are value-copies of K points drawn by a uniform
    /// random permutation. On exact distance ties the lowest centroid
    /// index wins: the scan only accepts a strictly smaller distance.
    pub fn fit(
        &mut self,
        points: &Arc<Vec<Point>>,
        pool: &TaskPool,
    ) -> Result<FitSummary, ComputeError> {
        self.fit_with_rng(points, pool, &mut rand::thread_rng())
    }

    /// [`Kmeans::fit`] with a caller-provided source of randomness, for
    /// reproducible runs.
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &mut self,
        points: &Arc<Vec<Point>>,
        pool: &TaskPool,
        rng: &mut R,
    ) -> Result<FitSummary, ComputeError> {
        let n = points.len();
        if n == 0 {
            return Err(ComputeError::Config("point set is empty".to_string()));
        }
        if self.k > n {
            return Err(ComputeError::Config(format!(
                "cluster count {} exceeds available points ({})",
                self.k, n
            )));
        }
        validate_dimensions(points, self.dimensions)?;

        // Permuting indices instead of the shared buffer keeps the
        // caller's point order intact for downstream reporting.
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        let centers: Vec<Vec<f64>> = order[..self.k]
            .iter()
            .map(|&i| points[i].coords().to_vec())
            .collect();
        self.centers = Arc::new(centers);
        debug!("Initialized {} centroids from {} points", self.k, n);

        let batches = partition(n, pool.worker_count());

        let mut iterations = 0;
        let mut converged = false;
        for _ in 0..self.max_iterations {
            iterations += 1;

            converged = self.assign_points(points, pool, &batches)?;
            self.update_centers(points, pool, &batches)?;

            debug!("Iteration {} complete (converged: {})", iterations, converged);
            if converged {
                break;
            }
        }

        info!(
            "K-means finished: k={}, {} points, {} iterations, converged: {}",
            self.k, n, iterations, converged
        );
        Ok(FitSummary {
            iterations,
            converged,
        })
    }

    /// Assignment phase: one job per batch relabels its index range to
    /// the nearest centroid. Returns whether the phase converged, i.e.
    /// no batch changed any label.
    fn assign_points(
        &self,
        points: &Arc<Vec<Point>>,
        pool: &TaskPool,
        batches: &[Range<usize>],
    ) -> Result<bool, ComputeError> {
        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            let points = Arc::clone(points);
            let centers = Arc::clone(&self.centers);
            let batch = batch.clone();
            handles.push(pool.submit(move || {
                let mut changed = false;
                for point in &points[batch] {
                    let nearest = nearest_center(point.coords(), &centers) as i64;
                    if nearest != point.cluster() {
                        point.set_cluster(nearest);
                        changed = true;
                    }
                }
                changed
            }));
        }

        let mut converged = true;
        for handle in handles {
            if handle.join()? {
                converged = false;
            }
        }
        Ok(converged)
    }

    /// Update phase: each job accumulates per-cluster counts and
    /// coordinate sums for its batch; the reduction into totals runs on
    /// the coordinator after every handle is joined.
    fn update_centers(
        &mut self,
        points: &Arc<Vec<Point>>,
        pool: &TaskPool,
        batches: &[Range<usize>],
    ) -> Result<(), ComputeError> {
        validate_dimensions(points, self.dimensions)?;

        let k = self.k;
        let dim = self.dimensions;

        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            let points = Arc::clone(points);
            let batch = batch.clone();
            handles.push(pool.submit(move || {
                let mut counts = vec![0usize; k];
                let mut sums = vec![vec![0.0; dim]; k];
                for point in &points[batch] {
                    let cluster = point.cluster() as usize;
                    counts[cluster] += 1;
                    for (d, &value) in point.coords().iter().enumerate() {
                        sums[cluster][d] += value;
                    }
                }
                (counts, sums)
            }));
        }

        let mut total_counts = vec![0usize; k];
        let mut total_sums = vec![vec![0.0; dim]; k];
        for handle in handles {
            let (counts, sums) = handle.join()?;
            for cluster in 0..k {
                total_counts[cluster] += counts[cluster];
                for d in 0..dim {
                    total_sums[cluster][d] += sums[cluster][d];
                }
            }
        }

        let mut new_centers = Vec::with_capacity(k);
        for (cluster, sums) in total_sums.into_iter().enumerate() {
            if total_counts[cluster] == 0 {
                // Empty cluster: keep the previous centroid.
                new_centers.push(self.centers[cluster].clone());
                continue;
            }
            let count = total_counts[cluster] as f64;
            new_centers.push(sums.into_iter().map(|sum| sum / count).collect());
        }
        self.centers = Arc::new(new_centers);
        Ok(())
    }
}

/// Find the index of the nearest centroid. First strictly smaller
/// distance wins, so exact ties go to the lowest index.
fn nearest_center(coords: &[f64], centers: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = squared_euclidean(coords, &centers[0]);
    for (i, center) in centers.iter().enumerate().skip(1) {
        let dist = squared_euclidean(coords, center);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// Split `0..len` into at most `workers` contiguous ranges; the last
/// range absorbs the remainder when `len` is not evenly divisible.
fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let batch = (len / workers).max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < len {
        let end = if ranges.len() + 1 == workers {
            len
        } else {
            (start + batch).min(len)
        };
        ranges.push(start..end);
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use corral_core::UNASSIGNED;

    use super::*;

    fn points_from(coords: &[(f64, f64)]) -> Arc<Vec<Point>> {
        Arc::new(
            coords
                .iter()
                .map(|&(x, y)| Point::new(vec![x, y]))
                .collect(),
        )
    }

    fn two_blob_points() -> Arc<Vec<Point>> {
        points_from(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (10.0, 10.0),
            (11.0, 10.0),
            (10.0, 11.0),
            (11.0, 11.0),
        ])
    }

    /// Plain sequential Lloyd's, mirroring the engine step for step.
    /// Used to pin the parallel implementation against a baseline.
    fn sequential_fit(
        points: &[Point],
        k: usize,
        max_iterations: usize,
        seed: u64,
    ) -> (Vec<i64>, Vec<Vec<f64>>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.shuffle(&mut rng);
        let mut centers: Vec<Vec<f64>> =
            order[..k].iter().map(|&i| points[i].coords().to_vec()).collect();
        let mut labels = vec![UNASSIGNED; points.len()];

        for _ in 0..max_iterations {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let nearest = nearest_center(point.coords(), &centers) as i64;
                if nearest != labels[i] {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            let dim = centers[0].len();
            let mut counts = vec![0usize; k];
            let mut sums = vec![vec![0.0; dim]; k];
            for (i, point) in points.iter().enumerate() {
                let cluster = labels[i] as usize;
                counts[cluster] += 1;
                for (d, &value) in point.coords().iter().enumerate() {
                    sums[cluster][d] += value;
                }
            }
            for cluster in 0..k {
                if counts[cluster] == 0 {
                    continue;
                }
                let count = counts[cluster] as f64;
                for d in 0..dim {
                    centers[cluster][d] = sums[cluster][d] / count;
                }
            }

            if !changed {
                break;
            }
        }

        (labels, centers)
    }

    #[test]
    fn zero_clusters_rejected_before_any_point_is_touched() {
        let err = Kmeans::new(0, 2, 10).unwrap_err();
        assert!(matches!(err, ComputeError::Config(_)));
    }

    #[test]
    fn empty_point_set_rejected() {
        let points: Arc<Vec<Point>> = Arc::new(Vec::new());
        let pool = TaskPool::new(2).unwrap();
        let mut engine = Kmeans::new(1, 2, 10).unwrap();
        let err = engine.fit(&points, &pool).unwrap_err();
        assert!(matches!(err, ComputeError::Config(_)));
    }

    #[test]
    fn more_clusters_than_points_rejected() {
        let points = points_from(&[(0.0, 0.0), (1.0, 1.0)]);
        let pool = TaskPool::new(2).unwrap();
        let mut engine = Kmeans::new(3, 2, 10).unwrap();
        let err = engine.fit(&points, &pool).unwrap_err();
        assert!(matches!(err, ComputeError::Config(_)));
    }

    #[test]
    fn dimension_mismatch_aborts_the_run() {
        let points = Arc::new(vec![
            Point::new(vec![0.0, 0.0]),
            Point::new(vec![1.0]),
        ]);
        let pool = TaskPool::new(2).unwrap();
        let mut engine = Kmeans::new(1, 2, 10).unwrap();
        let err = engine.fit(&points, &pool).unwrap_err();
        assert!(matches!(err, ComputeError::Dimension(_)));
        // No point may have been labeled before the validation failure.
        assert!(points.iter().all(|p| p.cluster() == UNASSIGNED));
    }

    #[test]
    fn labels_end_up_in_cluster_range() {
        let coords: Vec<(f64, f64)> = (0..20)
            .map(|i| ((i % 7) as f64, (i % 5) as f64))
            .collect();
        let points = points_from(&coords);
        let pool = TaskPool::new(3).unwrap();
        let mut engine = Kmeans::new(3, 2, 50).unwrap();
        engine
            .fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();

        for point in points.iter() {
            let label = point.cluster();
            assert!((0..3).contains(&label), "label out of range: {label}");
        }
    }

    #[test]
    fn two_obvious_clusters_converge_to_their_means() {
        let points = two_blob_points();
        let pool = TaskPool::new(4).unwrap();
        let mut engine = Kmeans::new(2, 2, 10).unwrap();
        let summary = engine
            .fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(7))
            .unwrap();

        assert!(summary.converged, "expected convergence before the iteration limit");
        assert!(summary.iterations < 10);

        // Every point must sit closest to its assigned centroid.
        let centers = engine.centers();
        for point in points.iter() {
            let own = squared_euclidean(point.coords(), &centers[point.cluster() as usize]);
            for center in &centers {
                assert!(own <= squared_euclidean(point.coords(), center) + 1e-9);
            }
        }

        // Final centroids are the blob means, in some order.
        let mut sorted = centers.clone();
        sorted.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap());
        assert!((sorted[0][0] - 0.5).abs() < 1e-9);
        assert!((sorted[0][1] - 0.5).abs() < 1e-9);
        assert!((sorted[1][0] - 10.5).abs() < 1e-9);
        assert!((sorted[1][1] - 10.5).abs() < 1e-9);
    }

    #[test]
    fn converged_centers_are_member_means() {
        let points = two_blob_points();
        let pool = TaskPool::new(2).unwrap();
        let mut engine = Kmeans::new(2, 2, 20).unwrap();
        let summary = engine
            .fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        assert!(summary.converged);

        // Re-running the update on a stable labeling must not move any
        // centroid: each center already equals the mean of its members.
        let centers = engine.centers();
        for (cluster, center) in centers.iter().enumerate() {
            let members: Vec<&Point> = points
                .iter()
                .filter(|p| p.cluster() as usize == cluster)
                .collect();
            if members.is_empty() {
                continue;
            }
            for d in 0..2 {
                let mean = members.iter().map(|p| p.coords()[d]).sum::<f64>()
                    / members.len() as f64;
                assert!((center[d] - mean).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn cluster_count_equal_to_point_count_converges_immediately() {
        let points = points_from(&[(0.0, 0.0), (5.0, 0.0), (0.0, 5.0), (5.0, 5.0)]);
        let pool = TaskPool::new(2).unwrap();
        let mut engine = Kmeans::new(4, 2, 10).unwrap();
        let summary = engine
            .fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();

        assert!(summary.converged);
        assert!(summary.iterations <= 2);

        // Every point is its own centroid.
        let centers = engine.centers();
        let mut labels: Vec<i64> = points.iter().map(|p| p.cluster()).collect();
        for point in points.iter() {
            assert_eq!(centers[point.cluster() as usize], point.coords());
        }
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_cluster_keeps_its_initial_position() {
        // All points identical: ties always resolve to cluster 0, so
        // cluster 1 never attracts a member and must stay frozen at its
        // initial coordinates, bit for bit.
        let points = points_from(&[(3.0, -1.0), (3.0, -1.0), (3.0, -1.0), (3.0, -1.0)]);
        let pool = TaskPool::new(2).unwrap();
        let mut engine = Kmeans::new(2, 2, 10).unwrap();
        engine
            .fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(5))
            .unwrap();

        for point in points.iter() {
            assert_eq!(point.cluster(), 0, "exact ties must go to the lowest index");
        }
        let centers = engine.centers();
        assert_eq!(centers[1], vec![3.0, -1.0]);
    }

    #[test]
    fn single_batch_run_matches_sequential_baseline_exactly() {
        let coords: Vec<(f64, f64)> = (0..30)
            .map(|i| ((i * 13 % 17) as f64, (i * 7 % 11) as f64))
            .collect();
        let points = points_from(&coords);
        let (expected_labels, expected_centers) = sequential_fit(&points, 4, 50, 99);

        let pool = TaskPool::new(1).unwrap();
        let mut engine = Kmeans::new(4, 2, 50).unwrap();
        engine
            .fit_with_rng(&points, &pool, &mut ChaCha8Rng::seed_from_u64(99))
            .unwrap();

        let labels: Vec<i64> = points.iter().map(|p| p.cluster()).collect();
        assert_eq!(labels, expected_labels);
        assert_eq!(engine.centers(), expected_centers);
    }

    #[test]
    fn worker_count_does_not_change_the_result() {
        let coords: Vec<(f64, f64)> = (0..25)
            .map(|i| ((i * 3 % 13) as f64, (i * 5 % 7) as f64))
            .collect();

        let points_one = points_from(&coords);
        let pool_one = TaskPool::new(1).unwrap();
        let mut engine_one = Kmeans::new(3, 2, 50).unwrap();
        engine_one
            .fit_with_rng(&points_one, &pool_one, &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();

        let points_many = points_from(&coords);
        let pool_many = TaskPool::new(4).unwrap();
        let mut engine_many = Kmeans::new(3, 2, 50).unwrap();
        engine_many
            .fit_with_rng(&points_many, &pool_many, &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();

        let labels_one: Vec<i64> = points_one.iter().map(|p| p.cluster()).collect();
        let labels_many: Vec<i64> = points_many.iter().map(|p| p.cluster()).collect();
        assert_eq!(labels_one, labels_many);

        // Reduction order differs across batch counts, so compare the
        // centroids within floating-point tolerance.
        for (a, b) in engine_one.centers().iter().zip(engine_many.centers().iter()) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn partition_covers_range_without_overlap() {
        for (len, workers) in [(10, 4), (10, 3), (3, 8), (7, 1), (16, 4)] {
            let ranges = partition(len, workers);
            assert!(ranges.len() <= workers.max(1));
            let mut expected_start = 0;
            for range in &ranges {
                assert_eq!(range.start, expected_start);
                assert!(range.end > range.start);
                expected_start = range.end;
            }
            assert_eq!(expected_start, len);
        }
    }

    #[test]
    fn last_batch_absorbs_the_remainder() {
        let ranges = partition(10, 4);
        assert_eq!(ranges, vec![0..2, 2..4, 4..6, 6..10]);
    }
}
