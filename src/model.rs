//! K-Means clustering engine over the reference dataset

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::ReferenceDataset;
use crate::error::ServiceError;

/// Smallest cluster count a caller may request
pub const MIN_CLUSTERS: usize = 2;
/// Largest cluster count a caller may request (readability limit of the 2D plot)
pub const MAX_CLUSTERS: usize = 10;
/// Seed used for every clustering run so results are reproducible
pub const DEFAULT_SEED: u64 = 42;

/// Tuning knobs for the K-Means runs
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Maximum Lloyd iterations per run
    pub max_iters: u64,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Number of independently initialised runs; the lowest inertia wins
    pub n_runs: usize,
    /// Seed for centroid initialisation
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_iters: 300,
            tolerance: 1e-4,
            n_runs: 10,
            seed: DEFAULT_SEED,
        }
    }
}

/// Cluster id of every reference point, plus the fitted centroids
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster id per reference point, each in `[0, n_clusters)`
    pub labels: Array1<usize>,
    /// Cluster centroids in feature space, shape (n_clusters, 4)
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl ClusterAssignment {
    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Check a requested cluster count against `[MIN_CLUSTERS, MAX_CLUSTERS]`
pub fn validate_cluster_count(k: i64) -> crate::Result<usize> {
    match usize::try_from(k) {
        Ok(k) if (MIN_CLUSTERS..=MAX_CLUSTERS).contains(&k) => Ok(k),
        _ => Err(ServiceError::OutOfRange(format!(
            "k must be between {} and {}",
            MIN_CLUSTERS, MAX_CLUSTERS
        ))),
    }
}

/// Partition the reference dataset into `k` clusters
///
/// # Arguments
/// * `k` - Requested number of clusters, must lie in `[2, 10]`
/// * `dataset` - Reference points; all four features are used
/// * `config` - Iteration bound, tolerance, number of runs and seed
///
/// # Returns
/// * `ClusterAssignment` with one id per point. The same `k`, dataset and
///   config always give the same assignment.
pub fn cluster(k: i64, dataset: &ReferenceDataset, config: &ClusterConfig) -> crate::Result<ClusterAssignment> {
    let n_clusters = validate_cluster_count(k)?;

    if dataset.len() < n_clusters {
        return Err(ServiceError::OutOfRange(format!(
            "Number of data points ({}) must be at least equal to number of clusters ({})",
            dataset.len(),
            n_clusters
        )));
    }

    let features = dataset.features();
    let observations = DatasetBase::from(features.view());

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(config.max_iters)
        .tolerance(config.tolerance)
        .n_runs(config.n_runs)
        .fit(&observations)
        .map_err(|e| ServiceError::ClusteringFailure(e.to_string()))?;

    let labels: Array1<usize> = model.predict(&observations);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(features, &labels, &centroids);

    log::debug!(
        "K-Means with k={} over {} points finished, inertia {:.4}",
        n_clusters,
        dataset.len(),
        inertia
    );

    Ok(ClusterAssignment {
        n_clusters,
        labels,
        centroids,
        inertia,
    })
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|&(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| squared_distance(&features.row(i), &centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
