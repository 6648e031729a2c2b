//! Co-clustering rating estimator.
//!
//! Alternates between refreshing block statistics and reassigning user and
//! item cluster labels against a fixed residual matrix. Each epoch refreshes
//! the statistics exactly once, at the top, then sweeps all users and all
//! items; the sweeps read only the epoch-start statistics and read-only
//! intermediates, so they parallelize without changing the result.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use ndarray::Array2;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use rayon::prelude::*;

use crate::ids::IdMap;
use crate::train::TrainSet;
use crate::types::{CoClusteringParams, FitError};
use crate::util;

/// Co-clustering collaborative-filtering model.
///
/// The fitted state is written exactly once per [`fit`](Self::fit) call and
/// is immutable afterwards; [`predict`](Self::predict) takes `&self` and may
/// run concurrently from any number of threads.
#[derive(Debug, Clone)]
pub struct CoClustering {
    params: CoClusteringParams,
    users: IdMap,
    items: IdMap,
    global_mean: f64,
    user_means: Vec<f64>,
    item_means: Vec<f64>,
    user_clusters: Vec<usize>,
    item_clusters: Vec<usize>,
    user_cluster_means: Vec<f64>,
    item_cluster_means: Vec<f64>,
    co_cluster_means: Array2<f64>,
}

impl CoClustering {
    pub fn new(params: CoClusteringParams) -> Self {
        Self {
            params,
            users: IdMap::new(),
            items: IdMap::new(),
            global_mean: 0.0,
            user_means: Vec::new(),
            item_means: Vec::new(),
            user_clusters: Vec::new(),
            item_clusters: Vec::new(),
            user_cluster_means: Vec::new(),
            item_cluster_means: Vec::new(),
            co_cluster_means: Array2::zeros((0, 0)),
        }
    }

    /// Fit the model on a training set.
    ///
    /// Initial cluster labels are drawn from `rand_state`; everything after
    /// that is deterministic, so two fits with the same seed and the same
    /// training set produce bit-identical state.
    pub fn fit(&mut self, train: &TrainSet) -> Result<(), FitError> {
        self.params.validate()?;
        if train.is_empty() {
            return Err(FitError::EmptyTrainSet);
        }

        let n_users = train.user_count();
        let n_items = train.item_count();
        let n_user_clusters = self.params.n_user_clusters;
        let n_item_clusters = self.params.n_item_clusters;
        let seed = self.params.rand_state.unwrap_or_else(clock_seed);

        let start = Instant::now();
        info!(
            "fitting co-clustering: {} users x {} items, {} ratings, {}x{} clusters, {} epochs",
            n_users,
            n_items,
            train.num_ratings(),
            n_user_clusters,
            n_item_clusters,
            self.params.n_epochs
        );

        self.users = train.users().clone();
        self.items = train.items().clone();
        self.global_mean = train.global_mean();
        self.user_means = util::ratings_means(train.user_ratings());
        self.item_means = util::ratings_means(train.item_ratings());

        let mut rng = StdRng::seed_from_u64(seed);
        self.user_clusters = util::uniform_labels(&mut rng, n_users, n_user_clusters);
        self.item_clusters = util::uniform_labels(&mut rng, n_items, n_item_clusters);
        self.user_cluster_means = vec![0.0; n_user_clusters];
        self.item_cluster_means = vec![0.0; n_item_clusters];
        self.co_cluster_means = Array2::zeros((n_user_clusters, n_item_clusters));

        // Residuals against the row and column means, NaN where unobserved.
        // Computed once; the epochs only reread it.
        let mut residuals = util::nan_matrix(n_users, n_items);
        for (u, ratings) in train.user_ratings().iter().enumerate() {
            for &(i, rating) in ratings {
                residuals[[u, i]] = rating - self.user_means[u] - self.item_means[i];
            }
        }

        for epoch in 0..self.params.n_epochs {
            self.refresh_block_means(train);

            let user_residuals = self.user_cluster_residuals(train, &residuals);
            let users_moved = self.reassign_users(&user_residuals);

            let item_residuals = self.item_cluster_residuals(train, &residuals);
            let items_moved = self.reassign_items(&item_residuals);

            debug!(
                "epoch {}/{}: {} user labels moved, {} item labels moved",
                epoch + 1,
                self.params.n_epochs,
                users_moved,
                items_moved
            );
        }
        // Leave the stored means consistent with the final labels.
        self.refresh_block_means(train);

        info!("co-clustering fit finished in {:?}", start.elapsed());
        Ok(())
    }

    /// Predict the rating of `user_id` for `item_id`.
    ///
    /// Known user and item combine row, column and block means; a single
    /// unknown side falls back to the known side's mean, and two unknown
    /// sides fall back to the global mean. Total over any pair of ids once
    /// fit has succeeded.
    pub fn predict(&self, user_id: u64, item_id: u64) -> f64 {
        match (self.users.to_index(user_id), self.items.to_index(item_id)) {
            (Some(u), Some(i)) => {
                let g = self.user_clusters[u];
                let h = self.item_clusters[i];
                // An empty block has a NaN mean and contributes nothing.
                let block = self.co_cluster_means[[g, h]];
                let block = if block.is_nan() { 0.0 } else { block };
                self.user_means[u] + self.item_means[i]
                    - self.user_cluster_means[g]
                    - self.item_cluster_means[h]
                    + block
            }
            (Some(u), None) => self.user_means[u],
            (None, Some(i)) => self.item_means[i],
            (None, None) => self.global_mean,
        }
    }

    /// Observation-weighted means of the raw ratings per user cluster, item
    /// cluster and block. Empty clusters and blocks come out as NaN (0/0).
    fn refresh_block_means(&mut self, train: &TrainSet) {
        cluster_means(
            &mut self.user_cluster_means,
            &self.user_clusters,
            train.user_ratings(),
        );
        cluster_means(
            &mut self.item_cluster_means,
            &self.item_clusters,
            train.item_ratings(),
        );

        let shape = self.co_cluster_means.dim();
        let mut sums = Array2::<f64>::zeros(shape);
        let mut counts = Array2::<f64>::zeros(shape);
        for (u, ratings) in train.user_ratings().iter().enumerate() {
            let g = self.user_clusters[u];
            for &(i, rating) in ratings {
                let h = self.item_clusters[i];
                sums[[g, h]] += rating;
                counts[[g, h]] += 1.0;
            }
        }
        self.co_cluster_means = &sums / &counts;
    }

    /// `U x L` intermediate: mean residual of each user against each item
    /// cluster, shifted by the item-cluster mean. NaN where the user has no
    /// observation in that item cluster.
    fn user_cluster_residuals(&self, train: &TrainSet, residuals: &Array2<f64>) -> Array2<f64> {
        let n_users = train.user_count();
        let n_item_clusters = self.params.n_item_clusters;
        let mut sums = Array2::<f64>::zeros((n_users, n_item_clusters));
        let mut counts = Array2::<f64>::zeros((n_users, n_item_clusters));
        for (u, ratings) in train.user_ratings().iter().enumerate() {
            for &(i, _) in ratings {
                let h = self.item_clusters[i];
                sums[[u, h]] += residuals[[u, i]];
                counts[[u, h]] += 1.0;
            }
        }
        let mut out = &sums / &counts;
        for mut row in out.rows_mut() {
            for (h, cell) in row.iter_mut().enumerate() {
                *cell += self.item_cluster_means[h];
            }
        }
        out
    }

    /// `K x I` intermediate: mean residual of each user cluster against each
    /// item, shifted by the user-cluster mean. Built from the user labels
    /// updated earlier in the same epoch.
    fn item_cluster_residuals(&self, train: &TrainSet, residuals: &Array2<f64>) -> Array2<f64> {
        let n_items = train.item_count();
        let n_user_clusters = self.params.n_user_clusters;
        let mut sums = Array2::<f64>::zeros((n_user_clusters, n_items));
        let mut counts = Array2::<f64>::zeros((n_user_clusters, n_items));
        for (i, ratings) in train.item_ratings().iter().enumerate() {
            for &(u, _) in ratings {
                let g = self.user_clusters[u];
                sums[[g, i]] += residuals[[u, i]];
                counts[[g, i]] += 1.0;
            }
        }
        let mut out = &sums / &counts;
        for (g, mut row) in out.rows_mut().into_iter().enumerate() {
            let shift = self.user_cluster_means[g];
            for cell in row.iter_mut() {
                *cell += shift;
            }
        }
        out
    }

    /// One sweep over all users. Each user moves to the cluster with the
    /// least squared distance between its cluster-residual row and the
    /// candidate's block profile; cells with an unobserved intermediate are
    /// skipped, and the current label wins ties. A NaN candidate cost (empty
    /// cluster or empty block meeting an observed cell) never wins a
    /// comparison. Returns the number of labels that changed.
    fn reassign_users(&mut self, user_residuals: &Array2<f64>) -> usize {
        let n_user_clusters = self.params.n_user_clusters;
        let n_item_clusters = self.params.n_item_clusters;
        let co_means = &self.co_cluster_means;
        let user_cluster_means = &self.user_cluster_means;

        let next: Vec<usize> = self
            .user_clusters
            .par_iter()
            .enumerate()
            .map(|(u, &current)| {
                let cost_of = |g: usize| {
                    let mut cost = 0.0;
                    for h in 0..n_item_clusters {
                        let cell = user_residuals[[u, h]];
                        if cell.is_nan() {
                            continue;
                        }
                        let diff = cell - co_means[[g, h]] + user_cluster_means[g];
                        cost += diff * diff;
                    }
                    cost
                };
                let mut best = current;
                let mut least = cost_of(current);
                if least.is_nan() {
                    least = f64::INFINITY;
                }
                for g in 0..n_user_clusters {
                    if g == current {
                        continue;
                    }
                    let cost = cost_of(g);
                    if cost < least {
                        best = g;
                        least = cost;
                    }
                }
                best
            })
            .collect();

        let moved = count_moved(&self.user_clusters, &next);
        self.user_clusters = next;
        moved
    }

    /// The symmetric sweep over all items.
    fn reassign_items(&mut self, item_residuals: &Array2<f64>) -> usize {
        let n_user_clusters = self.params.n_user_clusters;
        let n_item_clusters = self.params.n_item_clusters;
        let co_means = &self.co_cluster_means;
        let item_cluster_means = &self.item_cluster_means;

        let next: Vec<usize> = self
            .item_clusters
            .par_iter()
            .enumerate()
            .map(|(i, &current)| {
                let cost_of = |h: usize| {
                    let mut cost = 0.0;
                    for g in 0..n_user_clusters {
                        let cell = item_residuals[[g, i]];
                        if cell.is_nan() {
                            continue;
                        }
                        let diff = cell - co_means[[g, h]] + item_cluster_means[h];
                        cost += diff * diff;
                    }
                    cost
                };
                let mut best = current;
                let mut least = cost_of(current);
                if least.is_nan() {
                    least = f64::INFINITY;
                }
                for h in 0..n_item_clusters {
                    if h == current {
                        continue;
                    }
                    let cost = cost_of(h);
                    if cost < least {
                        best = h;
                        least = cost;
                    }
                }
                best
            })
            .collect();

        let moved = count_moved(&self.item_clusters, &next);
        self.item_clusters = next;
        moved
    }

    pub fn params(&self) -> &CoClusteringParams {
        &self.params
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Mean rating given by each user; constant after fit initialization.
    pub fn user_means(&self) -> &[f64] {
        &self.user_means
    }

    /// Mean rating received by each item; constant after fit initialization.
    pub fn item_means(&self) -> &[f64] {
        &self.item_means
    }

    /// Row-cluster label of each user, in `[0, n_user_clusters)`.
    pub fn user_clusters(&self) -> &[usize] {
        &self.user_clusters
    }

    /// Column-cluster label of each item, in `[0, n_item_clusters)`.
    pub fn item_clusters(&self) -> &[usize] {
        &self.item_clusters
    }

    pub fn user_cluster_means(&self) -> &[f64] {
        &self.user_cluster_means
    }

    pub fn item_cluster_means(&self) -> &[f64] {
        &self.item_cluster_means
    }

    /// Block means, shape `n_user_clusters x n_item_clusters`. Empty blocks
    /// hold NaN.
    pub fn co_cluster_means(&self) -> &Array2<f64> {
        &self.co_cluster_means
    }

    pub(crate) fn user_ids(&self) -> &IdMap {
        &self.users
    }

    pub(crate) fn item_ids(&self) -> &IdMap {
        &self.items
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        params: CoClusteringParams,
        users: IdMap,
        items: IdMap,
        global_mean: f64,
        user_means: Vec<f64>,
        item_means: Vec<f64>,
        user_clusters: Vec<usize>,
        item_clusters: Vec<usize>,
        user_cluster_means: Vec<f64>,
        item_cluster_means: Vec<f64>,
        co_cluster_means: Array2<f64>,
    ) -> Self {
        Self {
            params,
            users,
            items,
            global_mean,
            user_means,
            item_means,
            user_clusters,
            item_clusters,
            user_cluster_means,
            item_cluster_means,
            co_cluster_means,
        }
    }
}

/// Observation-weighted mean rating per cluster; 0/0 leaves NaN for empty
/// clusters.
fn cluster_means(dst: &mut [f64], clusters: &[usize], ratings: &[Vec<(usize, f64)>]) {
    dst.fill(0.0);
    let mut counts = vec![0.0; dst.len()];
    for (entity, &cluster) in clusters.iter().enumerate() {
        for &(_, rating) in &ratings[entity] {
            dst[cluster] += rating;
            counts[cluster] += 1.0;
        }
    }
    for (sum, count) in dst.iter_mut().zip(&counts) {
        *sum /= count;
    }
}

fn count_moved(before: &[usize], after: &[usize]) -> usize {
    before
        .iter()
        .zip(after)
        .filter(|(old, new)| old != new)
        .count()
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
