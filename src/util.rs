//! Numeric helpers shared by the estimator.

use ndarray::Array2;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;

/// Draw `n` labels uniformly from `[0, upper)`.
///
/// The output is fully determined by the rng state, so a seeded rng makes
/// the draw reproducible across platforms.
pub fn uniform_labels<R: Rng>(rng: &mut R, n: usize, upper: usize) -> Vec<usize> {
    let between = Uniform::new(0, upper);
    (0..n).map(|_| rng.sample(between)).collect()
}

/// Dense matrix pre-filled with NaN, the "unobserved" sentinel.
pub fn nan_matrix(rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_elem((rows, cols), f64::NAN)
}

/// Per-row arithmetic mean of a sparse adjacency view.
///
/// A row with no observations yields NaN (0/0); rows interned from a rating
/// stream always carry at least one observation.
pub fn ratings_means(ratings: &[Vec<(usize, f64)>]) -> Vec<f64> {
    ratings
        .iter()
        .map(|row| {
            let sum: f64 = row.iter().map(|&(_, rating)| rating).sum();
            sum / row.len() as f64
        })
        .collect()
}
