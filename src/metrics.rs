//! Accuracy metrics for fitted estimators.

use crate::cocluster::CoClustering;

/// Root mean squared error over held-out `(user, item, rating)` triples.
/// NaN for an empty slice.
pub fn rmse(model: &CoClustering, ratings: &[(u64, u64, f64)]) -> f64 {
    let sum: f64 = ratings
        .iter()
        .map(|&(user, item, rating)| {
            let err = model.predict(user, item) - rating;
            err * err
        })
        .sum();
    (sum / ratings.len() as f64).sqrt()
}

/// Mean absolute error over held-out triples. NaN for an empty slice.
pub fn mae(model: &CoClustering, ratings: &[(u64, u64, f64)]) -> f64 {
    let sum: f64 = ratings
        .iter()
        .map(|&(user, item, rating)| (model.predict(user, item) - rating).abs())
        .sum();
    sum / ratings.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::TrainSet;
    use crate::types::CoClusteringParams;

    fn constant_model() -> CoClustering {
        let ratings: Vec<(u64, u64, f64)> = (0..3)
            .flat_map(|u| (0..3).map(move |i| (u, i, 3.0)))
            .collect();
        let train = TrainSet::from_ratings(ratings);
        let mut model = CoClustering::new(CoClusteringParams {
            n_epochs: 2,
            rand_state: Some(0),
            ..CoClusteringParams::default()
        });
        model.fit(&train).unwrap();
        model
    }

    #[test]
    fn test_exact_predictions_score_zero() {
        let model = constant_model();
        let held_out = vec![(0, 0, 3.0), (1, 2, 3.0)];
        assert_eq!(rmse(&model, &held_out), 0.0);
        assert_eq!(mae(&model, &held_out), 0.0);
    }

    #[test]
    fn test_constant_offset() {
        let model = constant_model();
        let held_out = vec![(0, 0, 4.0), (1, 2, 2.0)];
        assert!((rmse(&model, &held_out) - 1.0).abs() < 1e-12);
        assert!((mae(&model, &held_out) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_is_nan() {
        let model = constant_model();
        assert!(rmse(&model, &[]).is_nan());
        assert!(mae(&model, &[]).is_nan());
    }
}
