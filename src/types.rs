//! Estimator parameters and fit-time errors.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration of the co-clustering estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoClusteringParams {
    /// Number of alternating-assignment sweeps over users and items.
    pub n_epochs: usize,
    /// Number of user (row) clusters.
    pub n_user_clusters: usize,
    /// Number of item (column) clusters.
    pub n_item_clusters: usize,
    /// Seed for the initial random cluster assignment. `None` derives a
    /// seed from the wall clock, so only explicit seeds are reproducible.
    pub rand_state: Option<u64>,
}

impl Default for CoClusteringParams {
    fn default() -> Self {
        Self {
            n_epochs: 20,
            n_user_clusters: 3,
            n_item_clusters: 3,
            rand_state: None,
        }
    }
}

impl CoClusteringParams {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.n_user_clusters < 1 {
            return Err(FitError::InvalidParameter(
                "n_user_clusters must be at least 1".to_string(),
            ));
        }
        if self.n_item_clusters < 1 {
            return Err(FitError::InvalidParameter(
                "n_item_clusters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors surfaced while fitting the estimator.
#[derive(Debug)]
pub enum FitError {
    /// The training set holds zero observations.
    EmptyTrainSet,
    /// A parameter failed validation.
    InvalidParameter(String),
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FitError::EmptyTrainSet => write!(f, "training set holds no observations"),
            FitError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
        }
    }
}

impl Error for FitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = CoClusteringParams::default();
        assert_eq!(params.n_epochs, 20);
        assert_eq!(params.n_user_clusters, 3);
        assert_eq!(params.n_item_clusters, 3);
        assert!(params.rand_state.is_none());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cluster_counts() {
        let params = CoClusteringParams {
            n_user_clusters: 0,
            ..CoClusteringParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(FitError::InvalidParameter(_))
        ));

        let params = CoClusteringParams {
            n_item_clusters: 0,
            ..CoClusteringParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(FitError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_error_display() {
        let err = FitError::InvalidParameter("n_user_clusters must be at least 1".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("n_user_clusters"));
        assert!(format!("{}", FitError::EmptyTrainSet).contains("no observations"));
    }
}
