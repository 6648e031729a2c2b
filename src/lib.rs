//! Co-clustering collaborative filtering.
//!
//! Fits a block decomposition of a sparse user-item rating matrix: users are
//! partitioned into `K` row clusters and items into `L` column clusters by
//! alternating assignment sweeps that minimize the squared within-block
//! residual, and ratings are predicted from row, column and block means.
//! Unknown users or items fall back to the matching row, column or global
//! mean, so predictions are total once a model is fitted.
//!
//! ```
//! use cocluster_rec::{CoClustering, CoClusteringParams, TrainSet};
//!
//! let train = TrainSet::from_ratings(vec![
//!     (1, 10, 5.0),
//!     (1, 11, 4.0),
//!     (2, 10, 1.0),
//!     (2, 11, 2.0),
//! ]);
//!
//! let mut model = CoClustering::new(CoClusteringParams {
//!     rand_state: Some(0),
//!     ..CoClusteringParams::default()
//! });
//! model.fit(&train).unwrap();
//!
//! assert!(model.predict(1, 10).is_finite());
//! // Unseen user and item: falls back to the global mean.
//! assert_eq!(model.predict(99, 99), train.global_mean());
//! ```

pub mod cocluster;
pub mod ids;
pub mod metrics;
pub mod persist;
pub mod train;
pub mod types;
pub mod util;

pub use cocluster::CoClustering;
pub use ids::IdMap;
pub use persist::PersistError;
pub use train::TrainSet;
pub use types::{CoClusteringParams, FitError};
