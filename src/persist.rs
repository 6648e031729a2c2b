//! Portable binary persistence of fitted models.
//!
//! The layout is stable across platforms: fixed-width little-endian
//! integers, IEEE-754 64-bit doubles and `u64` length prefixes, with fields
//! in the order `K`, `L`, `U`, `I`, global mean, user means, item means,
//! user labels, item labels, user-cluster means, item-cluster means, block
//! means (`K` rows of length `L`), then the two external-id tables in
//! insertion order.

use std::error::Error;
use std::fmt;
use std::io::{Read, Write};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::cocluster::CoClustering;
use crate::ids::IdMap;
use crate::types::CoClusteringParams;

#[derive(Serialize, Deserialize)]
struct ModelRecord {
    n_user_clusters: u64,
    n_item_clusters: u64,
    user_count: u64,
    item_count: u64,
    global_mean: f64,
    user_means: Vec<f64>,
    item_means: Vec<f64>,
    user_clusters: Vec<u64>,
    item_clusters: Vec<u64>,
    user_cluster_means: Vec<f64>,
    item_cluster_means: Vec<f64>,
    co_cluster_means: Vec<Vec<f64>>,
    user_ids: Vec<u64>,
    item_ids: Vec<u64>,
}

/// Errors from model persistence.
#[derive(Debug)]
pub enum PersistError {
    /// Encoding or decoding failed (includes underlying I/O failures).
    Codec(bincode::Error),
    /// The decoded record is internally inconsistent.
    Corrupt(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PersistError::Codec(err) => write!(f, "model codec error: {}", err),
            PersistError::Corrupt(msg) => write!(f, "corrupt model: {}", msg),
        }
    }
}

impl Error for PersistError {}

impl From<bincode::Error> for PersistError {
    fn from(err: bincode::Error) -> Self {
        PersistError::Codec(err)
    }
}

/// Write a fitted model to `writer` in the portable layout.
pub fn write_model<W: Write>(model: &CoClustering, writer: W) -> Result<(), PersistError> {
    bincode::serialize_into(writer, &record_of(model))?;
    Ok(())
}

/// Read a model previously written with [`write_model`].
pub fn read_model<R: Read>(reader: R) -> Result<CoClustering, PersistError> {
    let record: ModelRecord = bincode::deserialize_from(reader)?;
    model_of(record)
}

/// Serialize a fitted model to a byte vector.
pub fn to_bytes(model: &CoClustering) -> Result<Vec<u8>, PersistError> {
    Ok(bincode::serialize(&record_of(model))?)
}

/// Deserialize a model from bytes produced by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<CoClustering, PersistError> {
    let record: ModelRecord = bincode::deserialize(bytes)?;
    model_of(record)
}

fn record_of(model: &CoClustering) -> ModelRecord {
    ModelRecord {
        n_user_clusters: model.user_cluster_means().len() as u64,
        n_item_clusters: model.item_cluster_means().len() as u64,
        user_count: model.user_means().len() as u64,
        item_count: model.item_means().len() as u64,
        global_mean: model.global_mean(),
        user_means: model.user_means().to_vec(),
        item_means: model.item_means().to_vec(),
        user_clusters: model.user_clusters().iter().map(|&g| g as u64).collect(),
        item_clusters: model.item_clusters().iter().map(|&h| h as u64).collect(),
        user_cluster_means: model.user_cluster_means().to_vec(),
        item_cluster_means: model.item_cluster_means().to_vec(),
        co_cluster_means: model
            .co_cluster_means()
            .outer_iter()
            .map(|row| row.to_vec())
            .collect(),
        user_ids: model.user_ids().external_ids().to_vec(),
        item_ids: model.item_ids().external_ids().to_vec(),
    }
}

fn model_of(record: ModelRecord) -> Result<CoClustering, PersistError> {
    let n_user_clusters = record.n_user_clusters as usize;
    let n_item_clusters = record.n_item_clusters as usize;
    let user_count = record.user_count as usize;
    let item_count = record.item_count as usize;

    if n_user_clusters == 0 || n_item_clusters == 0 {
        return Err(PersistError::Corrupt(
            "cluster counts must be positive".to_string(),
        ));
    }
    check_len("user_means", record.user_means.len(), user_count)?;
    check_len("item_means", record.item_means.len(), item_count)?;
    check_len("user_clusters", record.user_clusters.len(), user_count)?;
    check_len("item_clusters", record.item_clusters.len(), item_count)?;
    check_len(
        "user_cluster_means",
        record.user_cluster_means.len(),
        n_user_clusters,
    )?;
    check_len(
        "item_cluster_means",
        record.item_cluster_means.len(),
        n_item_clusters,
    )?;
    check_len("user_ids", record.user_ids.len(), user_count)?;
    check_len("item_ids", record.item_ids.len(), item_count)?;
    check_len(
        "co_cluster_means rows",
        record.co_cluster_means.len(),
        n_user_clusters,
    )?;
    if record.user_clusters.iter().any(|&g| g >= n_user_clusters as u64) {
        return Err(PersistError::Corrupt(
            "user cluster label out of range".to_string(),
        ));
    }
    if record.item_clusters.iter().any(|&h| h >= n_item_clusters as u64) {
        return Err(PersistError::Corrupt(
            "item cluster label out of range".to_string(),
        ));
    }

    let mut co_cluster_means = Array2::zeros((n_user_clusters, n_item_clusters));
    for (g, row) in record.co_cluster_means.iter().enumerate() {
        check_len("co_cluster_means row", row.len(), n_item_clusters)?;
        for (h, &mean) in row.iter().enumerate() {
            co_cluster_means[[g, h]] = mean;
        }
    }

    let users = IdMap::from_ids(record.user_ids);
    let items = IdMap::from_ids(record.item_ids);
    if users.len() != user_count || items.len() != item_count {
        return Err(PersistError::Corrupt(
            "duplicate external ids in id table".to_string(),
        ));
    }

    let params = CoClusteringParams {
        n_user_clusters,
        n_item_clusters,
        ..CoClusteringParams::default()
    };
    Ok(CoClustering::from_parts(
        params,
        users,
        items,
        record.global_mean,
        record.user_means,
        record.item_means,
        record.user_clusters.iter().map(|&g| g as usize).collect(),
        record.item_clusters.iter().map(|&h| h as usize).collect(),
        record.user_cluster_means,
        record.item_cluster_means,
        co_cluster_means,
    ))
}

fn check_len(field: &str, actual: usize, expected: usize) -> Result<(), PersistError> {
    if actual != expected {
        return Err(PersistError::Corrupt(format!(
            "{} holds {} entries, expected {}",
            field, actual, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::TrainSet;
    use crate::types::CoClusteringParams;

    fn fitted_model() -> CoClustering {
        let train = TrainSet::from_ratings(vec![
            (1, 10, 5.0),
            (1, 11, 4.0),
            (2, 10, 1.0),
            (2, 11, 2.0),
            (3, 12, 3.0),
        ]);
        let mut model = CoClustering::new(CoClusteringParams {
            n_epochs: 5,
            n_user_clusters: 2,
            n_item_clusters: 2,
            rand_state: Some(0),
        });
        model.fit(&train).unwrap();
        model
    }

    #[test]
    fn test_round_trip_preserves_predictions_bit_exactly() {
        let model = fitted_model();
        let bytes = to_bytes(&model).unwrap();
        let restored = from_bytes(&bytes).unwrap();

        for user in [1u64, 2, 3, 99] {
            for item in [10u64, 11, 12, 99] {
                assert_eq!(
                    model.predict(user, item).to_bits(),
                    restored.predict(user, item).to_bits()
                );
            }
        }
        assert_eq!(model.user_clusters(), restored.user_clusters());
        assert_eq!(model.item_clusters(), restored.item_clusters());
    }

    #[test]
    fn test_layout_leads_with_little_endian_cluster_counts() {
        let model = fitted_model();
        let bytes = to_bytes(&model).unwrap();
        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &3u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &3u64.to_le_bytes());
    }

    #[test]
    fn test_write_and_read_through_io() {
        let model = fitted_model();
        let mut buffer = Vec::new();
        write_model(&model, &mut buffer).unwrap();
        let restored = read_model(buffer.as_slice()).unwrap();
        assert_eq!(model.global_mean(), restored.global_mean());
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let model = fitted_model();
        let bytes = to_bytes(&model).unwrap();
        assert!(matches!(
            from_bytes(&bytes[..bytes.len() / 2]),
            Err(PersistError::Codec(_))
        ));
    }

    #[test]
    fn test_out_of_range_label_is_rejected() {
        let record = ModelRecord {
            n_user_clusters: 2,
            n_item_clusters: 2,
            user_count: 1,
            item_count: 1,
            global_mean: 3.0,
            user_means: vec![3.0],
            item_means: vec![3.0],
            user_clusters: vec![5],
            item_clusters: vec![0],
            user_cluster_means: vec![3.0, 3.0],
            item_cluster_means: vec![3.0, 3.0],
            co_cluster_means: vec![vec![3.0, 3.0], vec![3.0, 3.0]],
            user_ids: vec![1],
            item_ids: vec![10],
        };
        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(
            from_bytes(&bytes),
            Err(PersistError::Corrupt(_))
        ));
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let record = ModelRecord {
            n_user_clusters: 2,
            n_item_clusters: 2,
            user_count: 2,
            item_count: 1,
            global_mean: 3.0,
            user_means: vec![3.0],
            item_means: vec![3.0],
            user_clusters: vec![0, 1],
            item_clusters: vec![0],
            user_cluster_means: vec![3.0, 3.0],
            item_cluster_means: vec![3.0, 3.0],
            co_cluster_means: vec![vec![3.0, 3.0], vec![3.0, 3.0]],
            user_ids: vec![1, 2],
            item_ids: vec![10],
        };
        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(
            from_bytes(&bytes),
            Err(PersistError::Corrupt(_))
        ));
    }
}
