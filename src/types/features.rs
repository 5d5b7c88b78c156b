//! Derived feature records and the final joined feature table

use super::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Consecutive-pair deltas for one transaction of an account group.
///
/// Only emitted for transactions that have a predecessor in their group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupFeatureRecord {
    /// Index of the source row this record belongs to
    pub index: usize,
    pub time_since_prev: f64,
    pub distance_from_prev_km: f64,
}

/// One row of the feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub transaction: Transaction,
    pub time_since_prev: Option<f64>,
    pub distance_from_prev_km: Option<f64>,
    pub merchant_chargeback_woe: Option<f64>,
    pub is_known_merchant: bool,
}

/// Final joined table: one row per source transaction.
///
/// Built once per pipeline run, persisted, then only read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDataset {
    /// Names of the source feature columns carried in every row
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

/// Engineered columns appended to the source features
pub const ENGINEERED_COLUMNS: [&str; 4] = [
    "time_since_prev",
    "distance_from_prev_km",
    "merchant_chargeback_woe",
    "is_known_merchant",
];

impl FeatureDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a source feature column by header name
    pub fn feature_position(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Model input names: source features followed by the engineered columns
    pub fn model_feature_names(&self) -> Vec<String> {
        self.feature_names
            .iter()
            .cloned()
            .chain(ENGINEERED_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }
}

impl FeatureRow {
    /// Model input vector matching `FeatureDataset::model_feature_names`.
    ///
    /// Nulls become NaN and the known-merchant flag becomes 0/1.
    pub fn model_features(&self) -> Vec<f64> {
        let mut values = self.transaction.features.clone();
        values.push(self.time_since_prev.unwrap_or(f64::NAN));
        values.push(self.distance_from_prev_km.unwrap_or(f64::NAN));
        values.push(self.merchant_chargeback_woe.unwrap_or(f64::NAN));
        values.push(if self.is_known_merchant { 1.0 } else { 0.0 });
        values
    }
}
