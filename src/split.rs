//! Out-of-time train/validation/test split of the feature table.
//!
//! The latest `test_size` share of time goes to test. Negative-class
//! outliers are removed from the earlier rows, which are then shuffled into
//! train and validation.

use crate::config::SplitConfig;
use crate::error::ConfigError;
use crate::types::features::FeatureDataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// Rows of one partition, as model inputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Positions in `FeatureDataset::rows`
    pub rows: Vec<usize>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
    pub weights: Vec<f64>,
}

impl Partition {
    fn from_rows(dataset: &FeatureDataset, rows: Vec<usize>, weight_column: Option<usize>) -> Self {
        let mut partition = Self {
            features: Vec::with_capacity(rows.len()),
            labels: Vec::with_capacity(rows.len()),
            weights: Vec::with_capacity(rows.len()),
            rows: Vec::new(),
        };
        for &i in &rows {
            let row = &dataset.rows[i];
            partition.features.push(row.model_features());
            partition.labels.push(row.transaction.is_fraud);
            partition
                .weights
                .push(weight_column.map_or(1.0, |c| row.transaction.features[c]));
        }
        partition.rows = rows;
        partition
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }
}

/// The three partitions plus the column names of their feature vectors
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub feature_names: Vec<String>,
    pub train: Partition,
    pub val: Partition,
    pub test: Partition,
    /// Negative training rows dropped as outliers
    pub outliers_removed: usize,
}

impl DatasetSplit {
    /// Log size and class balance of every partition
    pub fn log_summary(&self) {
        for (name, partition) in [("train", &self.train), ("val", &self.val), ("test", &self.test)] {
            info!(
                partition = name,
                size = partition.len(),
                pos_class = partition.positives(),
                neg_class = partition.negatives(),
                "Dataset partition"
            );
        }
    }
}

/// Splits a feature table by time
#[derive(Debug, Clone)]
pub struct OutOfTimeSplit {
    test_size: f64,
    val_size: f64,
    seed: u64,
    lower_quantile: f64,
    upper_quantile: f64,
}

impl OutOfTimeSplit {
    pub fn new(config: &SplitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            test_size: config.test_size,
            val_size: config.val_size,
            seed: config.seed,
            lower_quantile: config.outlier_lower_quantile,
            upper_quantile: config.outlier_upper_quantile,
        })
    }

    pub fn split(&self, dataset: &FeatureDataset) -> DatasetSplit {
        let weight_column = dataset.feature_position("Amount");

        let timestamps: Vec<f64> = dataset.rows.iter().map(|r| r.transaction.timestamp).collect();
        let cutoff = quantile(&timestamps, 1.0 - self.test_size);
        let (test_rows, earlier): (Vec<usize>, Vec<usize>) = (0..dataset.len())
            .partition(|&i| cutoff.is_some_and(|c| timestamps[i] > c));

        let kept = self.drop_negative_outliers(dataset, earlier.clone());
        let outliers_removed = earlier.len() - kept.len();

        let mut shuffled = kept;
        shuffled.shuffle(&mut StdRng::seed_from_u64(self.seed));
        let val_len = ((self.val_size * shuffled.len() as f64).ceil() as usize).min(shuffled.len());
        let train_rows = shuffled.split_off(val_len);
        let val_rows = shuffled;

        let split = DatasetSplit {
            feature_names: dataset.model_feature_names(),
            train: Partition::from_rows(dataset, train_rows, weight_column),
            val: Partition::from_rows(dataset, val_rows, weight_column),
            test: Partition::from_rows(dataset, test_rows, weight_column),
            outliers_removed,
        };
        info!(
            cutoff = cutoff.unwrap_or(f64::NAN),
            outliers_removed = outliers_removed,
            "Out-of-time split done"
        );
        split
    }

    /// Keep positives and every negative whose features all sit inside the
    /// per-column quantile range of `rows`
    fn drop_negative_outliers(&self, dataset: &FeatureDataset, rows: Vec<usize>) -> Vec<usize> {
        let matrix: Vec<Vec<f64>> = rows.iter().map(|&i| dataset.rows[i].model_features()).collect();
        let width = matrix.first().map_or(0, Vec::len);

        let ranges: Vec<Option<(f64, f64)>> = (0..width)
            .map(|column| {
                let values: Vec<f64> = matrix.iter().map(|r| r[column]).collect();
                Some((
                    quantile(&values, self.lower_quantile)?,
                    quantile(&values, self.upper_quantile)?,
                ))
            })
            .collect();

        rows.into_iter()
            .zip(&matrix)
            .filter(|(i, values)| {
                dataset.rows[*i].transaction.is_fraud
                    || values.iter().zip(&ranges).all(|(v, range)| match range {
                        Some((lo, hi)) => v.is_nan() || (lo <= v && v <= hi),
                        None => true,
                    })
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Linear-interpolated quantile over the non-NaN values
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}
