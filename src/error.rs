//! Error types for the feature pipeline
//!
//! Configuration and dataset errors are fatal. Group errors are isolated to a
//! single account and surface as an empty feature contribution.

use thiserror::Error;

/// Fatal configuration problems, raised before any data is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sampling list `{0}` is empty")]
    EmptyList(&'static str),

    #[error("max_group_size must be at least 2, got {0}")]
    GroupSizeTooSmall(usize),

    #[error("window_size must be positive and finite, got {0}")]
    InvalidWindowSize(f64),

    #[error("time delta in `{list}` must be positive and finite, got {value}")]
    InvalidTimeDelta { list: &'static str, value: f64 },

    #[error("delta_unit_seconds must be positive and finite, got {0}")]
    InvalidDeltaUnit(f64),

    #[error("no coordinates known for country code `{0}`")]
    UnknownCountry(String),

    #[error("worker pool size must be at least 1")]
    ZeroWorkers,

    #[error("regularization must be positive and finite, got {0}")]
    InvalidRegularization(f64),

    #[error("`{name}` must lie strictly between 0 and 1, got {value}")]
    InvalidFraction { name: &'static str, value: f64 },

    #[error("outlier quantiles must satisfy 0 <= lower < upper <= 1, got [{lower}, {upper}]")]
    InvalidQuantiles { lower: f64, upper: f64 },
}

/// Problems in the tabular input that make the dataset unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("required column `{0}` is missing")]
    MissingColumn(&'static str),

    #[error("row {row}, column `{column}`: cannot parse `{value}` as a number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: label must be 0 or 1, got `{value}`")]
    InvalidLabel { row: usize, value: String },

    #[error("row {row}: expected {expected} fields, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("dataset contains no rows")]
    Empty,
}

/// A data anomaly confined to one account group.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroupError {
    #[error("transaction {index}: timestamp {value} is not finite")]
    InvalidTimestamp { index: usize, value: f64 },

    #[error("transaction {index}: coordinates ({latitude}, {longitude}) are out of range")]
    InvalidCoordinates {
        index: usize,
        latitude: f64,
        longitude: f64,
    },
}

/// Malformed inputs to score evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("`{name}` has {found} entries, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("no scores to build a cut table from")]
    NoScores,

    #[error("threshold {0} is not a row of the cut table")]
    UnknownThreshold(f64),
}
