//! Type definitions for the feature pipeline

pub mod features;
pub mod transaction;

pub use features::{FeatureDataset, FeatureRow, GroupFeatureRecord};
pub use transaction::{SourceDataset, SourceRecord, SyntheticAttributes, Transaction};
