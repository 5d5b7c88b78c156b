//! Fraud Feature Pipeline Library
//!
//! Turns an anonymized card transaction dataset into account sequences with
//! behavioral features: synthetic card sessions, per-account time and
//! distance deltas computed in parallel, and a merchant chargeback encoding
//! that is refitted over time and joined without reading the future.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod feature_extractor;
pub mod geo;
pub mod metrics;
pub mod parallel;
pub mod pipeline;
pub mod split;
pub mod synthetic;
pub mod types;
pub mod woe;

pub use config::AppConfig;
pub use data::{FeatureStore, SourceDatasetLoader};
pub use feature_extractor::GroupFeatureExtractor;
pub use pipeline::{FeaturePipeline, PipelineOutput};
pub use split::OutOfTimeSplit;
pub use synthetic::SyntheticSequenceGenerator;
pub use types::{FeatureDataset, Transaction};
pub use woe::{LeakSafeFeatureJoiner, TemporalWoeEncoder};
