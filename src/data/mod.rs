//! Tabular input and the persisted feature table

pub mod loader;
pub mod store;

pub use loader::SourceDatasetLoader;
pub use store::{FeatureStore, RunManifest};
