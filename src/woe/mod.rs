//! Time-indexed merchant weight-of-evidence and its leak-safe join

pub mod encoder;
pub mod joiner;

pub use encoder::{TemporalWoeEncoder, WoeObservation, WoeTable, WoeTimeline};
pub use joiner::{LeakSafeFeatureJoiner, MerchantEncoding};
