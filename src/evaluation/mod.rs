//! Score evaluation

pub mod threshold_table;

pub use threshold_table::{CutPointStats, ThresholdRow, ThresholdTable};
