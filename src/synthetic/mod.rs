//! Synthetic account, location, time and merchant attributes

pub mod card;
pub mod gazetteer;
pub mod generator;

pub use generator::SyntheticSequenceGenerator;
