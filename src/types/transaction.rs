//! Source rows and synthesized credit card transactions

use serde::{Deserialize, Serialize};

/// One row of the source dataset, before any synthetic attributes exist.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Position of the row in the source file (0-based)
    pub index: usize,

    /// Original `Time` value (seconds since the first transaction)
    pub time: f64,

    /// Chargeback label (`Class == 1`)
    pub is_fraud: bool,

    /// Numeric feature columns, aligned with `SourceDataset::feature_names`
    pub features: Vec<f64>,
}

impl SourceRecord {
    /// Create a record with no feature columns
    pub fn new(index: usize, time: f64, is_fraud: bool) -> Self {
        Self {
            index,
            time,
            is_fraud,
            features: Vec::new(),
        }
    }
}

/// The loaded source table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDataset {
    /// Header names of the numeric feature columns, in file order
    pub feature_names: Vec<String>,
    pub records: Vec<SourceRecord>,
}

impl SourceDataset {
    pub fn new(feature_names: Vec<String>, records: Vec<SourceRecord>) -> Self {
        Self {
            feature_names,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fraud_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_fraud).count()
    }

    /// Stable sort putting every fraud row before every non-fraud row.
    ///
    /// Rows keep their relative file order within each class.
    pub fn sort_fraud_first(&mut self) {
        self.records.sort_by_key(|r| !r.is_fraud);
    }
}

/// Attributes produced by the synthetic sequence generator for one source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticAttributes {
    /// Synthetic card number shared by every row of a session
    pub credit_card_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
    pub merchant: String,
}

/// A synthesized transaction: source row plus synthetic attributes.
///
/// Immutable once built; downstream stages only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Index of the originating source row
    pub index: usize,
    pub credit_card_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: f64,
    pub merchant: String,
    pub is_fraud: bool,
    /// Source feature vector, copied unchanged
    pub features: Vec<f64>,
}

impl Transaction {
    /// Merge a source row with the attributes generated for it
    pub fn from_parts(source: &SourceRecord, attributes: SyntheticAttributes) -> Self {
        Self {
            index: source.index,
            credit_card_number: attributes.credit_card_number,
            latitude: attributes.latitude,
            longitude: attributes.longitude,
            timestamp: attributes.timestamp,
            merchant: attributes.merchant,
            is_fraud: source.is_fraud,
            features: source.features.clone(),
        }
    }

    /// Label as the 0/1 integer used in the tabular output
    pub fn class(&self) -> u8 {
        u8::from(self.is_fraud)
    }
}
