//! Persistence of the feature table and its run manifest

use crate::data::loader::parse_label;
use crate::error::DatasetError;
use crate::types::features::{FeatureDataset, FeatureRow};
use crate::types::transaction::Transaction;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Writer};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

const LEADING_COLUMNS: [&str; 6] = [
    "source_index",
    "credit_card_number",
    "latitude",
    "longitude",
    "timestamp",
    "merchant",
];

const TRAILING_COLUMNS: [&str; 5] = [
    "Class",
    "time_since_prev",
    "distance_from_prev_km",
    "merchant_chargeback_woe",
    "is_known_merchant",
];

/// Summary of one pipeline run, written next to the feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    pub fraud_rows: usize,
    pub accounts: usize,
    pub failed_groups: usize,
    pub seed: Option<u64>,
    pub max_group_size: usize,
    pub window_size: f64,
    pub min_positive_count: usize,
    pub woe_tables: usize,
    pub skipped_boundaries: usize,
    pub feature_columns: Vec<String>,
}

/// Reads and writes the feature table as CSV
pub struct FeatureStore;

impl FeatureStore {
    /// Write the feature table to a CSV file, creating parent directories
    pub fn save<P: AsRef<Path>>(dataset: &FeatureDataset, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create feature table: {:?}", path))?;

        Self::write(dataset, file)?;
        info!(rows = dataset.len(), path = %path.display(), "Feature table persisted");
        Ok(())
    }

    /// Write the feature table as CSV to any writer
    pub fn write<W: Write>(dataset: &FeatureDataset, writer: W) -> Result<()> {
        let mut writer = Writer::from_writer(writer);

        let header: Vec<&str> = LEADING_COLUMNS
            .iter()
            .copied()
            .chain(dataset.feature_names.iter().map(String::as_str))
            .chain(TRAILING_COLUMNS.iter().copied())
            .collect();
        writer.write_record(&header)?;

        for row in &dataset.rows {
            let tx = &row.transaction;
            let mut record: Vec<String> = Vec::with_capacity(header.len());
            record.push(tx.index.to_string());
            record.push(tx.credit_card_number.clone());
            record.push(tx.latitude.to_string());
            record.push(tx.longitude.to_string());
            record.push(tx.timestamp.to_string());
            record.push(tx.merchant.clone());
            record.extend(tx.features.iter().map(f64::to_string));
            record.push(tx.class().to_string());
            record.push(optional(row.time_since_prev));
            record.push(optional(row.distance_from_prev_km));
            record.push(optional(row.merchant_chargeback_woe));
            record.push(row.is_known_merchant.to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load a persisted feature table
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FeatureDataset> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open feature table: {:?}", path.as_ref()))?;
        Self::from_reader(file)
            .with_context(|| format!("Failed to read feature table: {:?}", path.as_ref()))
    }

    /// Parse a feature table from any CSV reader
    pub fn from_reader<R: Read>(reader: R) -> Result<FeatureDataset> {
        let mut reader = ReaderBuilder::new().from_reader(reader);
        let headers = reader.headers().context("Failed to read CSV header")?.clone();

        let width = headers.len();
        if width < LEADING_COLUMNS.len() + TRAILING_COLUMNS.len() {
            return Err(DatasetError::MissingColumn("is_known_merchant").into());
        }
        for (i, name) in LEADING_COLUMNS.iter().enumerate() {
            if &headers[i] != *name {
                return Err(DatasetError::MissingColumn(*name).into());
            }
        }
        let trailing_start = width - TRAILING_COLUMNS.len();
        for (i, name) in TRAILING_COLUMNS.iter().enumerate() {
            if &headers[trailing_start + i] != *name {
                return Err(DatasetError::MissingColumn(*name).into());
            }
        }

        let feature_names: Vec<String> = (LEADING_COLUMNS.len()..trailing_start)
            .map(|i| headers[i].to_string())
            .collect();

        let mut rows = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("Failed to read CSV row {row}"))?;
            let cell = |i: usize| Cell {
                record: &record,
                headers: &headers,
                row,
                column: i,
            };

            let index = cell(0).index()?;
            let features = (LEADING_COLUMNS.len()..trailing_start)
                .map(|i| cell(i).number())
                .collect::<Result<Vec<f64>, DatasetError>>()?;

            rows.push(FeatureRow {
                transaction: Transaction {
                    index,
                    credit_card_number: record[1].to_string(),
                    latitude: cell(2).number()?,
                    longitude: cell(3).number()?,
                    timestamp: cell(4).number()?,
                    merchant: record[5].to_string(),
                    is_fraud: parse_label(&record[trailing_start], row)?,
                    features,
                },
                time_since_prev: cell(trailing_start + 1).optional()?,
                distance_from_prev_km: cell(trailing_start + 2).optional()?,
                merchant_chargeback_woe: cell(trailing_start + 3).optional()?,
                is_known_merchant: cell(trailing_start + 4).flag()?,
            });
        }

        Ok(FeatureDataset {
            feature_names,
            rows,
        })
    }

    /// Write the run manifest as pretty JSON
    pub fn save_manifest<P: AsRef<Path>>(manifest: &RunManifest, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create manifest: {:?}", path))?;
        serde_json::to_writer_pretty(file, manifest)?;
        Ok(())
    }

    pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<RunManifest> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open manifest: {:?}", path.as_ref()))?;
        let manifest = serde_json::from_reader(file)?;
        Ok(manifest)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

struct Cell<'a> {
    record: &'a StringRecord,
    headers: &'a StringRecord,
    row: usize,
    column: usize,
}

impl Cell<'_> {
    fn invalid(&self) -> DatasetError {
        DatasetError::InvalidNumber {
            row: self.row,
            column: self.headers[self.column].to_string(),
            value: self.record[self.column].to_string(),
        }
    }

    fn number(&self) -> Result<f64, DatasetError> {
        self.record[self.column]
            .parse::<f64>()
            .map_err(|_| self.invalid())
    }

    /// Source row index: a non-negative integer, nothing else
    fn index(&self) -> Result<usize, DatasetError> {
        self.record[self.column]
            .parse::<usize>()
            .map_err(|_| self.invalid())
    }

    fn optional(&self) -> Result<Option<f64>, DatasetError> {
        if self.record[self.column].is_empty() {
            Ok(None)
        } else {
            self.number().map(Some)
        }
    }

    fn flag(&self) -> Result<bool, DatasetError> {
        match &self.record[self.column] {
            "true" | "1" | "1.0" => Ok(true),
            "false" | "0" | "0.0" => Ok(false),
            _ => Err(self.invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dataset() -> FeatureDataset {
        let row = |index: usize, woe: Option<f64>, known: bool| FeatureRow {
            transaction: Transaction {
                index,
                credit_card_number: "4556737586899855".to_string(),
                latitude: 40.7128,
                longitude: -74.006,
                timestamp: 406.0 + index as f64 * 60.0,
                merchant: "m_grocery".to_string(),
                is_fraud: index == 0,
                features: vec![-1.359807, 149.62],
            },
            time_since_prev: (index > 0).then_some(60.0),
            distance_from_prev_km: (index > 0).then_some(0.0),
            merchant_chargeback_woe: woe,
            is_known_merchant: known,
        };

        FeatureDataset {
            feature_names: vec!["V1".to_string(), "Amount".to_string()],
            rows: vec![row(0, None, false), row(1, Some(-0.4321), true)],
        }
    }

    #[test]
    fn test_header_layout() {
        let mut buffer = Vec::new();
        FeatureStore::write(&dataset(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let header = text.lines().next().unwrap();

        assert_eq!(
            header,
            "source_index,credit_card_number,latitude,longitude,timestamp,merchant,V1,Amount,\
             Class,time_since_prev,distance_from_prev_km,merchant_chargeback_woe,is_known_merchant"
        );
        // Nulls are empty cells
        assert!(text.lines().nth(1).unwrap().ends_with(",1,,,,false"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processed").join("features.csv");

        FeatureStore::save(&dataset(), &path).unwrap();
        let loaded = FeatureStore::load(&path).unwrap();

        assert_eq!(loaded, dataset());
    }

    #[test]
    fn test_rejects_foreign_table() {
        let err = FeatureStore::from_reader("Time,V1,Class\n0,1,0\n".as_bytes()).unwrap_err();
        assert!(err.downcast_ref::<DatasetError>().is_some());
    }

    #[test]
    fn test_rejects_corrupt_source_index() {
        let mut buffer = Vec::new();
        FeatureStore::write(&dataset(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        for corrupt in ["-1", "1.5", "NaN"] {
            let tampered = text.replacen("\n0,", &format!("\n{corrupt},"), 1);
            let err = FeatureStore::from_reader(tampered.as_bytes()).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<DatasetError>(),
                    Some(DatasetError::InvalidNumber { row: 0, .. })
                ),
                "accepted source_index {corrupt}"
            );
        }
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = RunManifest {
            generated_at: Utc::now(),
            rows: 10,
            fraud_rows: 2,
            accounts: 3,
            failed_groups: 0,
            seed: Some(42),
            max_group_size: 7,
            window_size: 3600.0,
            min_positive_count: 10,
            woe_tables: 1,
            skipped_boundaries: 4,
            feature_columns: vec!["V1".to_string()],
        };

        FeatureStore::save_manifest(&manifest, &path).unwrap();
        assert_eq!(FeatureStore::load_manifest(&path).unwrap(), manifest);
    }
}
