//! Source dataset loading
//!
//! Reads the credit card CSV: a time column, a binary `Class` label and any
//! number of numeric feature columns, kept in file order.

use crate::error::DatasetError;
use crate::types::transaction::{SourceDataset, SourceRecord};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Accepted names for the time column, in order of preference
const TIME_COLUMNS: [&str; 2] = ["Time", "timestamp"];
const LABEL_COLUMN: &str = "Class";

/// Loader for the source CSV
pub struct SourceDatasetLoader;

impl SourceDatasetLoader {
    /// Load the source dataset from a CSV file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SourceDataset> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open source dataset: {:?}", path.as_ref()))?;

        let dataset = Self::from_reader(file)
            .with_context(|| format!("Failed to read source dataset: {:?}", path.as_ref()))?;

        info!(
            rows = dataset.len(),
            fraud_rows = dataset.fraud_count(),
            features = dataset.feature_names.len(),
            "Source dataset loaded"
        );

        Ok(dataset)
    }

    /// Parse the source dataset from any CSV reader
    pub fn from_reader<R: Read>(reader: R) -> Result<SourceDataset> {
        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers().context("Failed to read CSV header")?.clone();

        let time_column = TIME_COLUMNS
            .iter()
            .find_map(|name| headers.iter().position(|h| h == *name))
            .ok_or(DatasetError::MissingColumn("Time"))?;
        let label_column = headers
            .iter()
            .position(|h| h == LABEL_COLUMN)
            .ok_or(DatasetError::MissingColumn(LABEL_COLUMN))?;

        let feature_columns: Vec<usize> = (0..headers.len())
            .filter(|&i| i != time_column && i != label_column)
            .collect();
        let feature_names = feature_columns
            .iter()
            .map(|&i| headers[i].to_string())
            .collect();

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("Failed to read CSV row {row}"))?;
            if record.len() != headers.len() {
                return Err(DatasetError::RaggedRow {
                    row,
                    expected: headers.len(),
                    found: record.len(),
                }
                .into());
            }

            let time = parse_number(&record, &headers, row, time_column)?;
            let is_fraud = parse_label(&record[label_column], row)?;
            let features = feature_columns
                .iter()
                .map(|&i| parse_number(&record, &headers, row, i))
                .collect::<Result<Vec<f64>, DatasetError>>()?;

            records.push(SourceRecord {
                index: row,
                time,
                is_fraud,
                features,
            });
        }

        if records.is_empty() {
            return Err(DatasetError::Empty.into());
        }

        Ok(SourceDataset::new(feature_names, records))
    }
}

fn parse_number(
    record: &StringRecord,
    headers: &StringRecord,
    row: usize,
    column: usize,
) -> Result<f64, DatasetError> {
    let value = &record[column];
    value.parse::<f64>().map_err(|_| DatasetError::InvalidNumber {
        row,
        column: headers[column].to_string(),
        value: value.to_string(),
    })
}

pub(crate) fn parse_label(value: &str, row: usize) -> Result<bool, DatasetError> {
    match value.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(false),
        Ok(v) if v == 1.0 => Ok(true),
        _ => Err(DatasetError::InvalidLabel {
            row,
            value: value.to_string(),
        }),
    }
}
