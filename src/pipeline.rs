//! End-to-end feature pipeline.
//!
//! source rows -> fraud-first order -> synthetic sessions -> per-account
//! deltas (parallel) -> temporal WOE tables (sequential) -> as-of join ->
//! feature table.

use crate::config::AppConfig;
use crate::data::{FeatureStore, RunManifest, SourceDatasetLoader};
use crate::feature_extractor::GroupFeatureExtractor;
use crate::metrics::PipelineMetrics;
use crate::parallel::{self, AccountGroups, WorkerPool};
use crate::synthetic::SyntheticSequenceGenerator;
use crate::types::features::{FeatureDataset, FeatureRow};
use crate::types::transaction::{SourceDataset, Transaction};
use crate::woe::{LeakSafeFeatureJoiner, TemporalWoeEncoder, WoeObservation, WoeTimeline};
use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Everything a pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: FeatureDataset,
    pub timeline: WoeTimeline,
    pub manifest: RunManifest,
}

/// Builds the feature table from a source dataset
pub struct FeaturePipeline {
    config: AppConfig,
    metrics: Arc<PipelineMetrics>,
}

impl FeaturePipeline {
    /// Create a pipeline; configuration problems are fatal here
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_metrics(config, Arc::new(PipelineMetrics::new()))
    }

    pub fn with_metrics(config: AppConfig, metrics: Arc<PipelineMetrics>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, metrics })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Load the source, build the table and persist it with its manifest.
    ///
    /// With `reuse_existing`, an already persisted table is returned as is.
    pub fn run(&self) -> Result<FeatureDataset> {
        let data = &self.config.data;
        if data.reuse_existing && Path::new(&data.output_path).exists() {
            info!(path = %data.output_path, "Reusing persisted feature table");
            return FeatureStore::load(&data.output_path);
        }

        let source = self.timed("load", || SourceDatasetLoader::load(&data.input_path))?;
        let output = self.build(source)?;

        self.timed("persist", || -> Result<()> {
            FeatureStore::save(&output.dataset, &data.output_path)?;
            FeatureStore::save_manifest(&output.manifest, &data.manifest_path)
        })?;

        Ok(output.dataset)
    }

    /// Build the feature table in memory
    pub fn build(&self, mut source: SourceDataset) -> Result<PipelineOutput> {
        let synthesis = &self.config.synthesis;

        source.sort_fraud_first();
        let transactions = self.timed("synthesize", || -> Result<Vec<Transaction>> {
            let mut generator = SyntheticSequenceGenerator::new(synthesis)?;
            let attributes = generator.generate(&source.records);
            Ok(source
                .records
                .iter()
                .zip(attributes)
                .map(|(record, attrs)| Transaction::from_parts(record, attrs))
                .collect())
        })?;
        self.metrics
            .transactions
            .fetch_add(transactions.len() as u64, Ordering::Relaxed);

        // Frozen before fan-out; workers only get a shared borrow
        let snapshot = AccountGroups::from_transactions(&transactions);
        let group_features = self.timed("extract", || {
            parallel::extract_all(
                &snapshot,
                &GroupFeatureExtractor::new(),
                &WorkerPool::from_config(&self.config.features),
                &self.metrics,
            )
        });

        let encoder = TemporalWoeEncoder::new(&self.config.woe)?;
        let timeline = self.timed("woe_fit", || {
            let observations: Vec<WoeObservation> =
                transactions.iter().map(WoeObservation::from).collect();
            encoder.fit(&observations)
        });
        for _ in timeline.tables() {
            self.metrics.record_woe_boundary(true);
        }
        for _ in timeline.skipped_boundaries() {
            self.metrics.record_woe_boundary(false);
        }

        let encodings = self.timed("woe_join", || {
            LeakSafeFeatureJoiner::new(&timeline).join(
                transactions
                    .iter()
                    .map(|tx| (tx.timestamp, tx.merchant.as_str())),
                &self.metrics,
            )
        });

        let rows: Vec<FeatureRow> = transactions
            .into_iter()
            .zip(encodings)
            .map(|(transaction, encoding)| {
                let deltas = group_features.get(transaction.index);
                FeatureRow {
                    time_since_prev: deltas.map(|d| d.time_since_prev),
                    distance_from_prev_km: deltas.map(|d| d.distance_from_prev_km),
                    merchant_chargeback_woe: encoding.merchant_chargeback_woe,
                    is_known_merchant: encoding.is_known_merchant,
                    transaction,
                }
            })
            .collect();

        let dataset = FeatureDataset {
            feature_names: source.feature_names.clone(),
            rows,
        };

        let manifest = RunManifest {
            generated_at: Utc::now(),
            rows: dataset.len(),
            fraud_rows: source.fraud_count(),
            accounts: snapshot.len(),
            failed_groups: group_features.failures().len(),
            seed: synthesis.seed,
            max_group_size: synthesis.max_group_size,
            window_size: encoder.window_size(),
            min_positive_count: self.config.woe.min_positive_count,
            woe_tables: timeline.len(),
            skipped_boundaries: timeline.skipped_boundaries().len(),
            feature_columns: dataset.model_feature_names(),
        };

        info!(
            rows = manifest.rows,
            accounts = manifest.accounts,
            woe_tables = manifest.woe_tables,
            "Feature table built"
        );

        Ok(PipelineOutput {
            dataset,
            timeline,
            manifest,
        })
    }

    fn timed<T>(&self, stage: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.metrics.record_stage(stage, start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::SourceRecord;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.synthesis.seed = Some(17);
        config.features.workers = Some(2);
        config.features.show_progress = false;
        config.woe.window_size = 500.0;
        config.woe.min_positive_count = 2;
        config
    }

    fn source(rows: usize) -> SourceDataset {
        let records = (0..rows)
            .map(|i| SourceRecord {
                index: i,
                time: (i * 37) as f64,
                is_fraud: i % 9 == 0,
                features: vec![i as f64, (i % 5) as f64],
            })
            .collect();
        SourceDataset::new(vec!["V1".to_string(), "Amount".to_string()], records)
    }

    #[test]
    fn test_one_row_per_source_row() {
        let pipeline = FeaturePipeline::new(config()).unwrap();
        let output = pipeline.build(source(120)).unwrap();

        assert_eq!(output.dataset.len(), 120);
        let mut indices: Vec<usize> = output.dataset.rows.iter().map(|r| r.transaction.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..120).collect::<Vec<_>>());
        assert_eq!(output.manifest.fraud_rows, 14);
        assert_eq!(output.manifest.window_size, 500.0);
        assert_eq!(output.manifest.woe_tables, output.timeline.len());
    }

    #[test]
    fn test_first_row_of_each_account_has_no_deltas() {
        let pipeline = FeaturePipeline::new(config()).unwrap();
        let output = pipeline.build(source(200)).unwrap();

        let mut seen = std::collections::HashSet::new();
        let mut by_time = output.dataset.rows.clone();
        by_time.sort_by(|a, b| {
            a.transaction
                .timestamp
                .total_cmp(&b.transaction.timestamp)
                .then(a.transaction.index.cmp(&b.transaction.index))
        });
        for row in &by_time {
            let first = seen.insert(row.transaction.credit_card_number.clone());
            assert_eq!(row.time_since_prev.is_none(), first);
            assert_eq!(row.distance_from_prev_km.is_none(), first);
        }
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut bad = config();
        bad.woe.window_size = -1.0;
        assert!(FeaturePipeline::new(bad).is_err());
    }

    #[test]
    fn test_stage_times_recorded() {
        let pipeline = FeaturePipeline::new(config()).unwrap();
        pipeline.build(source(30)).unwrap();

        let stages = pipeline.metrics().get_stage_times();
        for stage in ["synthesize", "extract", "woe_fit", "woe_join"] {
            assert!(stages.contains_key(stage), "missing stage {stage}");
        }
    }
}
