use fraud_feature_pipeline::config::AppConfig;
use fraud_feature_pipeline::data::{FeatureStore, SourceDatasetLoader};
use fraud_feature_pipeline::types::{FeatureRow, SourceDataset};
use fraud_feature_pipeline::FeaturePipeline;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use tempfile::tempdir;

fn source_csv(rows: usize) -> String {
    let mut csv = String::from("Time,V1,Amount,Class\n");
    for i in 0..rows {
        let class = u8::from(i % 7 == 0 || i % 11 == 0);
        writeln!(csv, "{},{:.3},{:.2},{}", i * 45, (i as f64).sin(), 5.0 + i as f64, class).unwrap();
    }
    csv
}

fn source(rows: usize) -> SourceDataset {
    SourceDatasetLoader::from_reader(source_csv(rows).as_bytes()).unwrap()
}

fn config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.synthesis.seed = Some(seed);
    config.features.workers = Some(3);
    config.features.show_progress = false;
    config.woe.window_size = 900.0;
    config.woe.min_positive_count = 3;
    config
}

fn by_account(rows: &[FeatureRow]) -> HashMap<&str, Vec<&FeatureRow>> {
    let mut accounts: HashMap<&str, Vec<&FeatureRow>> = HashMap::new();
    for row in rows {
        accounts
            .entry(row.transaction.credit_card_number.as_str())
            .or_default()
            .push(row);
    }
    for group in accounts.values_mut() {
        group.sort_by(|a, b| {
            a.transaction
                .timestamp
                .total_cmp(&b.transaction.timestamp)
                .then(a.transaction.index.cmp(&b.transaction.index))
        });
    }
    accounts
}

#[test]
fn test_same_seed_same_table() {
    let first = FeaturePipeline::new(config(7)).unwrap().build(source(300)).unwrap();
    let second = FeaturePipeline::new(config(7)).unwrap().build(source(300)).unwrap();

    assert_eq!(first.dataset, second.dataset);
    assert_eq!(first.timeline, second.timeline);

    let other = FeaturePipeline::new(config(8)).unwrap().build(source(300)).unwrap();
    assert_ne!(first.dataset, other.dataset);
}

#[test]
fn test_deltas_stay_inside_accounts() {
    let output = FeaturePipeline::new(config(3)).unwrap().build(source(400)).unwrap();

    for group in by_account(&output.dataset.rows).values() {
        assert!(group[0].time_since_prev.is_none());
        assert!(group[0].distance_from_prev_km.is_none());

        for pair in group.windows(2) {
            let (prev, cur) = (&pair[0].transaction, &pair[1].transaction);
            let dt = pair[1].time_since_prev.unwrap();
            assert!((dt - (cur.timestamp - prev.timestamp)).abs() < 1e-9);
            assert!(dt >= 0.0);
            assert!(pair[1].distance_from_prev_km.unwrap() >= 0.0);
        }
    }
}

#[test]
fn test_sessions_keep_source_labels_together() {
    let output = FeaturePipeline::new(config(11)).unwrap().build(source(400)).unwrap();

    // Fraud rows are placed first, so no account mixes fraud and non-fraud
    // except where a session straddles the end of the fraud block
    let mixed = by_account(&output.dataset.rows)
        .values()
        .filter(|g| {
            let fraud = g.iter().filter(|r| r.transaction.is_fraud).count();
            fraud != 0 && fraud != g.len()
        })
        .count();
    assert!(mixed <= 1);
}

#[test]
fn test_joined_woe_matches_latest_earlier_table() {
    let output = FeaturePipeline::new(config(5)).unwrap().build(source(500)).unwrap();
    assert!(!output.timeline.is_empty());

    for row in &output.dataset.rows {
        let tx = &row.transaction;
        let table = output.timeline.latest_before(tx.timestamp);

        assert_eq!(
            row.merchant_chargeback_woe,
            table.and_then(|t| t.encode(&tx.merchant))
        );
        assert_eq!(
            row.is_known_merchant,
            table.map_or(false, |t| t.contains(&tx.merchant))
        );
        if let Some(table) = table {
            assert!(table.fitted_at() < tx.timestamp);
        }
    }
}

#[test]
fn test_earliest_transactions_have_no_encoding() {
    let output = FeaturePipeline::new(config(9)).unwrap().build(source(200)).unwrap();

    let at_zero: Vec<&FeatureRow> = output
        .dataset
        .rows
        .iter()
        .filter(|r| r.transaction.timestamp == 0.0)
        .collect();
    assert!(!at_zero.is_empty());
    for row in at_zero {
        assert_eq!(row.merchant_chargeback_woe, None);
        assert!(!row.is_known_merchant);
    }
}

#[test]
fn test_run_persists_and_reuses() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("external").join("creditcard.csv");
    fs::create_dir_all(input.parent().unwrap()).unwrap();
    fs::write(&input, source_csv(150)).unwrap();

    let mut config = config(21);
    config.data.input_path = input.display().to_string();
    config.data.output_path = dir.path().join("processed/features.csv").display().to_string();
    config.data.manifest_path = dir.path().join("processed/features.json").display().to_string();

    let built = FeaturePipeline::new(config.clone()).unwrap().run().unwrap();
    assert_eq!(built.len(), 150);

    let loaded = FeatureStore::load(&config.data.output_path).unwrap();
    assert_eq!(loaded, built);

    let manifest = FeatureStore::load_manifest(&config.data.manifest_path).unwrap();
    assert_eq!(manifest.rows, 150);
    assert_eq!(manifest.seed, Some(21));
    assert_eq!(manifest.feature_columns.len(), 2 + 4);

    // With reuse on, the source is no longer needed
    fs::remove_file(&input).unwrap();
    config.data.reuse_existing = true;
    let reused = FeaturePipeline::new(config.clone()).unwrap().run().unwrap();
    assert_eq!(reused, built);

    config.data.reuse_existing = false;
    assert!(FeaturePipeline::new(config).unwrap().run().is_err());
}
