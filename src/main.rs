//! Fraud Feature Pipeline - Main Entry Point
//!
//! Builds the behavioral feature table from a card transaction CSV, persists
//! it, and reports the out-of-time partitions a model would be trained on.

use anyhow::{Context, Result};
use clap::Parser;
use fraud_feature_pipeline::{
    config::{AppConfig, LoggingConfig},
    error::EvaluationError,
    evaluation::ThresholdTable,
    metrics::PipelineMetrics,
    split::Partition,
    FeatureDataset, FeaturePipeline, OutOfTimeSplit,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fraud-features", version, about)]
struct Args {
    /// Configuration file; defaults are used when it does not exist
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,
    /// Source transaction CSV
    #[arg(long)]
    input: Option<PathBuf>,
    /// Feature table CSV to write
    #[arg(long)]
    output: Option<PathBuf>,
    /// Seed for the synthetic sessions
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads for per-account extraction
    #[arg(long)]
    workers: Option<usize>,
    /// Return a previously persisted table instead of rebuilding it
    #[arg(long)]
    reuse_existing: bool,
    /// Write a merchant-WOE cut table of the test partition to this path
    #[arg(long)]
    cut_table: Option<PathBuf>,
    /// Acceptance cut point reported with the cut table
    #[arg(long, requires_all = ["reject_th", "cut_table"])]
    accept_th: Option<f64>,
    /// Rejection cut point reported with the cut table
    #[arg(long, requires_all = ["accept_th", "cut_table"])]
    reject_th: Option<f64>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.data.input_path = input.display().to_string();
        }
        if let Some(output) = &self.output {
            config.data.output_path = output.display().to_string();
            config.data.manifest_path = output.with_extension("json").display().to_string();
        }
        if self.seed.is_some() {
            config.synthesis.seed = self.seed;
        }
        if self.workers.is_some() {
            config.features.workers = self.workers;
        }
        if self.reuse_existing {
            config.data.reuse_existing = true;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let from_file = args.config.exists();
    let mut config = if from_file {
        AppConfig::load_from_path(&args.config)?
    } else {
        AppConfig::default()
    };
    args.apply(&mut config);

    init_tracing(&config.logging)?;
    info!("Starting Fraud Feature Pipeline");
    if !from_file {
        warn!(path = ?args.config, "Configuration file not found, using defaults");
    }
    info!(
        input = %config.data.input_path,
        output = %config.data.output_path,
        max_group_size = config.synthesis.max_group_size,
        window_size = config.woe.window_size,
        "Configuration loaded"
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = FeaturePipeline::with_metrics(config, metrics.clone())?;
    let dataset = pipeline.run()?;

    let split = OutOfTimeSplit::new(&pipeline.config().split)?.split(&dataset);
    split.log_summary();

    if let Some(path) = &args.cut_table {
        let cut_points = args.accept_th.zip(args.reject_th);
        write_cut_table(&dataset, &split.test, path, cut_points)?;
    }

    info!("Pipeline finished");
    metrics.print_summary();

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}

/// Cut table over test rows that have a merchant encoding, scored by it
fn write_cut_table(
    dataset: &FeatureDataset,
    test: &Partition,
    path: &Path,
    cut_points: Option<(f64, f64)>,
) -> Result<()> {
    let table = match ThresholdTable::merchant_woe(dataset, test) {
        Ok(table) => table,
        Err(EvaluationError::NoScores) => {
            warn!("No encoded test rows, skipping cut table");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    table.write_csv(file)?;
    info!(thresholds = table.len(), path = %path.display(), "Cut table written");

    if let Some((accept_th, reject_th)) = cut_points {
        let stats = table.cut_point_selection_stats(accept_th, reject_th)?;
        info!(
            accept_th = stats.accept_th,
            reject_th = stats.reject_th,
            acceptance_rate = stats.acceptance_rate,
            rejection_rate = stats.rejection_rate,
            fraud_in_accepted = stats.fraud_in_accepted,
            fraud_in_rejected = stats.fraud_in_rejected,
            "Cut point selection"
        );
    }
    Ok(())
}
