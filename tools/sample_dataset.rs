//! Sample Dataset Generator
//!
//! Writes a seeded, anonymized card transaction CSV in the layout the
//! pipeline reads (Time, V1..V28, Amount, Class) for local runs and demos.

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::info;

const COMPONENTS: usize = 28;

#[derive(Parser)]
#[command(name = "sample-dataset", about = "Generate a synthetic source transaction CSV")]
struct Args {
    /// Output CSV path
    #[arg(long, default_value = "data/external/creditcard.csv")]
    output: PathBuf,
    /// Number of transactions
    #[arg(long, default_value_t = 5000)]
    rows: usize,
    /// Share of fraudulent transactions
    #[arg(long, default_value_t = 0.01)]
    fraud_rate: f64,
    /// Seconds covered by the Time column
    #[arg(long, default_value_t = 172_800.0)]
    span_seconds: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Draws source rows; fraud shifts the leading components and inflates amounts
struct SourceRowGenerator {
    rng: StdRng,
    fraud_rate: f64,
    span_seconds: f64,
}

impl SourceRowGenerator {
    fn new(args: &Args) -> Self {
        Self {
            rng: StdRng::seed_from_u64(args.seed),
            fraud_rate: args.fraud_rate.clamp(0.0, 1.0),
            span_seconds: args.span_seconds.max(1.0),
        }
    }

    fn times(&mut self, rows: usize) -> Vec<f64> {
        let mut times: Vec<f64> = (0..rows)
            .map(|_| self.rng.gen_range(0.0..self.span_seconds).floor())
            .collect();
        times.sort_by(f64::total_cmp);
        times
    }

    fn row(&mut self, time: f64) -> Vec<String> {
        let is_fraud = self.rng.gen_bool(self.fraud_rate);
        let mut record = Vec::with_capacity(COMPONENTS + 3);
        record.push(time.to_string());

        for component in 0..COMPONENTS {
            let shift = if is_fraud && component < 10 { -2.5 } else { 0.0 };
            let value: f64 = self.rng.gen_range(-2.0..2.0) + shift;
            record.push(format!("{:.6}", value));
        }

        let amount: f64 = if is_fraud {
            self.rng.gen_range(0.5..1500.0)
        } else {
            self.rng.gen_range(0.5..250.0)
        };
        record.push(format!("{:.2}", amount));
        record.push(u8::from(is_fraud).to_string());
        record
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_dataset=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(
        rows = args.rows,
        fraud_rate = args.fraud_rate,
        seed = args.seed,
        output = %args.output.display(),
        "Generating sample dataset"
    );

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {:?}", args.output))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["Time".to_string()];
    header.extend((1..=COMPONENTS).map(|i| format!("V{i}")));
    header.push("Amount".to_string());
    header.push("Class".to_string());
    writer.write_record(&header)?;

    let mut generator = SourceRowGenerator::new(&args);
    let mut fraud = 0;
    for time in generator.times(args.rows) {
        let record = generator.row(time);
        if record.last().map(String::as_str) == Some("1") {
            fraud += 1;
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(rows = args.rows, fraud = fraud, "Sample dataset written");
    Ok(())
}
