//! Run statistics for the feature pipeline.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters shared by reference across the pipeline stages and workers
pub struct PipelineMetrics {
    /// Source rows synthesized into transactions
    pub transactions: AtomicU64,
    /// Account groups that produced features
    pub groups_processed: AtomicU64,
    /// Account groups that degraded to an empty result
    pub groups_failed: AtomicU64,
    /// Group feature records emitted
    pub feature_rows: AtomicU64,
    /// WOE tables fitted
    pub woe_tables_fitted: AtomicU64,
    /// WOE boundaries skipped for lack of positives
    pub woe_boundaries_skipped: AtomicU64,
    /// Transactions joined before the first eligible table
    pub null_woe: AtomicU64,
    /// Transactions whose merchant was absent from the selected table
    pub unknown_merchants: AtomicU64,
    /// Wall-clock time per stage (in milliseconds)
    stage_times: RwLock<BTreeMap<String, u64>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions: AtomicU64::new(0),
            groups_processed: AtomicU64::new(0),
            groups_failed: AtomicU64::new(0),
            feature_rows: AtomicU64::new(0),
            woe_tables_fitted: AtomicU64::new(0),
            woe_boundaries_skipped: AtomicU64::new(0),
            null_woe: AtomicU64::new(0),
            unknown_merchants: AtomicU64::new(0),
            stage_times: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of one account group
    pub fn record_group(&self, feature_rows: usize, failed: bool) {
        if failed {
            self.groups_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.groups_processed.fetch_add(1, Ordering::Relaxed);
            self.feature_rows
                .fetch_add(feature_rows as u64, Ordering::Relaxed);
        }
    }

    /// Record one WOE boundary decision
    pub fn record_woe_boundary(&self, fitted: bool) {
        if fitted {
            self.woe_tables_fitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.woe_boundaries_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one joined transaction
    pub fn record_join(&self, had_table: bool, known_merchant: bool) {
        if !had_table {
            self.null_woe.fetch_add(1, Ordering::Relaxed);
        } else if !known_merchant {
            self.unknown_merchants.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record how long a stage took
    pub fn record_stage(&self, stage: &str, duration: Duration) {
        if let Ok(mut times) = self.stage_times.write() {
            *times.entry(stage.to_string()).or_insert(0) += duration.as_millis() as u64;
        }
    }

    /// Stage timings recorded so far
    pub fn get_stage_times(&self) -> BTreeMap<String, u64> {
        self.stage_times
            .read()
            .map(|times| times.clone())
            .unwrap_or_default()
    }

    /// Fraction of account groups that failed extraction
    pub fn group_failure_rate(&self) -> f64 {
        let failed = self.groups_failed.load(Ordering::Relaxed);
        let total = failed + self.groups_processed.load(Ordering::Relaxed);
        if total > 0 {
            failed as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD FEATURE PIPELINE - RUN SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions: {:>10}  │  Elapsed: {:>8.1} s              ║",
            load(&self.transactions),
            elapsed
        );
        info!(
            "║ Account groups: {:>8} ok  │  {:>6} failed ({:>5.1}%)       ║",
            load(&self.groups_processed),
            load(&self.groups_failed),
            self.group_failure_rate() * 100.0
        );
        info!(
            "║ Feature rows:   {:>8}                                     ║",
            load(&self.feature_rows)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ WOE tables: {:>6} fitted  │  {:>6} boundaries skipped       ║",
            load(&self.woe_tables_fitted),
            load(&self.woe_boundaries_skipped)
        );
        info!(
            "║ Null WOE: {:>8}  │  Unknown merchants: {:>8}             ║",
            load(&self.null_woe),
            load(&self.unknown_merchants)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Stage Times (ms):                                            ║");
        for (stage, ms) in self.get_stage_times() {
            info!("║   {:20}: {:>10}                              ║", stage, ms);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
