//! Fan-out of per-account feature extraction over a bounded worker pool.
//!
//! Transactions are grouped by account into an immutable snapshot before any
//! worker starts. Workers only receive a shared borrow of that snapshot, so
//! the grouped data cannot change while extraction runs.

use crate::config::FeaturesConfig;
use crate::error::GroupError;
use crate::feature_extractor::{GroupFeatureExtractor, GroupPoint};
use crate::metrics::PipelineMetrics;
use crate::types::features::GroupFeatureRecord;
use crate::types::transaction::Transaction;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{info, warn};

/// All transactions of one account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountGroup {
    pub account_id: String,
    pub points: Vec<GroupPoint>,
}

/// Transactions grouped by account, frozen before parallel dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountGroups {
    groups: Vec<AccountGroup>,
}

impl AccountGroups {
    /// Group transactions by card number, accounts in order of first appearance
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<AccountGroup> = Vec::new();

        for tx in transactions {
            let position = *positions
                .entry(tx.credit_card_number.as_str())
                .or_insert_with(|| {
                    groups.push(AccountGroup {
                        account_id: tx.credit_card_number.clone(),
                        points: Vec::new(),
                    });
                    groups.len() - 1
                });
            groups[position].points.push(GroupPoint::from(tx));
        }

        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[AccountGroup] {
        &self.groups
    }
}

/// Result of extracting one account group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcome {
    pub account_id: String,
    /// Features on success, or why the group contributed nothing
    pub result: Result<Vec<GroupFeatureRecord>, GroupError>,
}

/// Concatenated group features, keyed by source row index
#[derive(Debug, Clone, Default)]
pub struct GroupFeatureTable {
    records: HashMap<usize, GroupFeatureRecord>,
    failures: Vec<(String, GroupError)>,
}

impl GroupFeatureTable {
    /// Concatenate outcomes; failed groups contribute no records
    pub fn from_outcomes(outcomes: Vec<GroupOutcome>) -> Self {
        let mut table = Self::default();
        for outcome in outcomes {
            match outcome.result {
                Ok(records) => {
                    table
                        .records
                        .extend(records.into_iter().map(|r| (r.index, r)));
                }
                Err(error) => table.failures.push((outcome.account_id, error)),
            }
        }
        table
    }

    pub fn get(&self, index: usize) -> Option<&GroupFeatureRecord> {
        self.records.get(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Accounts whose extraction degraded to an empty result
    pub fn failures(&self) -> &[(String, GroupError)] {
        &self.failures
    }
}

/// Bounded pool of worker threads with optional progress reporting
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    show_progress: bool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            show_progress: false,
        }
    }

    pub fn from_config(config: &FeaturesConfig) -> Self {
        Self::new(config.worker_count()).with_progress(config.show_progress)
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `f` to every item in parallel and wait for all of them.
    ///
    /// Results come back in the order of `items`. If the thread pool cannot
    /// be built the items are processed sequentially.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let progress = self.progress_bar(items.len());

        let run = |item: &T| {
            let result = f(item);
            progress.inc(1);
            result
        };

        let results: Vec<R> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| items.par_iter().map(run).collect()),
            Err(e) => {
                warn!(error = %e, "Failed to build worker pool, falling back to sequential");
                items.iter().map(run).collect()
            }
        };

        progress.finish_and_clear();
        results
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} accounts ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}

/// Extract features for every account group on the worker pool.
///
/// A failing group is logged and contributes nothing; its siblings are
/// unaffected.
pub fn extract_all(
    snapshot: &AccountGroups,
    extractor: &GroupFeatureExtractor,
    pool: &WorkerPool,
    metrics: &PipelineMetrics,
) -> GroupFeatureTable {
    info!(
        accounts = snapshot.len(),
        workers = pool.workers(),
        "Extracting per-account features"
    );

    let outcomes = pool.map(snapshot.groups(), |group| {
        let result = extractor.extract(&group.points);
        match &result {
            Ok(records) => metrics.record_group(records.len(), false),
            Err(e) => {
                warn!(
                    account = %group.account_id,
                    error = %e,
                    "Account group extraction failed, skipping group"
                );
                metrics.record_group(0, true);
            }
        }
        GroupOutcome {
            account_id: group.account_id.clone(),
            result,
        }
    });

    let table = GroupFeatureTable::from_outcomes(outcomes);

    info!(
        feature_rows = table.len(),
        failed_groups = table.failures().len(),
        "Per-account features extracted"
    );

    table
}
