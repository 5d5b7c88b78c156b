//! Merchant chargeback weight of evidence, refitted at every time bucket.
//!
//! Time is cut into buckets of `window_size`. At the start of each bucket
//! that holds data, a table is fitted from the transactions strictly before
//! that instant. A table fitted at `T` therefore never sees a transaction
//! stamped `T` or later.
//!
//! For a merchant with `p` positives and `n` negatives, out of `P` and `N`
//! overall, with smoothing `r`:
//!
//! ```text
//! woe = ln( ((p + r) / (P + 2r)) / ((n + r) / (N + 2r)) )
//! ```

use crate::config::WoeConfig;
use crate::error::ConfigError;
use crate::types::transaction::Transaction;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// The fields of a transaction the encoder needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WoeObservation<'a> {
    pub timestamp: f64,
    pub merchant: &'a str,
    pub is_fraud: bool,
}

impl<'a> From<&'a Transaction> for WoeObservation<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            timestamp: tx.timestamp,
            merchant: &tx.merchant,
            is_fraud: tx.is_fraud,
        }
    }
}

/// Merchant encoding fitted from history strictly before `fitted_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct WoeTable {
    fitted_at: f64,
    values: BTreeMap<String, f64>,
    unknown_value: Option<f64>,
    positives: usize,
    negatives: usize,
}

impl WoeTable {
    /// Boundary timestamp the table was fitted at
    pub fn fitted_at(&self) -> f64 {
        self.fitted_at
    }

    /// Encoding of a merchant present in the fitted history
    pub fn get(&self, merchant: &str) -> Option<f64> {
        self.values.get(merchant).copied()
    }

    pub fn contains(&self, merchant: &str) -> bool {
        self.values.contains_key(merchant)
    }

    /// Encoding of any merchant, falling back to the unknown value
    pub fn encode(&self, merchant: &str) -> Option<f64> {
        self.get(merchant).or(self.unknown_value)
    }

    /// Number of merchants in the table
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Positive labels in the history the table was fitted on
    pub fn positives(&self) -> usize {
        self.positives
    }

    /// Negative labels in the history the table was fitted on
    pub fn negatives(&self) -> usize {
        self.negatives
    }
}

/// Fitted tables ordered by strictly increasing boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WoeTimeline {
    tables: Vec<WoeTable>,
    skipped: Vec<f64>,
}

impl WoeTimeline {
    fn push(&mut self, table: WoeTable) {
        debug_assert!(self
            .tables
            .last()
            .map_or(true, |last| last.fitted_at < table.fitted_at));
        self.tables.push(table);
    }

    pub fn tables(&self) -> &[WoeTable] {
        &self.tables
    }

    /// Boundaries that had too few positives to fit
    pub fn skipped_boundaries(&self) -> &[f64] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Latest table fitted strictly before `timestamp`
    pub fn latest_before(&self, timestamp: f64) -> Option<&WoeTable> {
        let eligible = self.tables.partition_point(|t| t.fitted_at < timestamp);
        eligible.checked_sub(1).map(|i| &self.tables[i])
    }
}

/// Fits one WOE table per time bucket boundary.
#[derive(Debug, Clone)]
pub struct TemporalWoeEncoder {
    window_size: f64,
    min_positive_count: usize,
    regularization: f64,
    unknown_value: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct LabelCounts {
    positives: usize,
    negatives: usize,
}

impl LabelCounts {
    fn add(&mut self, is_fraud: bool) {
        if is_fraud {
            self.positives += 1;
        } else {
            self.negatives += 1;
        }
    }
}

impl TemporalWoeEncoder {
    pub fn new(config: &WoeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window_size: config.window_size,
            min_positive_count: config.min_positive_count,
            regularization: config.regularization,
            unknown_value: config.unknown_value,
        })
    }

    pub fn window_size(&self) -> f64 {
        self.window_size
    }

    /// Start of the bucket holding `timestamp`
    pub fn bucket_start(&self, timestamp: f64) -> f64 {
        (timestamp / self.window_size).floor() * self.window_size
    }

    /// Distinct bucket starts of the observations, ascending
    pub fn boundaries(&self, observations: &[WoeObservation<'_>]) -> Vec<f64> {
        let mut boundaries: Vec<f64> = observations
            .iter()
            .filter(|o| o.timestamp.is_finite())
            .map(|o| self.bucket_start(o.timestamp))
            .collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup();
        boundaries
    }

    /// Fit the table sequence over the whole history.
    ///
    /// Boundaries are visited in ascending order while the history before
    /// the current boundary accumulates; this stage is inherently sequential.
    pub fn fit(&self, observations: &[WoeObservation<'_>]) -> WoeTimeline {
        let mut ordered: Vec<&WoeObservation<'_>> = observations
            .iter()
            .filter(|o| o.timestamp.is_finite())
            .collect();
        let dropped = observations.len() - ordered.len();
        if dropped > 0 {
            warn!(dropped = dropped, "Ignoring observations with non-finite timestamps");
        }
        ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let mut timeline = WoeTimeline::default();
        let mut per_merchant: BTreeMap<&str, LabelCounts> = BTreeMap::new();
        let mut totals = LabelCounts::default();
        let mut cursor = 0;

        for boundary in self.boundaries(observations) {
            while cursor < ordered.len() && ordered[cursor].timestamp < boundary {
                let obs = ordered[cursor];
                per_merchant.entry(obs.merchant).or_default().add(obs.is_fraud);
                totals.add(obs.is_fraud);
                cursor += 1;
            }

            if totals.positives < self.min_positive_count {
                debug!(
                    boundary = boundary,
                    positives = totals.positives,
                    required = self.min_positive_count,
                    "Skipping WOE boundary, not enough positives"
                );
                timeline.skipped.push(boundary);
                continue;
            }

            let table = self.fit_table(boundary, &per_merchant, totals);
            debug!(
                boundary = boundary,
                merchants = table.len(),
                positives = totals.positives,
                negatives = totals.negatives,
                "Fitted WOE table"
            );
            timeline.push(table);
        }

        info!(
            tables = timeline.len(),
            skipped = timeline.skipped.len(),
            window_size = self.window_size,
            "Temporal WOE encoding fitted"
        );

        timeline
    }

    fn fit_table(
        &self,
        boundary: f64,
        per_merchant: &BTreeMap<&str, LabelCounts>,
        totals: LabelCounts,
    ) -> WoeTable {
        let r = self.regularization;
        let positive_denominator = totals.positives as f64 + 2.0 * r;
        let negative_denominator = totals.negatives as f64 + 2.0 * r;

        let values = per_merchant
            .iter()
            .map(|(merchant, counts)| {
                let positive_share = (counts.positives as f64 + r) / positive_denominator;
                let negative_share = (counts.negatives as f64 + r) / negative_denominator;
                (merchant.to_string(), (positive_share / negative_share).ln())
            })
            .collect();

        WoeTable {
            fitted_at: boundary,
            values,
            unknown_value: self.unknown_value,
            positives: totals.positives,
            negatives: totals.negatives,
        }
    }
}
