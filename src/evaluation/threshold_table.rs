//! Score cut table: account-level outcomes for every candidate threshold.
//!
//! A row is accepted when its score is at or below the threshold. Counts are
//! distinct accounts, not rows.

use crate::error::EvaluationError;
use crate::split::Partition;
use crate::types::features::FeatureDataset;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;
use std::io::Write;

/// Outcome of one candidate threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdRow {
    pub min_score: f64,
    pub acceptance_rate: f64,
    pub nb_accepted: usize,
    pub nb_rejected: usize,
    pub accepted_nb_fraud: usize,
    pub rejected_nb_fraud: usize,
    pub accepted_nb_no_fraud: usize,
    pub rejected_nb_no_fraud: usize,
    pub accepted_fraud_percent: f64,
    pub rejected_fraud_percent: f64,
    /// Fraud share of accepted weight; absent without weights or accepted weight
    pub weight_fraud_ratio: Option<f64>,
}

/// Summary of a chosen pair of cut points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutPointStats {
    pub accept_th: f64,
    pub reject_th: f64,
    pub rejection_rate: f64,
    pub acceptance_rate: f64,
    pub fraud_in_rejected: f64,
    pub fraud_in_accepted: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    rows: Vec<ThresholdRow>,
}

impl ThresholdTable {
    /// Build the cut table from per-row labels, scores and account ids
    pub fn compute<A: Eq + Hash>(
        labels: &[bool],
        scores: &[f64],
        accounts: &[A],
        weights: Option<&[f64]>,
    ) -> Result<Self, EvaluationError> {
        let expected = labels.len();
        check_len("scores", expected, scores.len())?;
        check_len("accounts", expected, accounts.len())?;
        if let Some(weights) = weights {
            check_len("weights", expected, weights.len())?;
        }

        let mut candidates: Vec<f64> = scores
            .iter()
            .filter(|s| s.is_finite())
            .map(|&s| round_to(s, 3))
            .collect();
        if candidates.is_empty() {
            return Err(EvaluationError::NoScores);
        }
        candidates.sort_by(f64::total_cmp);
        candidates.dedup();

        let nb_accounts = distinct(accounts, |_| true);

        let rows = candidates
            .into_iter()
            .map(|threshold| {
                let accepted = |i: usize| scores[i] <= threshold;
                let rejected = |i: usize| scores[i] > threshold;

                let nb_accepted = distinct(accounts, accepted);
                let nb_rejected = distinct(accounts, rejected);
                let accepted_nb_fraud = distinct(accounts, |i| labels[i] && accepted(i));
                let rejected_nb_fraud = distinct(accounts, |i| labels[i] && rejected(i));

                let weight_fraud_ratio = weights.and_then(|w| {
                    let (mut total, mut fraud) = (0.0, 0.0);
                    for i in (0..expected).filter(|&i| accepted(i)) {
                        total += w[i];
                        if labels[i] {
                            fraud += w[i];
                        }
                    }
                    (total != 0.0).then(|| fraud / total)
                });

                ThresholdRow {
                    min_score: threshold,
                    acceptance_rate: nb_accepted as f64 / nb_accounts as f64,
                    nb_accepted,
                    nb_rejected,
                    accepted_nb_fraud,
                    rejected_nb_fraud,
                    accepted_nb_no_fraud: distinct(accounts, |i| !labels[i] && accepted(i)),
                    rejected_nb_no_fraud: distinct(accounts, |i| !labels[i] && rejected(i)),
                    accepted_fraud_percent: ratio(accepted_nb_fraud, nb_accepted),
                    rejected_fraud_percent: ratio(rejected_nb_fraud, nb_rejected),
                    weight_fraud_ratio,
                }
            })
            .collect();

        Ok(Self { rows })
    }

    /// Cut table of one partition scored by its merchant chargeback WOE.
    ///
    /// Rows without an encoding are left out. Partition weights are used.
    pub fn merchant_woe(
        dataset: &FeatureDataset,
        partition: &Partition,
    ) -> Result<Self, EvaluationError> {
        let (mut labels, mut scores, mut accounts, mut weights) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new());

        for (position, &i) in partition.rows.iter().enumerate() {
            let row = &dataset.rows[i];
            if let Some(woe) = row.merchant_chargeback_woe {
                labels.push(row.transaction.is_fraud);
                scores.push(woe);
                accounts.push(row.transaction.credit_card_number.as_str());
                weights.push(partition.weights[position]);
            }
        }

        Self::compute(&labels, &scores, &accounts, Some(&weights[..]))
    }

    pub fn rows(&self) -> &[ThresholdRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row whose threshold is `threshold` rounded to 3 decimals
    pub fn row_at(&self, threshold: f64) -> Option<&ThresholdRow> {
        let key = round_to(threshold, 3);
        self.rows
            .iter()
            .find(|r| (r.min_score - key).abs() < 1e-9)
    }

    /// Rates at the reject threshold, rounded to 2 decimals
    pub fn cut_point_selection_stats(
        &self,
        accept_th: f64,
        reject_th: f64,
    ) -> Result<CutPointStats, EvaluationError> {
        let row = self
            .row_at(reject_th)
            .ok_or(EvaluationError::UnknownThreshold(reject_th))?;

        Ok(CutPointStats {
            accept_th: round_to(accept_th, 2),
            reject_th: round_to(reject_th, 2),
            rejection_rate: round_to(1.0 - row.acceptance_rate, 2),
            acceptance_rate: round_to(row.acceptance_rate, 2),
            fraud_in_rejected: round_to(row.rejected_fraud_percent, 2),
            fraud_in_accepted: round_to(row.accepted_fraud_percent, 2),
        })
    }

    /// Write the table as CSV, one row per threshold
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn check_len(name: &'static str, expected: usize, found: usize) -> Result<(), EvaluationError> {
    if expected == found {
        Ok(())
    } else {
        Err(EvaluationError::LengthMismatch {
            name,
            expected,
            found,
        })
    }
}

fn distinct<A: Eq + Hash>(accounts: &[A], keep: impl Fn(usize) -> bool) -> usize {
    accounts
        .iter()
        .enumerate()
        .filter(|(i, _)| keep(*i))
        .map(|(_, a)| a)
        .collect::<HashSet<&A>>()
        .len()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    // Accounts: a (fraud, score .9), b (legit, .1 and .2), c (legit, .5)
    fn table(weights: Option<&[f64]>) -> ThresholdTable {
        let labels = [true, false, false, false];
        let scores = [0.9, 0.1, 0.2, 0.5];
        let accounts = ["a", "b", "b", "c"];
        ThresholdTable::compute(&labels, &scores, &accounts, weights).unwrap()
    }

    #[test]
    fn test_candidates_sorted_and_distinct() {
        let thresholds: Vec<f64> = table(None).rows().iter().map(|r| r.min_score).collect();
        assert_eq!(thresholds, vec![0.1, 0.2, 0.5, 0.9]);

        let rounded = ThresholdTable::compute(&[false, false], &[0.12341, 0.12349], &[1, 2], None).unwrap();
        assert_eq!(rounded.len(), 1);
    }

    #[test]
    fn test_counts_distinct_accounts() {
        let table = table(None);

        let at_02 = table.row_at(0.2).unwrap();
        assert_eq!(at_02.nb_accepted, 1);
        assert_eq!(at_02.nb_rejected, 2);
        assert!((at_02.acceptance_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(at_02.rejected_nb_fraud, 1);
        assert_eq!(at_02.rejected_nb_no_fraud, 1);
        assert!((at_02.rejected_fraud_percent - 0.5).abs() < 1e-12);
        assert_eq!(at_02.accepted_fraud_percent, 0.0);

        // Account b has rows on both sides of 0.1
        let at_01 = table.row_at(0.1).unwrap();
        assert_eq!((at_01.nb_accepted, at_01.nb_rejected), (1, 3));
    }

    #[test]
    fn test_empty_side_has_zero_percent() {
        let last = table(None).row_at(0.9).cloned().unwrap();
        assert_eq!(last.nb_rejected, 0);
        assert_eq!(last.rejected_fraud_percent, 0.0);
        assert!((last.acceptance_rate - 1.0).abs() < 1e-12);
        assert_eq!(last.weight_fraud_ratio, None);
    }

    #[test]
    fn test_weighted_fraud_ratio() {
        let weights = [30.0, 10.0, 20.0, 40.0];
        let table = table(Some(&weights[..]));

        let last = table.row_at(0.9).unwrap();
        assert!((last.weight_fraud_ratio.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(table.row_at(0.5).unwrap().weight_fraud_ratio, Some(0.0));
    }

    #[test]
    fn test_cut_point_selection_stats() {
        let stats = table(None).cut_point_selection_stats(0.104, 0.2).unwrap();

        assert_eq!(stats.accept_th, 0.1);
        assert_eq!(stats.reject_th, 0.2);
        assert_eq!(stats.acceptance_rate, 0.33);
        assert_eq!(stats.rejection_rate, 0.67);
        assert_eq!(stats.fraud_in_rejected, 0.5);
        assert_eq!(stats.fraud_in_accepted, 0.0);

        assert!(matches!(
            table(None).cut_point_selection_stats(0.1, 0.3),
            Err(EvaluationError::UnknownThreshold(_))
        ));
    }

    #[test]
    fn test_merchant_woe_over_partition() {
        use crate::types::features::FeatureRow;
        use crate::types::transaction::Transaction;

        let row = |index: usize, card: &str, woe: Option<f64>, is_fraud: bool| FeatureRow {
            transaction: Transaction {
                index,
                credit_card_number: card.to_string(),
                latitude: 0.0,
                longitude: 0.0,
                timestamp: index as f64,
                merchant: "m".to_string(),
                is_fraud,
                features: vec![],
            },
            time_since_prev: None,
            distance_from_prev_km: None,
            merchant_chargeback_woe: woe,
            is_known_merchant: woe.is_some(),
        };
        let dataset = FeatureDataset {
            feature_names: vec![],
            rows: vec![
                row(0, "a", Some(1.2), true),
                row(1, "b", Some(-0.4), false),
                row(2, "c", None, true),
                row(3, "d", Some(0.3), false),
            ],
        };
        let partition = Partition {
            rows: vec![0, 1, 2],
            features: vec![vec![]; 3],
            labels: vec![true, false, true],
            weights: vec![50.0, 150.0, 10.0],
        };

        let table = ThresholdTable::merchant_woe(&dataset, &partition).unwrap();
        let thresholds: Vec<f64> = table.rows().iter().map(|r| r.min_score).collect();
        assert_eq!(thresholds, vec![-0.4, 1.2]);

        let last = table.row_at(1.2).unwrap();
        assert_eq!(last.nb_accepted, 2);
        assert!((last.weight_fraud_ratio.unwrap() - 0.25).abs() < 1e-12);

        let stats = table.cut_point_selection_stats(-0.4, -0.4).unwrap();
        assert_eq!(stats.acceptance_rate, 0.5);
        assert_eq!(stats.fraud_in_rejected, 1.0);

        let unencoded = Partition {
            rows: vec![2],
            weights: vec![1.0],
            ..Partition::default()
        };
        assert_eq!(
            ThresholdTable::merchant_woe(&dataset, &unencoded),
            Err(EvaluationError::NoScores)
        );
    }

    #[test]
    fn test_length_mismatch() {
        let result = ThresholdTable::compute(&[true], &[0.1, 0.2], &["a"], None);
        assert!(matches!(result, Err(EvaluationError::LengthMismatch { name: "scores", .. })));
    }

    #[test]
    fn test_write_csv() {
        let mut buffer = Vec::new();
        table(None).write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("min_score,acceptance_rate,nb_accepted"));
        assert_eq!(text.lines().count(), 5);
    }
}
