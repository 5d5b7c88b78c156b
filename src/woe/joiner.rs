//! As-of join of merchant encodings onto transactions.
//!
//! A transaction at `T` reads the table with the greatest boundary strictly
//! below `T`. Since that table only saw history before its boundary, no
//! transaction's encoding depends on any transaction stamped `T` or later.

use crate::metrics::PipelineMetrics;
use crate::woe::encoder::WoeTimeline;

/// Merchant features attached to one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MerchantEncoding {
    /// Null before the first eligible table, or for an unknown merchant
    /// without a configured fallback
    pub merchant_chargeback_woe: Option<f64>,
    /// The merchant appears in the selected table
    pub is_known_merchant: bool,
}

impl MerchantEncoding {
    pub const NONE: Self = Self {
        merchant_chargeback_woe: None,
        is_known_merchant: false,
    };
}

/// Looks up merchant encodings without reading the future.
pub struct LeakSafeFeatureJoiner<'a> {
    timeline: &'a WoeTimeline,
}

impl<'a> LeakSafeFeatureJoiner<'a> {
    pub fn new(timeline: &'a WoeTimeline) -> Self {
        Self { timeline }
    }

    /// Encoding for a merchant seen at `timestamp`
    pub fn lookup(&self, timestamp: f64, merchant: &str) -> MerchantEncoding {
        match self.timeline.latest_before(timestamp) {
            Some(table) => MerchantEncoding {
                merchant_chargeback_woe: table.encode(merchant),
                is_known_merchant: table.contains(merchant),
            },
            None => MerchantEncoding::NONE,
        }
    }

    /// Encode a batch of (timestamp, merchant) pairs, recording join statistics
    pub fn join<'m, I>(&self, items: I, metrics: &PipelineMetrics) -> Vec<MerchantEncoding>
    where
        I: IntoIterator<Item = (f64, &'m str)>,
    {
        items
            .into_iter()
            .map(|(timestamp, merchant)| {
                let had_table = self.timeline.latest_before(timestamp).is_some();
                let encoding = self.lookup(timestamp, merchant);
                metrics.record_join(had_table, encoding.is_known_merchant);
                encoding
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WoeConfig;
    use crate::woe::encoder::{TemporalWoeEncoder, WoeObservation};
    use std::sync::atomic::Ordering;

    fn timeline() -> WoeTimeline {
        let encoder = TemporalWoeEncoder::new(&WoeConfig {
            window_size: 100.0,
            min_positive_count: 1,
            ..WoeConfig::default()
        })
        .unwrap();

        let data = [
            (10.0, "a", true),
            (20.0, "b", false),
            (120.0, "a", false),
            (130.0, "c", true),
            (250.0, "a", false),
        ];
        let observations: Vec<WoeObservation> = data
            .iter()
            .map(|&(timestamp, merchant, is_fraud)| WoeObservation {
                timestamp,
                merchant,
                is_fraud,
            })
            .collect();
        encoder.fit(&observations)
    }

    #[test]
    fn test_no_table_yet_is_null() {
        let timeline = timeline();
        let joiner = LeakSafeFeatureJoiner::new(&timeline);

        assert_eq!(joiner.lookup(0.0, "a"), MerchantEncoding::NONE);
        assert_eq!(joiner.lookup(100.0, "a"), MerchantEncoding::NONE);
    }

    #[test]
    fn test_uses_latest_table_strictly_before() {
        let timeline = timeline();
        let joiner = LeakSafeFeatureJoiner::new(&timeline);
        let at_100 = &timeline.tables()[0];
        let at_200 = &timeline.tables()[1];

        let encoding = joiner.lookup(150.0, "a");
        assert_eq!(encoding.merchant_chargeback_woe, at_100.get("a"));
        assert!(encoding.is_known_merchant);

        // Exactly on a boundary still reads the previous table
        assert_eq!(joiner.lookup(200.0, "a").merchant_chargeback_woe, at_100.get("a"));
        assert_eq!(joiner.lookup(200.5, "a").merchant_chargeback_woe, at_200.get("a"));
    }

    #[test]
    fn test_unknown_merchant() {
        let timeline = timeline();
        let joiner = LeakSafeFeatureJoiner::new(&timeline);

        // "c" first appears at 130, so the table at 100 does not know it
        let encoding = joiner.lookup(150.0, "c");
        assert_eq!(encoding.merchant_chargeback_woe, None);
        assert!(!encoding.is_known_merchant);
        assert!(joiner.lookup(250.0, "c").is_known_merchant);
    }

    #[test]
    fn test_join_records_metrics() {
        let timeline = timeline();
        let joiner = LeakSafeFeatureJoiner::new(&timeline);
        let metrics = PipelineMetrics::new();

        let encodings = joiner.join(
            vec![(5.0, "a"), (150.0, "a"), (150.0, "zzz")],
            &metrics,
        );

        assert_eq!(encodings.len(), 3);
        assert_eq!(metrics.null_woe.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.unknown_merchants.load(Ordering::Relaxed), 1);
    }
}
