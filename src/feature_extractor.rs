//! Per-account behavioral features.
//!
//! For one account's transactions, ordered by time, every transaction after
//! the first gets the gap and the distance to the one before it.

use crate::error::GroupError;
use crate::geo;
use crate::types::features::GroupFeatureRecord;
use crate::types::transaction::Transaction;

/// The fields of a transaction the extractor needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupPoint {
    pub index: usize,
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&Transaction> for GroupPoint {
    fn from(tx: &Transaction) -> Self {
        Self {
            index: tx.index,
            timestamp: tx.timestamp,
            latitude: tx.latitude,
            longitude: tx.longitude,
        }
    }
}

/// Computes consecutive-pair deltas inside one account group.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupFeatureExtractor;

impl GroupFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features for one account.
    ///
    /// Points may arrive in any order; they are sorted by timestamp (ties
    /// broken by source index) before pairing. The first point has no
    /// predecessor and produces no record. Any malformed point fails the
    /// whole group.
    pub fn extract(&self, points: &[GroupPoint]) -> Result<Vec<GroupFeatureRecord>, GroupError> {
        for point in points {
            if !point.timestamp.is_finite() {
                return Err(GroupError::InvalidTimestamp {
                    index: point.index,
                    value: point.timestamp,
                });
            }
            if !geo::is_valid_coordinate(point.latitude, point.longitude) {
                return Err(GroupError::InvalidCoordinates {
                    index: point.index,
                    latitude: point.latitude,
                    longitude: point.longitude,
                });
            }
        }

        let mut ordered = points.to_vec();
        ordered.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then_with(|| a.index.cmp(&b.index))
        });

        let records = ordered
            .windows(2)
            .map(|pair| {
                let (prev, current) = (&pair[0], &pair[1]);
                GroupFeatureRecord {
                    index: current.index,
                    time_since_prev: current.timestamp - prev.timestamp,
                    distance_from_prev_km: geo::haversine_km(
                        (prev.latitude, prev.longitude),
                        (current.latitude, current.longitude),
                    ),
                }
            })
            .collect();

        Ok(records)
    }
}
