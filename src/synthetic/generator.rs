//! Synthetic account sessions for the credit card dataset.
//!
//! The source data has no card, place or merchant columns. The generator
//! walks the rows (fraud rows first) and cuts them into sessions of random
//! length. Every row of a session shares one synthetic card number, and
//! timestamps inside a session advance by label-dependent gaps: fraud
//! bursts are minutes apart, legitimate use is spread out.

use crate::config::SynthesisConfig;
use crate::error::ConfigError;
use crate::synthetic::card::CardNumberIssuer;
use crate::synthetic::gazetteer;
use crate::types::transaction::{SourceRecord, SyntheticAttributes};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

type Places = &'static [(f64, f64)];

/// Sampling lists for one label
struct ProfileLists {
    /// Gazetteer places for each configured location entry (weights kept)
    locations: Vec<Places>,
    merchants: Vec<String>,
    time_deltas: Vec<f64>,
}

impl ProfileLists {
    fn resolve(
        locations: &[String],
        merchants: &[String],
        time_deltas: &[f64],
    ) -> Result<Self, ConfigError> {
        let locations = locations
            .iter()
            .map(|code| gazetteer::places(code).ok_or_else(|| ConfigError::UnknownCountry(code.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            locations,
            merchants: merchants.to_vec(),
            time_deltas: time_deltas.to_vec(),
        })
    }
}

/// Current session while walking the rows
struct Session {
    credit_card_number: String,
    length: usize,
    emitted: usize,
    last_timestamp: f64,
}

/// Produces one row of synthetic attributes per source row.
pub struct SyntheticSequenceGenerator<R: Rng = StdRng> {
    rng: R,
    max_group_size: usize,
    delta_unit_seconds: f64,
    fraud: ProfileLists,
    safe: ProfileLists,
    issuer: CardNumberIssuer,
    sessions_started: usize,
}

impl SyntheticSequenceGenerator<StdRng> {
    /// Create a generator seeded from the configuration.
    ///
    /// Without a seed the generator draws from OS entropy and the output is
    /// not reproducible.
    pub fn new(config: &SynthesisConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => {
                warn!("No synthesis seed configured, output will not be reproducible");
                StdRng::from_entropy()
            }
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> SyntheticSequenceGenerator<R> {
    /// Create a generator drawing from the given random source
    pub fn with_rng(config: &SynthesisConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            rng,
            max_group_size: config.max_group_size,
            delta_unit_seconds: config.delta_unit_seconds,
            fraud: ProfileLists::resolve(
                &config.fraud_locations,
                &config.fraud_merchants,
                &config.fraud_time_deltas_min,
            )?,
            safe: ProfileLists::resolve(
                &config.safe_locations,
                &config.safe_merchants,
                &config.safe_time_deltas_min,
            )?,
            issuer: CardNumberIssuer::new(),
            sessions_started: 0,
        })
    }

    /// Number of sessions (synthetic accounts) started so far
    pub fn sessions_started(&self) -> usize {
        self.sessions_started
    }

    /// Generate attributes for `records`, which must be ordered fraud first.
    ///
    /// The output is aligned with the input: element `i` belongs to
    /// `records[i]`.
    pub fn generate(&mut self, records: &[SourceRecord]) -> Vec<SyntheticAttributes> {
        let mut output = Vec::with_capacity(records.len());
        let mut session: Option<Session> = None;

        for record in records {
            let exhausted = session.as_ref().map_or(true, |s| s.emitted >= s.length);
            if exhausted {
                session = Some(self.start_session(record.time));
            }

            let Some(current) = session.as_mut() else {
                continue;
            };

            let profile = if record.is_fraud { &self.fraud } else { &self.safe };
            let delta_min = *random_choice(&mut self.rng, &profile.time_deltas);
            let places = *random_choice(&mut self.rng, &profile.locations);
            let merchant = random_choice(&mut self.rng, &profile.merchants).clone();
            let (latitude, longitude) = *random_choice(&mut self.rng, places);

            let timestamp = if current.emitted == 0 {
                record.time
            } else {
                current.last_timestamp + delta_min * self.delta_unit_seconds
            };

            current.last_timestamp = timestamp;
            current.emitted += 1;

            output.push(SyntheticAttributes {
                credit_card_number: current.credit_card_number.clone(),
                latitude,
                longitude,
                timestamp,
                merchant,
            });
        }

        info!(
            rows = output.len(),
            sessions = self.sessions_started,
            "Synthetic sequences generated"
        );

        output
    }

    fn start_session(&mut self, first_timestamp: f64) -> Session {
        // Session length is uniform over [2, max_group_size] for every session
        let length = self.rng.gen_range(2..=self.max_group_size);
        let credit_card_number = self.issuer.issue(&mut self.rng);
        self.sessions_started += 1;

        debug!(
            credit_card_number = %credit_card_number,
            length = length,
            "Starting synthetic session"
        );

        Session {
            credit_card_number,
            length,
            emitted: 0,
            last_timestamp: first_timestamp,
        }
    }
}

/// Uniform choice from a list validated to be non-empty
fn random_choice<'a, T, R: Rng + ?Sized>(rng: &mut R, choices: &'a [T]) -> &'a T {
    &choices[rng.gen_range(0..choices.len())]
}
