//! Configuration management for the feature pipeline

use crate::error::ConfigError;
use crate::synthetic::gazetteer;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub synthesis: SynthesisConfig,
    pub features: FeaturesConfig,
    pub woe: WoeConfig,
    pub split: SplitConfig,
    pub logging: LoggingConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Source CSV with `Time`, `Class` and numeric feature columns
    pub input_path: String,
    /// Persisted feature table
    pub output_path: String,
    /// Run manifest written next to the feature table
    pub manifest_path: String,
    /// Load the persisted feature table instead of recomputing when it exists
    pub reuse_existing: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input_path: "data/external/creditcard.csv".to_string(),
            output_path: "data/processed/cc_transaction_features.csv".to_string(),
            manifest_path: "data/processed/cc_transaction_features.json".to_string(),
            reuse_existing: false,
        }
    }
}

/// Synthetic sequence generation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Upper bound (inclusive) of a session length
    pub max_group_size: usize,
    /// Seed for the generator; unseeded runs are not reproducible
    pub seed: Option<u64>,
    /// Seconds per unit of the configured time deltas
    pub delta_unit_seconds: f64,
    /// Country codes for fraud rows (repeat entries to bias sampling)
    pub fraud_locations: Vec<String>,
    /// Country codes for non-fraud rows
    pub safe_locations: Vec<String>,
    /// Merchants for fraud rows (repeat entries to bias sampling)
    pub fraud_merchants: Vec<String>,
    /// Merchants for non-fraud rows
    pub safe_merchants: Vec<String>,
    /// Gaps between consecutive fraud transactions, in minutes
    pub fraud_time_deltas_min: Vec<f64>,
    /// Gaps between consecutive non-fraud transactions, in minutes
    pub safe_time_deltas_min: Vec<f64>,
}

fn repeated(entries: &[&str], times: usize) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| std::iter::repeat(e.to_string()).take(times))
        .collect()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        let mut fraud_locations: Vec<String> = [
            "AR", "DZ", "AT", "AM", "AU", "AZ", "BD", "BE", "BR", "CL", "CO", "CU", "EG",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        // Most fraud still happens at home
        fraud_locations.extend(repeated(&["MX", "US", "CA"], 10));

        let mut fraud_merchants = repeated(&["m_gift_cards", "m_crypto_exchange"], 3);
        fraud_merchants.extend(repeated(&["m_online_electronics", "m_wire_transfer"], 2));
        fraud_merchants.extend(repeated(&["m_luxury_goods", "m_prepaid_topup"], 1));

        Self {
            max_group_size: 7,
            seed: None,
            delta_unit_seconds: 60.0,
            fraud_locations,
            safe_locations: vec!["MX".to_string(), "US".to_string(), "CA".to_string()],
            fraud_merchants,
            safe_merchants: [
                "m_grocery",
                "m_fuel_station",
                "m_pharmacy",
                "m_restaurant",
                "m_utilities",
                "m_public_transit",
                "m_bookstore",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            fraud_time_deltas_min: vec![0.5, 1.0, 5.0, 10.0],
            safe_time_deltas_min: vec![10.0, 30.0, 60.0],
        }
    }
}

/// Per-account feature extraction
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Worker pool size; defaults to the available hardware parallelism
    pub workers: Option<usize>,
    /// Show a progress bar over account groups
    pub show_progress: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            workers: None,
            show_progress: true,
        }
    }
}

impl FeaturesConfig {
    /// Resolved worker pool size
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Temporal weight-of-evidence encoding
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WoeConfig {
    /// Width of a time bucket, in the unit of the timestamp column
    pub window_size: f64,
    /// Minimum positives seen before a boundary gets a table
    pub min_positive_count: usize,
    /// Additive smoothing applied to both class proportions (must be positive)
    pub regularization: f64,
    /// Encoding for merchants absent from a fitted table
    pub unknown_value: Option<f64>,
}

impl Default for WoeConfig {
    fn default() -> Self {
        Self {
            window_size: 3600.0,
            min_positive_count: 10,
            regularization: 1.0,
            unknown_value: None,
        }
    }
}

/// Out-of-time train/validation/test split
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_size: f64,
    pub val_size: f64,
    pub seed: u64,
    pub outlier_lower_quantile: f64,
    pub outlier_upper_quantile: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.3,
            val_size: 0.1,
            seed: 42,
            outlier_lower_quantile: 0.01,
            outlier_upper_quantile: 0.99,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Check every invariant the pipeline relies on
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.synthesis.validate()?;
        self.woe.validate()?;
        self.split.validate()?;
        if self.features.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_group_size < 2 {
            return Err(ConfigError::GroupSizeTooSmall(self.max_group_size));
        }
        if !(self.delta_unit_seconds.is_finite() && self.delta_unit_seconds > 0.0) {
            return Err(ConfigError::InvalidDeltaUnit(self.delta_unit_seconds));
        }

        for (name, list) in [
            ("fraud_locations", &self.fraud_locations),
            ("safe_locations", &self.safe_locations),
        ] {
            if list.is_empty() {
                return Err(ConfigError::EmptyList(name));
            }
            if let Some(code) = list.iter().find(|c| !gazetteer::contains(c)) {
                return Err(ConfigError::UnknownCountry(code.clone()));
            }
        }

        if self.fraud_merchants.is_empty() {
            return Err(ConfigError::EmptyList("fraud_merchants"));
        }
        if self.safe_merchants.is_empty() {
            return Err(ConfigError::EmptyList("safe_merchants"));
        }

        for (name, list) in [
            ("fraud_time_deltas_min", &self.fraud_time_deltas_min),
            ("safe_time_deltas_min", &self.safe_time_deltas_min),
        ] {
            if list.is_empty() {
                return Err(ConfigError::EmptyList(name));
            }
            if let Some(&value) = list.iter().find(|d| !(d.is_finite() && **d > 0.0)) {
                return Err(ConfigError::InvalidTimeDelta { list: name, value });
            }
        }

        Ok(())
    }
}

impl WoeConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.window_size.is_finite() && self.window_size > 0.0) {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        if !(self.regularization.is_finite() && self.regularization > 0.0) {
            return Err(ConfigError::InvalidRegularization(self.regularization));
        }
        Ok(())
    }
}

impl SplitConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (name, value) in [("test_size", self.test_size), ("val_size", self.val_size)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::InvalidFraction { name, value });
            }
        }
        let (lower, upper) = (self.outlier_lower_quantile, self.outlier_upper_quantile);
        if !(0.0 <= lower && lower < upper && upper <= 1.0) {
            return Err(ConfigError::InvalidQuantiles { lower, upper });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.synthesis.max_group_size, 7);
        assert_eq!(config.woe.min_positive_count, 10);
        assert_eq!(config.synthesis.fraud_locations.len(), 13 + 30);
        assert_eq!(config.woe.unknown_value, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_list_is_rejected() {
        let mut config = AppConfig::default();
        config.synthesis.safe_merchants.clear();
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyList("safe_merchants"))
        );
    }

    #[test]
    fn test_non_positive_window_is_rejected() {
        let mut config = AppConfig::default();
        config.woe.window_size = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidWindowSize(0.0)));

        config.woe.window_size = -5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_country_is_rejected() {
        let mut config = AppConfig::default();
        config.synthesis.fraud_locations.push("ZZ".to_string());
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownCountry("ZZ".to_string()))
        );
    }

    #[test]
    fn test_group_size_and_workers() {
        let mut config = AppConfig::default();
        config.synthesis.max_group_size = 1;
        assert_eq!(config.validate(), Err(ConfigError::GroupSizeTooSmall(1)));

        let mut config = AppConfig::default();
        config.features.workers = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroWorkers));
        assert!(FeaturesConfig::default().worker_count() >= 1);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[synthesis]\nmax_group_size = 4\nseed = 11\n\n[woe]\nwindow_size = 500.0").unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.synthesis.max_group_size, 4);
        assert_eq!(config.synthesis.seed, Some(11));
        assert_eq!(config.woe.window_size, 500.0);
        assert_eq!(config.woe.min_positive_count, 10);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[woe]\nwindow_size = -1.0").unwrap();

        assert!(AppConfig::load_from_path(file.path()).is_err());
    }
}
