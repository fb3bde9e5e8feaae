//! Configuration structures for the reserve-market system.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::NumberLocale;

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local-time configuration.
    pub time: TimeConfig,
    /// Numeric notation per source table.
    pub numbers: NumberConfig,
    /// Call approximation configuration.
    pub approximation: ApproximationConfig,
    /// Tariff period configuration.
    pub tariff: TariffConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; absent fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.tariff.ht_start_hour >= self.tariff.ht_end_hour || self.tariff.ht_end_hour > 24 {
            return Err(Error::config(format!(
                "invalid HT hours {}..{}",
                self.tariff.ht_start_hour, self.tariff.ht_end_hour
            )));
        }
        if !(self.approximation.resolution_mw >= 0.0) {
            return Err(Error::config("resolution_mw must be >= 0"));
        }
        if !(self.approximation.zero_sum_epsilon > 0.0) {
            return Err(Error::config("zero_sum_epsilon must be > 0"));
        }
        Ok(())
    }
}

/// Local-time configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// IANA zone the portals publish wall-clock times in.
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

/// Decimal notation used by each source table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberConfig {
    pub needs: NumberLocale,
    pub calls: NumberLocale,
    pub auctions: NumberLocale,
}

impl Default for NumberConfig {
    fn default() -> Self {
        Self {
            needs: NumberLocale::DecimalComma,
            calls: NumberLocale::DecimalComma,
            auctions: NumberLocale::DecimalComma,
        }
    }
}

/// Call approximation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproximationConfig {
    /// Needs sums below this magnitude fall back to uniform weights.
    pub zero_sum_epsilon: f64,
    /// Quantum for minute volumes in MW (0 = unquantized).
    pub resolution_mw: f64,
}

impl Default for ApproximationConfig {
    fn default() -> Self {
        Self {
            zero_sum_epsilon: 1e-9,
            resolution_mw: 0.0,
        }
    }
}

/// Tariff period configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    /// First HT hour (inclusive, local time).
    pub ht_start_hour: u32,
    /// Last HT hour (exclusive, local time).
    pub ht_end_hour: u32,
    /// Weekends are NT all day.
    pub ht_weekdays_only: bool,
    /// National public holidays are NT all day.
    pub national_holidays: bool,
    /// Additional NT days (regional holidays, bridge days).
    pub extra_holidays: Vec<NaiveDate>,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            ht_start_hour: 8,
            ht_end_hour: 20,
            ht_weekdays_only: true,
            national_holidays: true,
            extra_holidays: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit pipeline events.
    pub enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.time.timezone, "Europe/Berlin");
        assert_eq!(config.tariff.ht_start_hour, 8);
        assert_eq!(config.approximation.resolution_mw, 0.0);
        assert!(config.logging.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"logging": {"enabled": false}}"#).unwrap();
        assert!(!config.logging.enabled);
        assert_eq!(config.numbers.calls, NumberLocale::DecimalComma);
    }

    #[test]
    fn test_from_json_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"approximation": {"resolution_mw": 0.5}, "tariff": {"extra_holidays": ["2019-10-31"]}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.approximation.resolution_mw, 0.5);
        assert_eq!(config.approximation.zero_sum_epsilon, 1e-9);
        assert_eq!(config.tariff.ht_start_hour, 8);
        assert_eq!(config.tariff.ht_end_hour, 20);
        assert_eq!(
            config.tariff.extra_holidays,
            vec![NaiveDate::from_ymd_opt(2019, 10, 31).unwrap()]
        );
        assert_eq!(config.time.timezone, "Europe/Berlin");
        assert!(config.logging.enabled);
    }

    #[test]
    fn test_from_json_file_invalid() {
        let dir = tempfile::tempdir().unwrap();

        let malformed = dir.path().join("malformed.json");
        std::fs::write(&malformed, r#"{"approximation": {"resolution_mw": }"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&malformed),
            Err(Error::Json(_))
        ));

        let out_of_range = dir.path().join("out_of_range.json");
        std::fs::write(&out_of_range, r#"{"tariff": {"ht_start_hour": 20, "ht_end_hour": 8}}"#)
            .unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&out_of_range),
            Err(Error::Config(_))
        ));

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            PipelineConfig::from_json_file(&missing),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_invalid_ht_hours() {
        let mut config = PipelineConfig::default();
        config.tariff.ht_start_hour = 20;
        config.tariff.ht_end_hour = 8;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
