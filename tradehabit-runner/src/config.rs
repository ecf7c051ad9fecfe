//! Analysis configuration: detector thresholds and the OCO window.
//!
//! Loaded from TOML (every field optional, defaulted), adjusted through
//! [`ConfigOverrides`] and validated before any detector runs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tradehabit_core::stops::DEFAULT_OCO_WINDOW_SECONDS;

/// Content-addressable id of a threshold set.
pub type ConfigFingerprint = String;

pub const DEFAULT_SIGMA_EXCESSIVE_RISK: f64 = 1.5;
pub const DEFAULT_SIGMA_OUTSIZED_LOSS: f64 = 1.0;
pub const DEFAULT_REVENGE_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_RISK_VARIABILITY_THRESHOLD: f64 = 0.35;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid {field} = {value}: {reason}")]
    Invalid {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Thresholds for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Excessive-risk threshold: mean + sigma × pstdev of risk distances.
    pub sigma_excessive_risk: f64,
    /// Outsized-loss threshold: mean + sigma × pstdev of losing-trade point loss.
    pub sigma_outsized_loss: f64,
    /// Revenge window as a multiple of the median hold time.
    pub revenge_multiplier: f64,
    /// Risk-sizing coefficient of variation at or above which sizing is inconsistent.
    pub risk_variability_threshold: f64,
    /// Half-width of the window pairing a stop cancel with its OCO target fill.
    pub oco_window_seconds: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sigma_excessive_risk: DEFAULT_SIGMA_EXCESSIVE_RISK,
            sigma_outsized_loss: DEFAULT_SIGMA_OUTSIZED_LOSS,
            revenge_multiplier: DEFAULT_REVENGE_MULTIPLIER,
            risk_variability_threshold: DEFAULT_RISK_VARIABILITY_THRESHOLD,
            oco_window_seconds: DEFAULT_OCO_WINDOW_SECONDS,
        }
    }
}

impl AnalysisConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values no detector can use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    value,
                    reason: "must be finite",
                });
            }
            if value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    value,
                    reason: "must not be negative",
                });
            }
            Ok(())
        }

        non_negative("sigma_excessive_risk", self.sigma_excessive_risk)?;
        non_negative("sigma_outsized_loss", self.sigma_outsized_loss)?;
        non_negative("revenge_multiplier", self.revenge_multiplier)?;
        non_negative("oco_window_seconds", self.oco_window_seconds)?;
        non_negative("risk_variability_threshold", self.risk_variability_threshold)?;
        if self.risk_variability_threshold == 0.0 {
            return Err(ConfigError::Invalid {
                field: "risk_variability_threshold",
                value: self.risk_variability_threshold,
                reason: "must be positive",
            });
        }
        Ok(())
    }

    /// Apply overrides and validate the result. `self` is left untouched on error.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let merged = Self {
            sigma_excessive_risk: overrides.sigma_excessive_risk.unwrap_or(self.sigma_excessive_risk),
            sigma_outsized_loss: overrides.sigma_outsized_loss.unwrap_or(self.sigma_outsized_loss),
            revenge_multiplier: overrides.revenge_multiplier.unwrap_or(self.revenge_multiplier),
            risk_variability_threshold: overrides
                .risk_variability_threshold
                .unwrap_or(self.risk_variability_threshold),
            oco_window_seconds: overrides.oco_window_seconds.unwrap_or(self.oco_window_seconds),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Deterministic BLAKE3 id of this threshold set.
    ///
    /// Two configs with identical values share a fingerprint.
    pub fn fingerprint(&self) -> ConfigFingerprint {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in [
            ("sigma_excessive_risk", self.sigma_excessive_risk),
            ("sigma_outsized_loss", self.sigma_outsized_loss),
            ("revenge_multiplier", self.revenge_multiplier),
            ("risk_variability_threshold", self.risk_variability_threshold),
            ("oco_window_seconds", self.oco_window_seconds),
        ] {
            hasher.update(name.as_bytes());
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Partial configuration: every `Some` replaces the base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub sigma_excessive_risk: Option<f64>,
    pub sigma_outsized_loss: Option<f64>,
    pub revenge_multiplier: Option<f64>,
    pub risk_variability_threshold: Option<f64>,
    pub oco_window_seconds: Option<f64>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.sigma_excessive_risk, 1.5);
        assert_eq!(c.sigma_outsized_loss, 1.0);
        assert_eq!(c.revenge_multiplier, 1.0);
        assert_eq!(c.risk_variability_threshold, 0.35);
        assert_eq!(c.oco_window_seconds, 60.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = AnalysisConfig::from_toml("sigma_excessive_risk = 2.0\n").unwrap();
        assert_eq!(c.sigma_excessive_risk, 2.0);
        assert_eq!(c.sigma_outsized_loss, 1.0);
    }

    #[test]
    fn toml_round_trip() {
        let c = AnalysisConfig {
            oco_window_seconds: 0.25,
            ..AnalysisConfig::default()
        };
        let text = c.to_toml().unwrap();
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), c);
    }

    #[test]
    fn rejects_invalid_values() {
        let neg = AnalysisConfig::from_toml("sigma_outsized_loss = -1.0\n");
        assert!(matches!(
            neg,
            Err(ConfigError::Invalid {
                field: "sigma_outsized_loss",
                ..
            })
        ));
        let zero = AnalysisConfig {
            risk_variability_threshold: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(zero.validate().is_err());
        let nan = AnalysisConfig {
            revenge_multiplier: f64::NAN,
            ..AnalysisConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn unparseable_toml_is_parse_error() {
        assert!(matches!(
            AnalysisConfig::from_toml("sigma_excessive_risk = \"high\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_apply_and_validate() {
        let base = AnalysisConfig::default();
        let o = ConfigOverrides {
            sigma_excessive_risk: Some(3.0),
            ..ConfigOverrides::default()
        };
        let merged = base.with_overrides(&o).unwrap();
        assert_eq!(merged.sigma_excessive_risk, 3.0);
        assert_eq!(merged.sigma_outsized_loss, base.sigma_outsized_loss);

        let bad = ConfigOverrides {
            oco_window_seconds: Some(-5.0),
            ..ConfigOverrides::default()
        };
        assert!(base.with_overrides(&bad).is_err());
        assert!(ConfigOverrides::default().is_empty());
    }

    #[test]
    fn fingerprint_is_deterministic_and_value_sensitive() {
        let a = AnalysisConfig::default();
        let b = AnalysisConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        let c = AnalysisConfig {
            sigma_excessive_risk: 2.0,
            ..a
        };
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn from_file_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnalysisConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let path = dir.path().join("thresholds.toml");
        std::fs::write(&path, "revenge_multiplier = 2.5\n").unwrap();
        assert_eq!(AnalysisConfig::from_file(&path).unwrap().revenge_multiplier, 2.5);
    }
}
