//! Runtime configuration for progression and energy rules.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::constants::{
    DEFAULT_MAX_ENERGY, ENERGY_REFILL_INTERVAL_SECS, EXP_PER_LEVEL, LEVEL_UP_AGI, LEVEL_UP_INT,
    LEVEL_UP_LUK, LEVEL_UP_MAX_HP, LEVEL_UP_STR, LEVEL_UP_VIT, MAX_LEVEL,
};
use crate::stats::StatVector;

/// Level curve and per-level growth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionConfig {
    #[serde(default = "ProgressionConfig::default_max_level")]
    pub max_level: u32,
    /// Experience needed to leave level `n` is `n * exp_per_level`.
    #[serde(default = "ProgressionConfig::default_exp_per_level")]
    pub exp_per_level: u64,
    #[serde(default = "ProgressionConfig::default_stat_growth")]
    pub stat_growth: StatVector,
    #[serde(default = "ProgressionConfig::default_max_hp_growth")]
    pub max_hp_growth: u32,
}

impl ProgressionConfig {
    const fn default_max_level() -> u32 {
        MAX_LEVEL
    }

    const fn default_exp_per_level() -> u64 {
        EXP_PER_LEVEL
    }

    const fn default_stat_growth() -> StatVector {
        StatVector::new(
            LEVEL_UP_STR,
            LEVEL_UP_AGI,
            LEVEL_UP_INT,
            LEVEL_UP_LUK,
            LEVEL_UP_VIT,
        )
    }

    const fn default_max_hp_growth() -> u32 {
        LEVEL_UP_MAX_HP
    }

    /// Experience required to advance past `level`.
    #[must_use]
    pub fn threshold(&self, level: u32) -> u64 {
        u64::from(level).saturating_mul(self.exp_per_level)
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            max_level: Self::default_max_level(),
            exp_per_level: Self::default_exp_per_level(),
            stat_growth: Self::default_stat_growth(),
            max_hp_growth: Self::default_max_hp_growth(),
        }
    }
}

/// Energy pool and refill schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyConfig {
    #[serde(default = "EnergyConfig::default_max_energy")]
    pub default_max_energy: u32,
    /// Seconds between full refills; zero disables refills.
    #[serde(default = "EnergyConfig::default_refill_interval_secs")]
    pub refill_interval_secs: i64,
}

impl EnergyConfig {
    const fn default_max_energy() -> u32 {
        DEFAULT_MAX_ENERGY
    }

    const fn default_refill_interval_secs() -> i64 {
        ENERGY_REFILL_INTERVAL_SECS
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            default_max_energy: Self::default_max_energy(),
            refill_interval_secs: Self::default_refill_interval_secs(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
}

/// Errors raised when configuration cannot be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("maxLevel must be at least 1")]
    MaxLevel,
    #[error("expPerLevel must be at least 1")]
    ExpPerLevel,
    #[error("refillIntervalSecs must not be negative (got {0})")]
    RefillInterval(i64),
}

impl EngineConfig {
    /// Parse and validate a JSON config; omitted fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range value.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.progression.max_level == 0 {
            return Err(ConfigError::MaxLevel);
        }
        if self.progression.exp_per_level == 0 {
            return Err(ConfigError::ExpPerLevel);
        }
        if self.energy.refill_interval_secs < 0 {
            return Err(ConfigError::RefillInterval(self.energy.refill_interval_secs));
        }
        Ok(())
    }
}
