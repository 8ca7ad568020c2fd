use std::path::Path;

use pocc_consensus::{SelectionPolicy, DEFAULT_DIFFICULTY, DEFAULT_REWARD_RATE};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables of a ledger instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Leading hex zeros a block hash needs to be accepted.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default = "default_reward_rate")]
    pub reward_rate: f64,
    #[serde(default = "default_contribution_ceiling")]
    pub contribution_ceiling: f64,
    #[serde(default)]
    pub selection_floor: f64,
    #[serde(default = "default_fallback_after_rounds")]
    pub fallback_after_rounds: u32,
    #[serde(default = "default_max_seal_attempts")]
    pub max_seal_attempts: u64,
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

fn default_reward_rate() -> f64 {
    DEFAULT_REWARD_RATE
}

fn default_contribution_ceiling() -> f64 {
    1.0
}

fn default_fallback_after_rounds() -> u32 {
    16
}

fn default_max_seal_attempts() -> u64 {
    1_000_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            reward_rate: default_reward_rate(),
            contribution_ceiling: default_contribution_ceiling(),
            selection_floor: 0.0,
            fallback_after_rounds: default_fallback_after_rounds(),
            max_seal_attempts: default_max_seal_attempts(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // A blake3 hex digest is 64 characters long.
        if self.difficulty > 64 {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds hash length 64",
                self.difficulty
            )));
        }
        if !self.reward_rate.is_finite() || self.reward_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "reward_rate {} must be finite and non-negative",
                self.reward_rate
            )));
        }
        if !self.contribution_ceiling.is_finite() || self.contribution_ceiling <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "contribution_ceiling {} must be finite and positive",
                self.contribution_ceiling
            )));
        }
        if !(0.0..=1.0).contains(&self.selection_floor) {
            return Err(ConfigError::Invalid(format!(
                "selection_floor {} must be within [0, 1]",
                self.selection_floor
            )));
        }
        if self.max_seal_attempts == 0 {
            return Err(ConfigError::Invalid("max_seal_attempts must be > 0".into()));
        }
        Ok(())
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            contribution_ceiling: self.contribution_ceiling,
            selection_floor: self.selection_floor,
            fallback_after_rounds: self.fallback_after_rounds,
        }
    }
}
