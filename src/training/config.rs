//! Trainer configuration with layered overrides.
//!
//! Defaults are serialized to a TOML table, user overrides are merged into it
//! with [`recursive_merge`], and the result is deserialized back. Unknown keys
//! that survive the merge are rejected during deserialization.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config_defaults::{
    default_gamma, default_grad_clip, default_n_epochs, default_optimizer_lr, default_step_size,
    default_test_split, default_train_split, default_true, default_valid_split,
};
use super::merge::{MergeError, MissPolicy, recursive_merge};
use crate::app_dirs::{self, AppDirError};
use crate::utils::set_seed;

/// Filename of the trainer overrides inside the app directory.
pub const TRAINER_CONFIG_FILE_NAME: &str = "trainer.toml";

/// Errors that may occur while loading or validating trainer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse a TOML config file.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize the default config.
    #[error("Failed to serialize config to TOML: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    /// Overrides produced a config that does not deserialize.
    #[error("Invalid config overrides: {0}")]
    InvalidOverrides(toml::de::Error),
    /// Overrides could not be merged into the defaults.
    #[error(transparent)]
    Merge(#[from] MergeError),
    /// A dataset split is not one of the configured splits.
    #[error("Split {split} must be one of {allowed:?}")]
    UnknownSplit { split: String, allowed: Vec<String> },
    /// No dataset matches the configured train split.
    #[error("Cannot find any split matching train split: {train_split}")]
    MissingTrainSplit { train_split: String },
    /// No usable app directory.
    #[error(transparent)]
    AppDir(#[from] AppDirError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
    Adamax,
}

/// Learning-rate decay applied after warmup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LrSchedulerKind {
    #[default]
    Constant,
    Linear,
    Exponential,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmupUnit {
    #[default]
    Batches,
    Epochs,
}

/// Order in which batches from several loaders are interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchScheduler {
    #[default]
    Shuffled,
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub optimizer: OptimizerKind,
    /// Base learning rate.
    #[serde(default = "default_optimizer_lr")]
    pub lr: f64,
    /// L2 weight decay.
    #[serde(default)]
    pub l2: f64,
    /// Gradient norm clip; `None` disables clipping.
    #[serde(default = "default_grad_clip")]
    pub grad_clip: Option<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::default(),
            lr: default_optimizer_lr(),
            l2: 0.0,
            grad_clip: default_grad_clip(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExponentialConfig {
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

impl Default for ExponentialConfig {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    #[serde(default = "default_step_size")]
    pub step_size: usize,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            gamma: default_gamma(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LrSchedulerConfig {
    #[serde(default)]
    pub lr_scheduler: LrSchedulerKind,
    /// Warmup length in `warmup_unit`s. Takes precedence over `warmup_percentage`.
    #[serde(default)]
    pub warmup_steps: Option<f64>,
    #[serde(default)]
    pub warmup_unit: WarmupUnit,
    /// Warmup length as a fraction of all training batches.
    #[serde(default)]
    pub warmup_percentage: Option<f64>,
    /// Floor applied to the decayed learning rate (0 disables it).
    #[serde(default)]
    pub min_lr: f64,
    #[serde(default)]
    pub exponential_config: ExponentialConfig,
    #[serde(default)]
    pub step_config: StepConfig,
}

/// Learning configuration for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainerConfig {
    /// Seed for the global RNG; `None` keeps OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_n_epochs")]
    pub n_epochs: usize,
    #[serde(default = "default_train_split")]
    pub train_split: String,
    #[serde(default = "default_valid_split")]
    pub valid_split: String,
    #[serde(default = "default_test_split")]
    pub test_split: String,
    #[serde(default = "default_true")]
    pub progress_bar: bool,
    #[serde(default)]
    pub optimizer_config: OptimizerConfig,
    #[serde(default)]
    pub lr_scheduler_config: LrSchedulerConfig,
    #[serde(default)]
    pub batch_scheduler: BatchScheduler,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            n_epochs: default_n_epochs(),
            train_split: default_train_split(),
            valid_split: default_valid_split(),
            test_split: default_test_split(),
            progress_bar: default_true(),
            optimizer_config: OptimizerConfig::default(),
            lr_scheduler_config: LrSchedulerConfig::default(),
            batch_scheduler: BatchScheduler::default(),
        }
    }
}

impl TrainerConfig {
    /// Merge `overrides` into the defaults.
    ///
    /// Keys may be given flat (`lr = 0.1`) and are matched against nested
    /// tables; keys absent from the defaults are inserted and then validated.
    pub fn with_overrides(overrides: &toml::Table) -> Result<Self, ConfigError> {
        let defaults = match toml::Value::try_from(Self::default())? {
            toml::Value::Table(table) => table,
            _ => toml::Table::new(),
        };
        let merged = recursive_merge(&defaults, overrides, MissPolicy::Insert)?;
        toml::Value::Table(merged)
            .try_into()
            .map_err(ConfigError::InvalidOverrides)
    }

    /// Load overrides from a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: toml::Table =
            toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::with_overrides(&overrides)?;
        tracing::info!("Loaded trainer config from {}", path.display());
        Ok(config)
    }

    /// Load `trainer.toml` from the app directory, or defaults if it is absent.
    pub fn load_from_app_dir() -> Result<Self, ConfigError> {
        let path = trainer_config_path()?;
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Seed the global RNG if a seed is configured.
    pub fn apply_seed(&self) {
        if let Some(seed) = self.seed {
            set_seed(seed);
        }
    }

    /// Validate dataset splits against the configured split names.
    pub fn check_splits<S: AsRef<str>>(&self, splits: &[S]) -> Result<(), ConfigError> {
        let allowed = [&self.train_split, &self.valid_split, &self.test_split];
        for split in splits {
            let split = split.as_ref();
            if !allowed.iter().any(|name| name.as_str() == split) {
                return Err(ConfigError::UnknownSplit {
                    split: split.to_string(),
                    allowed: allowed.iter().map(|name| name.to_string()).collect(),
                });
            }
        }
        if !splits.iter().any(|split| split.as_ref() == self.train_split) {
            return Err(ConfigError::MissingTrainSplit {
                train_split: self.train_split.clone(),
            });
        }
        Ok(())
    }
}

/// Resolve the path of `trainer.toml` inside the app directory.
pub fn trainer_config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(TRAINER_CONFIG_FILE_NAME))
}
