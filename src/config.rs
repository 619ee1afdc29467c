//! Service configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::training::{LockPolicy, TrainingConfig};

/// Configuration of a [`ForecastService`](crate::service::ForecastService)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Root of the artifact store
    pub artifacts_dir: PathBuf,
    /// Directory holding one `<KEY>.csv` per series
    pub data_dir: PathBuf,
    /// CSV column holding the observations
    pub value_column: String,
    /// Defaults for every training run
    pub training: TrainingConfig,
    pub min_lookback: usize,
    pub max_lookback: usize,
    pub max_forecast_steps: usize,
    pub cache_enabled: bool,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
    /// Published versions kept on disk per key
    pub retain_versions: usize,
    pub lock_policy: LockPolicy,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: std::env::var("ARTIFACTS_DIR")
                .unwrap_or_else(|_| "./artifacts".to_string())
                .into(),
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            value_column: std::env::var("FORECAST_VALUE_COLUMN")
                .unwrap_or_else(|_| "close".to_string()),
            training: TrainingConfig::default(),
            min_lookback: 5,
            max_lookback: 200,
            max_forecast_steps: env_or("FORECAST_MAX_STEPS", 30),
            cache_enabled: true,
            cache_size: env_or("FORECAST_CACHE_SIZE", 64),
            cache_ttl_secs: env_or("FORECAST_CACHE_TTL_SECS", 3600),
            retain_versions: 2,
            lock_policy: LockPolicy::Block,
        }
    }
}

impl ForecastConfig {
    /// Read a JSON configuration file; absent fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = column.into();
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_lookback == 0 || self.min_lookback > self.max_lookback {
            return Err(ForecastError::invalid_parameter(
                "min_lookback",
                self.min_lookback,
                format!("must be in [1, max_lookback = {}]", self.max_lookback),
            ));
        }
        if self.max_forecast_steps == 0 {
            return Err(ForecastError::invalid_parameter(
                "max_forecast_steps",
                self.max_forecast_steps,
                "must be at least 1",
            ));
        }
        if self.cache_enabled && self.cache_size == 0 {
            return Err(ForecastError::invalid_parameter(
                "cache_size",
                self.cache_size,
                "must be at least 1 when caching is enabled",
            ));
        }
        if self.retain_versions == 0 {
            return Err(ForecastError::invalid_parameter(
                "retain_versions",
                self.retain_versions,
                "must be at least 1",
            ));
        }
        self.training.validate()
    }
}
