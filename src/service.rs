//! Keyed training and prediction entrypoints
//!
//! [`ForecastService`] ties a series source, an artifact store, the bundle
//! cache and the per-key training locks together and applies the request
//! bounds (lookback, forecast horizon) before any work starts.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts::{normalize_key, ArtifactStore, BundleMetadata, FileArtifactStore};
use crate::cache::{BundleCache, CacheStats};
use crate::config::ForecastConfig;
use crate::data::{CsvSeriesSource, SeriesSource};
use crate::error::{ForecastError, Result};
use crate::inference::Predictor;
use crate::training::{Architecture, CancellationToken, KeyLocks, Trainer, TrainingConfig};

/// Forecast horizon used when a caller does not pick one
pub const DEFAULT_FORECAST_STEPS: usize = 5;

/// Per-request overrides of the configured training defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub lookback: Option<usize>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub architecture: Option<Architecture>,
    pub validation_split: Option<f64>,
    pub time_budget: Option<Duration>,
}

impl TrainRequest {
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    fn apply(&self, base: &TrainingConfig) -> TrainingConfig {
        let mut config = base.clone();
        if let Some(v) = self.lookback {
            config.lookback = v;
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = &self.architecture {
            config.architecture = v.clone();
        }
        if let Some(v) = self.validation_split {
            config.validation_split = v;
        }
        if self.time_budget.is_some() {
            config.time_budget = self.time_budget;
        }
        config
    }
}

/// Result of a successful training request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub status: String,
    pub key: String,
    pub n_observations_used: usize,
    pub version: u64,
    pub final_loss: Option<f64>,
    pub validation_loss: Option<f64>,
}

/// Result of a successful prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub key: String,
    pub steps: usize,
    pub predictions: Vec<f64>,
}

/// Description of the bundle currently published for a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub lookback: usize,
    pub scaling_min: f64,
    pub scaling_max: f64,
    pub n_parameters: usize,
    pub metadata: BundleMetadata,
}

pub struct ForecastService {
    config: ForecastConfig,
    source: Arc<dyn SeriesSource>,
    store: Arc<dyn ArtifactStore>,
    cache: Option<Arc<BundleCache>>,
    locks: Arc<KeyLocks>,
}

impl ForecastService {
    pub fn new(
        config: ForecastConfig,
        source: Arc<dyn SeriesSource>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = config
            .cache_enabled
            .then(|| Arc::new(BundleCache::new(config.cache_size, config.cache_ttl())));

        Ok(Self {
            config,
            source,
            store,
            cache,
            locks: Arc::new(KeyLocks::new()),
        })
    }

    /// Service over `<data_dir>/<KEY>.csv` files and a filesystem store
    pub fn from_config(config: ForecastConfig) -> Result<Self> {
        let store = FileArtifactStore::new(&config.artifacts_dir)?
            .with_retain_versions(config.retain_versions);
        let source = CsvSeriesSource::new(&config.data_dir, config.value_column.clone());
        Self::new(config, Arc::new(source), Arc::new(store))
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn train(&self, key: &str, request: TrainRequest) -> Result<TrainOutcome> {
        self.train_with_cancel(key, request, &CancellationToken::new())
    }

    /// Train the key's model on its full series and publish the result
    pub fn train_with_cancel(
        &self,
        key: &str,
        request: TrainRequest,
        cancel: &CancellationToken,
    ) -> Result<TrainOutcome> {
        let key = normalize_key(key)?;
        let training = request.apply(&self.config.training);

        let (min, max) = (self.config.min_lookback, self.config.max_lookback);
        if !(min..=max).contains(&training.lookback) {
            return Err(ForecastError::InvalidParameter {
                key,
                name: "lookback".to_string(),
                value: training.lookback.to_string(),
                reason: format!("must be in [{}, {}]", min, max),
            });
        }

        let series = self.source.load_series(&key)?;
        let report = self.trainer(training).fit(&key, &series, cancel)?;

        Ok(TrainOutcome {
            status: "trained".to_string(),
            key: report.key.clone(),
            n_observations_used: report.n_observations,
            version: report.version,
            final_loss: report.final_loss(),
            validation_loss: report.validation_loss(),
        })
    }

    /// Forecast the next `n_steps` values after the key's latest observations
    pub fn predict(&self, key: &str, n_steps: usize) -> Result<ForecastOutcome> {
        let key = normalize_key(key)?;
        let max = self.config.max_forecast_steps;
        if !(1..=max).contains(&n_steps) {
            return Err(ForecastError::InvalidParameter {
                key,
                name: "n_steps".to_string(),
                value: n_steps.to_string(),
                reason: format!("must be in [1, {}]", max),
            });
        }

        if self.store.current_version(&key)?.is_none() {
            return Err(ForecastError::ArtifactNotFound {
                key,
                reason: "model has not been trained".to_string(),
            });
        }

        let series = self.source.load_series(&key)?;
        let forecast = self.predictor().predict(&key, &series, n_steps)?;
        info!(key = %key, version = forecast.version, steps = n_steps, "Served forecast");

        Ok(ForecastOutcome {
            key: forecast.key,
            steps: n_steps,
            predictions: forecast.values,
        })
    }

    pub fn model_info(&self, key: &str) -> Result<ModelInfo> {
        let bundle = self.predictor().load_bundle(key)?;
        Ok(ModelInfo {
            lookback: bundle.lookback,
            scaling_min: bundle.scaling.min,
            scaling_max: bundle.scaling.max,
            n_parameters: bundle.parameters.weights.len(),
            metadata: bundle.metadata.clone(),
        })
    }

    pub fn trained_keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    /// True while a training run holds the key's lock
    pub fn is_training(&self, key: &str) -> Result<bool> {
        Ok(self.locks.is_locked(&normalize_key(key)?))
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    fn trainer(&self, training: TrainingConfig) -> Trainer {
        let trainer = Trainer::new(training, self.store.clone())
            .with_locks(self.locks.clone(), self.config.lock_policy);
        match &self.cache {
            Some(cache) => trainer.with_cache(cache.clone()),
            None => trainer,
        }
    }

    fn predictor(&self) -> Predictor {
        let predictor = Predictor::new(self.store.clone());
        match &self.cache {
            Some(cache) => predictor.with_cache(cache.clone()),
            None => predictor,
        }
    }
}

impl std::fmt::Debug for ForecastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastService")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}
