//! Training engine implementation
//!
//! Fits a sequence model to one normalized series with minibatch gradient
//! descent and publishes the result as an artifact bundle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cancel::CancellationToken;
use super::config::TrainingConfig;
use super::locks::{KeyLocks, LockPolicy};
use super::model::{init_model, SequenceModel};
use super::optimizer::Optimizer;
use crate::artifacts::{normalize_key, ArtifactBundle, ArtifactStore, BundleMetadata};
use crate::cache::BundleCache;
use crate::error::{ForecastError, Result};
use crate::preprocessing::{build_windows, MinMaxScaler, ScalingState, WindowSet};

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub key: String,
    /// Version the bundle was published under
    pub version: u64,
    /// Sample-weighted mean training loss per epoch
    pub epoch_losses: Vec<f64>,
    /// Loss on the held-out windows after each epoch (empty without a holdout)
    pub validation_losses: Vec<f64>,
    pub n_observations: usize,
    pub n_windows: usize,
    pub n_train_windows: usize,
    pub scaling: ScalingState,
    pub elapsed: Duration,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }

    pub fn validation_loss(&self) -> Option<f64> {
        self.validation_losses.last().copied()
    }
}

/// Trains and publishes models for series keys
pub struct Trainer {
    config: TrainingConfig,
    store: Arc<dyn ArtifactStore>,
    cache: Option<Arc<BundleCache>>,
    locks: Arc<KeyLocks>,
    lock_policy: LockPolicy,
}

impl Trainer {
    pub fn new(config: TrainingConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            store,
            cache: None,
            locks: Arc::new(KeyLocks::new()),
            lock_policy: LockPolicy::default(),
        }
    }

    /// Invalidate `cache` entries after every publish
    pub fn with_cache(mut self, cache: Arc<BundleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share a lock registry with other trainers
    pub fn with_locks(mut self, locks: Arc<KeyLocks>, policy: LockPolicy) -> Self {
        self.locks = locks;
        self.lock_policy = policy;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Train on `series` and publish the bundle under `key`.
    ///
    /// Nothing is written unless every epoch completes. `cancel` and the
    /// configured time budget are checked before each minibatch.
    pub fn fit(
        &self,
        key: &str,
        series: &[f64],
        cancel: &CancellationToken,
    ) -> Result<TrainingReport> {
        let key = normalize_key(key)?;
        let config = &self.config;
        config.validate().map_err(|e| e.for_key(&key))?;

        let required = config.required_observations();
        if series.len() < required {
            return Err(ForecastError::InsufficientData {
                key,
                observed: series.len(),
                required,
            });
        }
        if let Some(bad) = series.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::invalid_parameter(
                "series",
                bad,
                "observations must be finite",
            )
            .for_key(&key));
        }

        let _guard = self.locks.acquire(&key, self.lock_policy)?;
        let started = Instant::now();

        let mut scaler = MinMaxScaler::new();
        let (normalized, scaling) = scaler.fit_transform(series).map_err(|e| e.for_key(&key))?;
        if scaling.is_degenerate() && config.reject_constant_series {
            return Err(ForecastError::DegenerateSeries {
                key,
                value: scaling.min,
            });
        }

        let windows = build_windows(&normalized, config.lookback).map_err(|e| e.for_key(&key))?;
        let n_holdout = holdout_size(windows.len(), config.validation_split);
        let (train, holdout) = windows.split_at(windows.len() - n_holdout);

        info!(
            key = %key,
            observations = series.len(),
            windows = windows.len(),
            holdout = n_holdout,
            lookback = config.lookback,
            architecture = config.architecture.name(),
            optimizer = config.optimizer.name(),
            "Starting training"
        );

        let mut model = init_model(&config.architecture, config.lookback, config.random_state)
            .map_err(|e| e.for_key(&key))?;
        let mut optimizer = Optimizer::new(
            config.optimizer.clone(),
            config.learning_rate,
            model.n_parameters(),
        );
        let mut rng = match config.random_state {
            // Offset so the shuffle stream differs from the init stream
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(1)),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut indices: Vec<usize> = (0..train.len()).collect();
        let mut epoch_losses = Vec::with_capacity(config.epochs);
        let mut validation_losses = Vec::new();
        let mut warned_divergence = false;

        for epoch in 0..config.epochs {
            indices.shuffle(&mut rng);
            let mut loss_sum = 0.0;

            for batch in indices.chunks(config.batch_size) {
                self.check_interrupt(&key, epoch, cancel, started)?;

                let x = train.inputs().select(Axis(0), batch);
                let y = train.targets().select(Axis(0), batch);
                let (loss, gradient) = model.loss_and_gradient(x.view(), y.view());
                optimizer.step(&mut *model, &gradient);
                loss_sum += loss * batch.len() as f64;
            }

            let epoch_loss = loss_sum / train.len() as f64;
            epoch_losses.push(epoch_loss);
            let validation_loss = evaluate(&*model, &holdout);
            if let Some(v) = validation_loss {
                validation_losses.push(v);
            }

            if !epoch_loss.is_finite() && !warned_divergence {
                warn!(key = %key, epoch = epoch + 1, "Training loss is no longer finite");
                warned_divergence = true;
            }

            let last = epoch + 1 == config.epochs;
            if last || (config.log_every > 0 && (epoch + 1) % config.log_every == 0) {
                info!(
                    key = %key,
                    epoch = epoch + 1,
                    epochs = config.epochs,
                    loss = epoch_loss,
                    validation_loss = ?validation_loss,
                    "Epoch complete"
                );
            }
        }

        self.check_interrupt(&key, config.epochs, cancel, started)?;

        let mut metadata = BundleMetadata::new(key.clone(), config.architecture.name());
        metadata.n_observations = series.len();
        metadata.n_windows = windows.len();
        metadata.epochs = config.epochs;
        metadata.final_loss = epoch_losses.last().copied().filter(|l| l.is_finite());
        metadata.validation_loss = validation_losses.last().copied().filter(|l| l.is_finite());

        let bundle = ArtifactBundle::new(model.parameters(), scaling, metadata);
        let version = self.store.save(&key, &bundle)?;
        if let Some(cache) = &self.cache {
            cache.invalidate(&key);
        }

        let elapsed = started.elapsed();
        info!(
            key = %key,
            version,
            final_loss = ?epoch_losses.last(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Training complete"
        );

        Ok(TrainingReport {
            key,
            version,
            epoch_losses,
            validation_losses,
            n_observations: series.len(),
            n_windows: windows.len(),
            n_train_windows: train.len(),
            scaling,
            elapsed,
        })
    }

    fn check_interrupt(
        &self,
        key: &str,
        epochs_completed: usize,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<()> {
        let reason = if cancel.is_cancelled() {
            "cancelled by caller".to_string()
        } else {
            match self.config.time_budget {
                Some(budget) if started.elapsed() > budget => {
                    format!("time budget of {:?} exceeded", budget)
                }
                _ => return Ok(()),
            }
        };

        warn!(key, epochs_completed, reason = %reason, "Training aborted");
        Err(ForecastError::TrainingAborted {
            key: key.to_string(),
            epochs_completed,
            reason,
        })
    }
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field("lock_policy", &self.lock_policy)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Windows held out from the end of the set; always leaves one for training
fn holdout_size(n_windows: usize, split: f64) -> usize {
    if split <= 0.0 || n_windows < 2 {
        return 0;
    }
    let n = ((n_windows as f64) * split).round() as usize;
    n.clamp(1, n_windows - 1)
}

fn evaluate(model: &dyn SequenceModel, windows: &WindowSet) -> Option<f64> {
    if windows.is_empty() {
        return None;
    }
    let predictions: Array1<f64> = model.forward_batch(windows.inputs().view());
    let residuals = predictions - windows.targets();
    Some(residuals.mapv(|r| r * r).mean().unwrap_or(0.0))
}
