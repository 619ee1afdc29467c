//! Inference engine implementation
//!
//! Multi-step forecasting by recursive one-step prediction: each predicted
//! value is fed back as the newest input of the next step.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::buffer::RollingWindow;
use crate::artifacts::{normalize_key, ArtifactBundle, ArtifactStore};
use crate::cache::BundleCache;
use crate::error::{ForecastError, Result};
use crate::training::SequenceModel;

/// Forecast for one key, earliest step first, in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub key: String,
    /// Version of the bundle that produced the forecast
    pub version: u64,
    pub values: Vec<f64>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Run `n_steps` of autoregressive prediction from a normalized history.
///
/// The model sees the last `lookback` values of `history`; every prediction
/// is appended to the window and the oldest value dropped.
pub fn rollout(model: &dyn SequenceModel, history: &[f64], n_steps: usize) -> Result<Vec<f64>> {
    let lookback = model.lookback();
    let mut window = RollingWindow::from_history(history, lookback)
        .ok_or_else(|| ForecastError::insufficient_data(history.len(), lookback))?;

    let mut predictions = Vec::with_capacity(n_steps);
    for _ in 0..n_steps {
        let next = model.forward(window.view());
        predictions.push(next);
        window.push(next);
    }
    Ok(predictions)
}

/// Loads published bundles and produces forecasts
pub struct Predictor {
    store: Arc<dyn ArtifactStore>,
    cache: Option<Arc<BundleCache>>,
}

impl Predictor {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store, cache: None }
    }

    pub fn with_cache(mut self, cache: Arc<BundleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Current bundle for `key`, through the cache when one is configured
    pub fn load_bundle(&self, key: &str) -> Result<Arc<ArtifactBundle>> {
        let key = normalize_key(key)?;
        let version = self
            .store
            .current_version(&key)?
            .ok_or_else(|| ForecastError::ArtifactNotFound {
                key: key.clone(),
                reason: "model has not been trained".to_string(),
            })?;

        if let Some(bundle) = self.cache.as_ref().and_then(|c| c.get(&key, version)) {
            return Ok(bundle);
        }

        let bundle = Arc::new(self.store.load(&key)?);
        debug!(key = %key, version = bundle.version(), "Loaded bundle from store");
        if let Some(cache) = &self.cache {
            cache.insert(bundle.clone());
        }
        Ok(bundle)
    }

    /// Forecast `n_steps` values after `seed`.
    ///
    /// `seed` is in original units and must hold at least `lookback`
    /// observations; only the most recent `lookback` are used.
    pub fn predict(&self, key: &str, seed: &[f64], n_steps: usize) -> Result<Forecast> {
        let key = normalize_key(key)?;
        if n_steps == 0 {
            return Err(ForecastError::invalid_parameter("n_steps", n_steps, "must be at least 1")
                .for_key(&key));
        }

        let bundle = self.load_bundle(&key)?;
        let started = Instant::now();

        if seed.len() < bundle.lookback {
            return Err(ForecastError::InsufficientData {
                key,
                observed: seed.len(),
                required: bundle.lookback,
            });
        }
        let recent = &seed[seed.len() - bundle.lookback..];
        if let Some(bad) = recent.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::invalid_parameter(
                "seed",
                bad,
                "observations must be finite",
            )
            .for_key(&key));
        }

        let scaler = bundle.scaler();
        let normalized = scaler.transform(recent).map_err(|e| e.for_key(&key))?;
        let model = bundle.model()?;
        let predictions = rollout(&*model, &normalized, n_steps).map_err(|e| e.for_key(&key))?;
        let values = scaler.inverse_transform(&predictions).map_err(|e| e.for_key(&key))?;

        info!(
            key = %key,
            version = bundle.version(),
            steps = n_steps,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Forecast complete"
        );

        Ok(Forecast {
            key,
            version: bundle.version(),
            values,
        })
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{BundleMetadata, MemoryArtifactStore};
    use crate::preprocessing::ScalingState;
    use crate::training::{restore_model, Architecture, ModelParameters};

    /// Linear model that repeats the newest value
    fn persistence(lookback: usize) -> ModelParameters {
        let mut weights = vec![0.0; lookback + 1];
        weights[lookback - 1] = 1.0;
        ModelParameters {
            architecture: Architecture::Linear,
            lookback,
            weights,
        }
    }

    fn store_with(key: &str, params: ModelParameters, scaling: ScalingState) -> Arc<MemoryArtifactStore> {
        let store = Arc::new(MemoryArtifactStore::new());
        let bundle = ArtifactBundle::new(params, scaling, BundleMetadata::new(key, "linear"));
        store.save(key, &bundle).unwrap();
        store
    }

    #[test]
    fn test_rollout_feeds_predictions_back() {
        // y = 0.5 * newest + 0.5: from 0 the sequence is 0.5, 0.75, 0.875
        let params = ModelParameters {
            architecture: Architecture::Linear,
            lookback: 2,
            weights: vec![0.0, 0.5, 0.5],
        };
        let model = restore_model(&params).unwrap();
        let out = rollout(&*model, &[1.0, 0.0], 3).unwrap();
        assert_eq!(out, vec![0.5, 0.75, 0.875]);
    }

    #[test]
    fn test_rollout_short_history() {
        let model = restore_model(&persistence(4)).unwrap();
        let err = rollout(&*model, &[0.1, 0.2], 1).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { required: 4, .. }));
    }

    #[test]
    fn test_predict_in_original_units() {
        let store = store_with("NVDA", persistence(3), ScalingState { min: 100.0, max: 200.0 });
        let predictor = Predictor::new(store);

        let forecast = predictor.predict("nvda", &[120.0, 150.0, 180.0], 4).unwrap();
        assert_eq!(forecast.key, "NVDA");
        assert_eq!(forecast.version, 1);
        assert_eq!(forecast.len(), 4);
        for v in forecast.values {
            assert!((v - 180.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_predict_rejects_zero_steps() {
        let store = store_with("K", persistence(3), ScalingState { min: 0.0, max: 1.0 });
        let err = Predictor::new(store).predict("K", &[0.1, 0.2, 0.3], 0).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { ref name, .. } if name == "n_steps"));
    }

    #[test]
    fn test_predict_untrained_key() {
        let predictor = Predictor::new(Arc::new(MemoryArtifactStore::new()));
        let err = predictor.predict("NONE", &[1.0; 10], 3).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_predict_short_seed() {
        let store = store_with("K", persistence(5), ScalingState { min: 0.0, max: 1.0 });
        let err = Predictor::new(store).predict("K", &[0.5; 4], 1).unwrap_err();
        match err {
            ForecastError::InsufficientData { key, observed, required } => {
                assert_eq!(key, "K");
                assert_eq!(observed, 4);
                assert_eq!(required, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cache_is_used_and_revalidated() {
        let store = store_with("K", persistence(2), ScalingState { min: 0.0, max: 10.0 });
        let cache = Arc::new(BundleCache::new(8, std::time::Duration::from_secs(60)));
        let predictor = Predictor::new(store.clone()).with_cache(cache.clone());

        assert_eq!(predictor.load_bundle("K").unwrap().version(), 1);
        assert_eq!(predictor.load_bundle("K").unwrap().version(), 1);
        assert_eq!(cache.stats().hits, 1);

        let bundle = store.load("K").unwrap();
        store.save("K", &bundle).unwrap();
        assert_eq!(predictor.load_bundle("K").unwrap().version(), 2);
    }
}
