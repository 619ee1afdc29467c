//! Integration test: train then forecast through the predictor

use std::sync::Arc;
use std::time::Duration;

use kolosal_forecast::artifacts::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
use kolosal_forecast::cache::BundleCache;
use kolosal_forecast::error::ForecastError;
use kolosal_forecast::inference::Predictor;
use kolosal_forecast::preprocessing::{build_windows, MinMaxScaler};
use kolosal_forecast::training::{Architecture, CancellationToken, Trainer, TrainingConfig};
use tempfile::TempDir;

fn sine_series(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 * 0.1).sin() * 20.0 + 150.0).collect()
}

fn quick_config() -> TrainingConfig {
    TrainingConfig::new(20).with_epochs(1).with_batch_size(32)
}

#[test]
fn test_scaling_and_windows_scenario() {
    let series: Vec<f64> = (1..=10).map(|v| v as f64).collect();
    let mut scaler = MinMaxScaler::new();
    let (normalized, state) = scaler.fit_transform(&series).unwrap();
    assert_eq!((state.min, state.max), (1.0, 10.0));

    let windows = build_windows(&normalized, 3).unwrap();
    assert_eq!(windows.len(), 7);
    let first = windows.get(0).unwrap();
    let expected = [0.0, 1.0 / 9.0, 2.0 / 9.0];
    for (got, want) in first.input.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9);
    }
    assert!((first.target - 3.0 / 9.0).abs() < 1e-9);

    let restored = scaler.inverse_transform(&normalized).unwrap();
    for (a, b) in restored.iter().zip(&series) {
        assert!((a - b).abs() <= 1e-6 * b.abs());
    }
}

#[test]
fn test_untrained_then_trained() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(dir.path()).unwrap());
    let predictor = Predictor::new(store.clone());
    let series = sine_series(300);

    let err = predictor.predict("NVDA", &series, 3).unwrap_err();
    assert!(matches!(err, ForecastError::ArtifactNotFound { .. }), "{err:?}");

    let trainer = Trainer::new(quick_config(), store.clone());
    let report = trainer.fit("NVDA", &series, &CancellationToken::new()).unwrap();
    assert_eq!(report.n_observations, 300);

    let forecast = predictor.predict("NVDA", &series, 3).unwrap();
    assert_eq!(forecast.values.len(), 3);
    assert!(forecast.values.iter().all(|v| v.is_finite()));
    assert_eq!(forecast.version, report.version);
}

#[test]
fn test_forecast_lengths() {
    let store = Arc::new(MemoryArtifactStore::new());
    let series = sine_series(200);
    Trainer::new(quick_config(), store.clone())
        .fit("K", &series, &CancellationToken::new())
        .unwrap();

    let predictor = Predictor::new(store);
    for n in [1, 5, 30] {
        let forecast = predictor.predict("K", &series, n).unwrap();
        assert_eq!(forecast.values.len(), n, "horizon {}", n);
    }
}

#[test]
fn test_first_step_matches_direct_forward() {
    let store = Arc::new(MemoryArtifactStore::new());
    let series = sine_series(150);
    Trainer::new(quick_config(), store.clone())
        .fit("K", &series, &CancellationToken::new())
        .unwrap();

    let bundle = store.load("K").unwrap();
    let scaler = bundle.scaler();
    let recent = scaler.transform(&series[series.len() - 20..]).unwrap();
    let model = bundle.model().unwrap();
    let direct = scaler
        .inverse_transform(&[model.forward(ndarray::ArrayView1::from(&recent[..]))])
        .unwrap()[0];

    let forecast = Predictor::new(store).predict("K", &series, 1).unwrap();
    assert!((forecast.values[0] - direct).abs() < 1e-9);
}

#[test]
fn test_forecast_is_deterministic() {
    let store = Arc::new(MemoryArtifactStore::new());
    let series = sine_series(200);
    Trainer::new(quick_config(), store.clone())
        .fit("K", &series, &CancellationToken::new())
        .unwrap();

    let predictor = Predictor::new(store);
    let a = predictor.predict("K", &series, 10).unwrap();
    let b = predictor.predict("K", &series, 10).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_constant_series_forecasts_the_constant() {
    let store = Arc::new(MemoryArtifactStore::new());
    let series = vec![42.0; 40];
    Trainer::new(TrainingConfig::new(5).with_epochs(1), store.clone())
        .fit("FLAT", &series, &CancellationToken::new())
        .unwrap();

    let forecast = Predictor::new(store).predict("FLAT", &series, 4).unwrap();
    assert_eq!(forecast.values, vec![42.0; 4]);
}

#[test]
fn test_seed_shorter_than_lookback() {
    let store = Arc::new(MemoryArtifactStore::new());
    let series = sine_series(100);
    Trainer::new(quick_config(), store.clone())
        .fit("K", &series, &CancellationToken::new())
        .unwrap();

    let err = Predictor::new(store).predict("K", &series[..19], 3).unwrap_err();
    match err {
        ForecastError::InsufficientData { observed, required, .. } => {
            assert_eq!(observed, 19);
            assert_eq!(required, 20);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_retrain_bumps_version_and_cache_follows() {
    let store = Arc::new(MemoryArtifactStore::new());
    let cache = Arc::new(BundleCache::new(8, Duration::from_secs(300)));
    let series = sine_series(200);

    let trainer = Trainer::new(quick_config(), store.clone()).with_cache(cache.clone());
    let predictor = Predictor::new(store.clone()).with_cache(cache.clone());

    trainer.fit("K", &series, &CancellationToken::new()).unwrap();
    let first = predictor.predict("K", &series, 3).unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(cache.len(), 1);

    let retrain = Trainer::new(
        quick_config().with_architecture(Architecture::Linear),
        store.clone(),
    )
    .with_cache(cache.clone());
    let report = retrain.fit("K", &series, &CancellationToken::new()).unwrap();
    assert_eq!(report.version, 2);

    let second = predictor.predict("K", &series, 3).unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(
        predictor.load_bundle("K").unwrap().parameters.architecture,
        Architecture::Linear
    );
}

#[test]
fn test_stale_cache_entry_is_not_served() {
    // A store updated behind the cache's back must still win
    let store = Arc::new(MemoryArtifactStore::new());
    let cache = Arc::new(BundleCache::new(8, Duration::from_secs(300)));
    let series = sine_series(200);
    let predictor = Predictor::new(store.clone()).with_cache(cache);

    Trainer::new(quick_config(), store.clone())
        .fit("K", &series, &CancellationToken::new())
        .unwrap();
    assert_eq!(predictor.predict("K", &series, 1).unwrap().version, 1);

    Trainer::new(quick_config(), store.clone())
        .fit("K", &series, &CancellationToken::new())
        .unwrap();
    assert_eq!(predictor.predict("K", &series, 1).unwrap().version, 2);
}
