//! Integration test: keyed service over CSV series and a filesystem store

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use kolosal_forecast::artifacts::MemoryArtifactStore;
use kolosal_forecast::config::ForecastConfig;
use kolosal_forecast::data::InMemorySeriesSource;
use kolosal_forecast::error::ForecastError;
use kolosal_forecast::service::{ForecastService, TrainRequest};
use kolosal_forecast::training::{Architecture, LockPolicy, TrainingConfig};
use tempfile::TempDir;

/// `sin(x) + 10` over `n` evenly spaced points in [0, 50]
fn sine_series(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (50.0 * i as f64 / (n - 1) as f64).sin() + 10.0)
        .collect()
}

fn write_csv(dir: &Path, key: &str, values: &[f64]) {
    let mut contents = String::from("date,close\n");
    for (i, v) in values.iter().enumerate() {
        contents.push_str(&format!("{},{}\n", i, v));
    }
    fs::write(dir.join(format!("{}.csv", key)), contents).unwrap();
}

fn csv_service(data: &TempDir, artifacts: &TempDir) -> ForecastService {
    let config = ForecastConfig::default()
        .with_data_dir(data.path())
        .with_artifacts_dir(artifacts.path())
        .with_value_column("close")
        .with_training(TrainingConfig::new(20).with_epochs(1).with_batch_size(32));
    ForecastService::from_config(config).unwrap()
}

#[test]
fn test_train_then_predict_smoke() {
    let data = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    write_csv(data.path(), "NVDA", &sine_series(400));
    let service = csv_service(&data, &artifacts);

    let err = service.predict("nvda", 3).unwrap_err();
    assert!(matches!(err, ForecastError::ArtifactNotFound { .. }), "{err:?}");

    let outcome = service.train("nvda", TrainRequest::default()).unwrap();
    assert_eq!(outcome.key, "NVDA");
    assert_eq!(outcome.n_observations_used, 400);
    assert_eq!(outcome.version, 1);
    assert!(outcome.final_loss.is_some());

    let forecast = service.predict(" nvda ", 3).unwrap();
    assert_eq!(forecast.key, "NVDA");
    assert_eq!(forecast.steps, 3);
    assert_eq!(forecast.predictions.len(), 3);
    assert!(forecast.predictions.iter().all(|v| v.is_finite()));

    let info = service.model_info("NVDA").unwrap();
    assert_eq!(info.lookback, 20);
    assert_eq!(info.metadata.version, 1);
    assert_eq!(service.trained_keys().unwrap(), vec!["NVDA".to_string()]);
}

#[test]
fn test_short_series_is_rejected() {
    let data = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    write_csv(data.path(), "TINY", &sine_series(10));
    let service = csv_service(&data, &artifacts);

    let err = service
        .train("TINY", TrainRequest::default().with_lookback(60))
        .unwrap_err();
    match err {
        ForecastError::InsufficientData { key, observed, required } => {
            assert_eq!(key, "TINY");
            assert_eq!(observed, 10);
            assert_eq!(required, 65);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!artifacts.path().join("TINY").exists());
}

#[test]
fn test_missing_series() {
    let data = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    let service = csv_service(&data, &artifacts);

    let err = service.train("NONE", TrainRequest::default()).unwrap_err();
    assert!(matches!(err, ForecastError::SeriesNotFound { .. }));
}

#[test]
fn test_request_bounds() {
    let data = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    write_csv(data.path(), "K", &sine_series(300));
    let service = csv_service(&data, &artifacts);

    for lookback in [0, 4, 201] {
        let err = service
            .train("K", TrainRequest::default().with_lookback(lookback))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { .. }), "lookback {}", lookback);
    }
    for steps in [0, 31] {
        let err = service.predict("K", steps).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { .. }), "steps {}", steps);
    }
    assert!(service.train("K", TrainRequest::default().with_lookback(5)).is_ok());
    assert!(service.train("K", TrainRequest::default().with_lookback(200)).is_ok());
}

#[test]
fn test_invalid_key() {
    let data = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    let service = csv_service(&data, &artifacts);

    let err = service.predict("not a key", 3).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter { ref name, .. } if name == "key"));
}

#[test]
fn test_retrain_serves_new_version() {
    let data = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    write_csv(data.path(), "K", &sine_series(300));
    let service = csv_service(&data, &artifacts);

    service.train("K", TrainRequest::default()).unwrap();
    service.predict("K", 5).unwrap();
    assert_eq!(service.model_info("K").unwrap().metadata.version, 1);

    let outcome = service
        .train("K", TrainRequest::default().with_epochs(2))
        .unwrap();
    assert_eq!(outcome.version, 2);
    assert_eq!(service.model_info("K").unwrap().metadata.version, 2);
    assert_eq!(service.model_info("K").unwrap().metadata.epochs, 2);
}

#[test]
fn test_concurrent_training_under_reject_policy() {
    let source = InMemorySeriesSource::new()
        .with_series("NVDA", sine_series(600))
        .unwrap();
    let config = ForecastConfig::default()
        .with_lock_policy(LockPolicy::Reject)
        .with_training(
            TrainingConfig::new(50)
                .with_epochs(5)
                .with_batch_size(1)
                .with_architecture(Architecture::Recurrent { hidden_size: 8 }),
        );
    let service = Arc::new(
        ForecastService::new(config, Arc::new(source), Arc::new(MemoryArtifactStore::new()))
            .unwrap(),
    );

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.train("NVDA", TrainRequest::default())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(ForecastError::TrainingInProgress { .. })))
        .count();

    assert!(succeeded >= 1);
    assert!(rejected >= 1, "at least one concurrent run should be rejected");
    assert_eq!(succeeded + rejected, 4);
}
