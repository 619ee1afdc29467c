//! Kolosal Forecast - Single-series sequence-model forecasting
//!
//! This crate trains a small sequence model per series key on min-max
//! normalized sliding windows and forecasts several steps ahead by feeding
//! each prediction back as the newest input.
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Min-max scaling and sliding-window construction
//! - [`training`] - Sequence models, optimizers and the training loop
//! - [`inference`] - Autoregressive rollout and the predictor
//!
//! ## Infrastructure
//! - [`artifacts`] - Versioned, atomically published artifact bundles
//! - [`cache`] - LRU/TTL cache of loaded bundles
//! - [`data`] - Series sources (in-memory, CSV)
//!
//! ## Services
//! - [`service`] - Keyed training and prediction entrypoints
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kolosal_forecast::prelude::*;
//!
//! let source = InMemorySeriesSource::new()
//!     .with_series("NVDA", (0..300).map(|i| (i as f64 * 0.1).sin() + 10.0).collect())?;
//! let service = ForecastService::new(
//!     ForecastConfig::default(),
//!     Arc::new(source),
//!     Arc::new(MemoryArtifactStore::new()),
//! )?;
//!
//! service.train("NVDA", TrainRequest::default().with_lookback(20))?;
//! let forecast = service.predict("NVDA", 5)?;
//! assert_eq!(forecast.predictions.len(), 5);
//! # Ok::<(), kolosal_forecast::error::ForecastError>(())
//! ```

pub mod error;

pub mod preprocessing;
pub mod training;
pub mod inference;

pub mod artifacts;
pub mod cache;
pub mod data;

pub mod config;
pub mod service;
pub mod cli;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifacts::{
        ArtifactBundle, ArtifactStore, BundleMetadata, FileArtifactStore, MemoryArtifactStore,
    };
    pub use crate::cache::BundleCache;
    pub use crate::config::ForecastConfig;
    pub use crate::data::{CsvSeriesSource, InMemorySeriesSource, SeriesSource};
    pub use crate::error::{ForecastError, Result};
    pub use crate::inference::{Forecast, Predictor};
    pub use crate::preprocessing::{build_windows, MinMaxScaler, ScalingState, WindowSet};
    pub use crate::service::{ForecastOutcome, ForecastService, TrainOutcome, TrainRequest};
    pub use crate::training::{
        Architecture, CancellationToken, LockPolicy, OptimizerKind, SequenceModel, Trainer,
        TrainingConfig, TrainingReport,
    };
}
