//! Series sources
//!
//! The forecasting core consumes an already-cleaned, chronologically sorted
//! series per key. Sources hand that series over; they do not reorder,
//! resample or fill gaps.

mod csv;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::artifacts::normalize_key;
use crate::error::{ForecastError, Result};

pub use csv::CsvSeriesSource;

/// Provider of the observed series for a key
pub trait SeriesSource: Send + Sync {
    /// Full observed series for `key`, oldest first.
    ///
    /// An unknown key or an empty series is `SeriesNotFound`.
    fn load_series(&self, key: &str) -> Result<Vec<f64>>;
}

/// Series held in memory, keyed by normalized key
#[derive(Debug, Default)]
pub struct InMemorySeriesSource {
    series: RwLock<HashMap<String, Vec<f64>>>,
}

impl InMemorySeriesSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the series for `key`
    pub fn insert(&self, key: &str, values: Vec<f64>) -> Result<()> {
        let key = normalize_key(key)?;
        self.series.write().insert(key, values);
        Ok(())
    }

    /// Append observations to the series for `key`
    pub fn extend(&self, key: &str, values: &[f64]) -> Result<()> {
        let key = normalize_key(key)?;
        self.series
            .write()
            .entry(key)
            .or_default()
            .extend_from_slice(values);
        Ok(())
    }

    pub fn with_series(self, key: &str, values: Vec<f64>) -> Result<Self> {
        self.insert(key, values)?;
        Ok(self)
    }
}

impl SeriesSource for InMemorySeriesSource {
    fn load_series(&self, key: &str) -> Result<Vec<f64>> {
        let key = normalize_key(key)?;
        match self.series.read().get(&key) {
            Some(values) if !values.is_empty() => Ok(values.clone()),
            _ => Err(ForecastError::SeriesNotFound { key }),
        }
    }
}
