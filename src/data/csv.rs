//! CSV-backed series source: one `<KEY>.csv` per key

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use super::SeriesSource;
use crate::artifacts::normalize_key;
use crate::error::{ForecastError, Result};

/// Reads the value column of `<dir>/<KEY>.csv`, in file order
#[derive(Debug, Clone)]
pub struct CsvSeriesSource {
    dir: PathBuf,
    value_column: String,
}

impl CsvSeriesSource {
    pub fn new(dir: impl AsRef<Path>, value_column: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            value_column: value_column.into(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", key))
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    fn read_frame(path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?;
        Ok(df)
    }
}

impl SeriesSource for CsvSeriesSource {
    fn load_series(&self, key: &str) -> Result<Vec<f64>> {
        let key = normalize_key(key)?;
        let path = self.path_for(&key);
        if !path.is_file() {
            return Err(ForecastError::SeriesNotFound { key });
        }

        let df = Self::read_frame(&path)?;
        let column = df.column(&self.value_column).map_err(|_| {
            ForecastError::DataError(format!(
                "column '{}' not found in {}",
                self.value_column,
                path.display()
            ))
        })?;

        let values = column.cast(&DataType::Float64)?;
        let series = values
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "missing '{}' value at row {} of {}",
                        self.value_column,
                        row + 1,
                        path.display()
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        if series.is_empty() {
            return Err(ForecastError::SeriesNotFound { key });
        }

        debug!(key = %key, rows = series.len(), path = %path.display(), "Loaded series");
        Ok(series)
    }
}
