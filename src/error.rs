//! Error types for the Kolosal forecasting engine

use thiserror::Error;

/// Result type alias for forecasting operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Placeholder key used by components that operate on a bare series and do
/// not know which key they serve. Replaced via [`ForecastError::for_key`].
pub const UNKEYED: &str = "<series>";

/// Main error type for the forecasting engine
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data for '{key}': observed {observed} observations, required at least {required}")]
    InsufficientData {
        key: String,
        observed: usize,
        required: usize,
    },

    #[error("Scaler not fitted for '{key}'")]
    NotFitted { key: String },

    #[error("No trained artifact for '{key}': {reason}")]
    ArtifactNotFound { key: String, reason: String },

    #[error("Invalid parameter for '{key}': {name} = {value}, {reason}")]
    InvalidParameter {
        key: String,
        name: String,
        value: String,
        reason: String,
    },

    #[error("Degenerate series for '{key}': every observation equals {value}")]
    DegenerateSeries { key: String, value: f64 },

    #[error("Training already in progress for '{key}'")]
    TrainingInProgress { key: String },

    #[error("Training aborted for '{key}' after {epochs_completed} epochs: {reason}")]
    TrainingAborted {
        key: String,
        epochs_completed: usize,
        reason: String,
    },

    #[error("No series available for '{key}'")]
    SeriesNotFound { key: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ForecastError {
    /// Insufficient-data error for an unkeyed series
    pub fn insufficient_data(observed: usize, required: usize) -> Self {
        ForecastError::InsufficientData {
            key: UNKEYED.to_string(),
            observed,
            required,
        }
    }

    /// Not-fitted error for an unkeyed scaler
    pub fn not_fitted() -> Self {
        ForecastError::NotFitted {
            key: UNKEYED.to_string(),
        }
    }

    /// Invalid-parameter error for an unkeyed operation
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ForecastError::InvalidParameter {
            key: UNKEYED.to_string(),
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the series key to an error raised by a key-agnostic component.
    /// Errors that already name a key are left untouched.
    pub fn for_key(self, key: &str) -> Self {
        match self {
            ForecastError::InsufficientData { key: k, observed, required } if k == UNKEYED => {
                ForecastError::InsufficientData { key: key.to_string(), observed, required }
            }
            ForecastError::InvalidParameter { key: k, name, value, reason } if k == UNKEYED => {
                ForecastError::InvalidParameter { key: key.to_string(), name, value, reason }
            }
            ForecastError::NotFitted { key: k } if k == UNKEYED => {
                ForecastError::NotFitted { key: key.to_string() }
            }
            ForecastError::DegenerateSeries { key: k, value } if k == UNKEYED => {
                ForecastError::DegenerateSeries { key: key.to_string(), value }
            }
            other => other,
        }
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ForecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForecastError::DataError(format!("invalid shape: {}", err))
    }
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ForecastError::DataError(err.to_string())
    }
}
