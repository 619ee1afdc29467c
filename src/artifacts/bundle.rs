//! Artifact bundles: everything needed to forecast one key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::preprocessing::{MinMaxScaler, ScalingState};
use crate::training::{restore_model, ModelParameters, SequenceModel};

/// Provenance of a published bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub key: String,
    /// Assigned by the store on publish, starting at 1
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub architecture: String,
    pub n_observations: usize,
    pub n_windows: usize,
    pub epochs: usize,
    /// Mean training loss of the last epoch (None when not finite)
    pub final_loss: Option<f64>,
    pub validation_loss: Option<f64>,
}

impl BundleMetadata {
    pub fn new(key: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version: 0,
            trained_at: Utc::now(),
            architecture: architecture.into(),
            n_observations: 0,
            n_windows: 0,
            epochs: 0,
            final_loss: None,
            validation_loss: None,
        }
    }
}

/// JSON half of a persisted bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingRecord {
    pub min: f64,
    pub max: f64,
    pub lookback: usize,
    pub metadata: BundleMetadata,
}

/// Immutable snapshot of a trained model and the normalization it was
/// trained under.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub parameters: ModelParameters,
    pub scaling: ScalingState,
    pub lookback: usize,
    pub metadata: BundleMetadata,
}

impl ArtifactBundle {
    pub fn new(parameters: ModelParameters, scaling: ScalingState, metadata: BundleMetadata) -> Self {
        Self {
            lookback: parameters.lookback,
            parameters,
            scaling,
            metadata,
        }
    }

    pub fn key(&self) -> &str {
        &self.metadata.key
    }

    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    /// Copy of this bundle stamped with a published version
    pub fn with_version(&self, version: u64) -> Self {
        let mut bundle = self.clone();
        bundle.metadata.version = version;
        bundle
    }

    pub fn scaling_record(&self) -> ScalingRecord {
        ScalingRecord {
            min: self.scaling.min,
            max: self.scaling.max,
            lookback: self.lookback,
            metadata: self.metadata.clone(),
        }
    }

    /// Reassemble a bundle from its two persisted halves
    pub fn from_parts(parameters: ModelParameters, record: ScalingRecord) -> Result<Self> {
        if parameters.lookback != record.lookback {
            return Err(ForecastError::ArtifactNotFound {
                key: record.metadata.key.clone(),
                reason: format!(
                    "inconsistent bundle: model lookback {} but scaling lookback {}",
                    parameters.lookback, record.lookback
                ),
            });
        }
        if !(record.min.is_finite() && record.max.is_finite()) || record.min > record.max {
            return Err(ForecastError::SerializationError(format!(
                "invalid scaling state min={} max={}",
                record.min, record.max
            )));
        }

        Ok(Self {
            parameters,
            scaling: ScalingState {
                min: record.min,
                max: record.max,
            },
            lookback: record.lookback,
            metadata: record.metadata,
        })
    }

    /// Scaler fixed to the training-time state
    pub fn scaler(&self) -> MinMaxScaler {
        MinMaxScaler::from_state(self.scaling)
    }

    pub fn model(&self) -> Result<Box<dyn SequenceModel>> {
        restore_model(&self.parameters)
    }
}
