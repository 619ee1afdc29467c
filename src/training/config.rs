//! Training configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::model::Architecture;
use super::optimizer::OptimizerKind;
use crate::error::{ForecastError, Result};

/// Configuration for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of past observations per model input
    pub lookback: usize,

    /// Optimizer step size
    pub learning_rate: f64,

    /// Passes over the window set
    pub epochs: usize,

    /// Windows per gradient step
    pub batch_size: usize,

    /// Network family to train
    pub architecture: Architecture,

    /// Update rule
    pub optimizer: OptimizerKind,

    /// Random seed for weight init and per-epoch shuffling
    pub random_state: Option<u64>,

    /// Windows required beyond the lookback before training is allowed
    pub min_training_examples: usize,

    /// Fraction of the most recent windows held out for validation loss
    pub validation_split: f64,

    /// Wall-clock budget for the whole run (None = unbounded)
    pub time_budget: Option<Duration>,

    /// Log the epoch loss every N epochs (0 = only the last epoch)
    pub log_every: usize,

    /// Fail on a constant series instead of normalizing it to zero
    pub reject_constant_series: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            learning_rate: 1e-3,
            epochs: 20,
            batch_size: 64,
            architecture: Architecture::default(),
            optimizer: OptimizerKind::default(),
            random_state: Some(42),
            min_training_examples: 5,
            validation_split: 0.0,
            time_budget: None,
            log_every: 5,
            reject_constant_series: false,
        }
    }
}

impl TrainingConfig {
    /// Create a configuration with the given lookback
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            ..Default::default()
        }
    }

    /// Builder method to set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Builder method to set number of epochs
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Builder method to set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method to set the network family
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Builder method to set the update rule
    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Builder method to set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Builder method to set the validation holdout fraction
    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    /// Builder method to bound the run's wall-clock time
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Minimum series length accepted for training
    pub fn required_observations(&self) -> usize {
        self.lookback + self.min_training_examples
    }

    /// Check every hyperparameter bound
    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(ForecastError::invalid_parameter("lookback", self.lookback, "must be at least 1"));
        }
        if self.epochs == 0 {
            return Err(ForecastError::invalid_parameter("epochs", self.epochs, "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::invalid_parameter(
                "batch_size",
                self.batch_size,
                "must be at least 1",
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ForecastError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "must be finite and positive",
            ));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ForecastError::invalid_parameter(
                "validation_split",
                self.validation_split,
                "must be in [0, 1)",
            ));
        }
        if let OptimizerKind::Sgd { momentum } = self.optimizer {
            if !(0.0..1.0).contains(&momentum) {
                return Err(ForecastError::invalid_parameter("momentum", momentum, "must be in [0, 1)"));
            }
        }
        self.architecture.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.lookback, 60);
        assert_eq!(config.epochs, 20);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.required_observations(), 65);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::new(10)
            .with_epochs(3)
            .with_batch_size(8)
            .with_learning_rate(0.01)
            .with_architecture(Architecture::Linear);
        assert_eq!(config.lookback, 10);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.architecture, Architecture::Linear);
    }

    #[test]
    fn test_invalid_values() {
        assert!(TrainingConfig::new(0).validate().is_err());
        assert!(TrainingConfig::default().with_epochs(0).validate().is_err());
        assert!(TrainingConfig::default().with_learning_rate(f64::NAN).validate().is_err());
        assert!(TrainingConfig::default().with_validation_split(1.0).validate().is_err());
    }
}
