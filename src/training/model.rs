//! Sequence model capability
//!
//! A sequence model is any trainable function from a window of `lookback`
//! normalized values to one predicted normalized value. The trainer and the
//! predictor only talk to models through [`SequenceModel`], so the network
//! behind it can be swapped without touching either loop.

use std::fmt::Debug;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::linear::LinearAutoregressor;
use super::mlp::WindowMlp;
use super::recurrent::RecurrentNetwork;
use crate::error::{ForecastError, Result};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity)
    Linear,
}

impl Activation {
    #[inline]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Activation::ReLU => v.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-v).exp()),
            Activation::Tanh => v.tanh(),
            Activation::Linear => v,
        }
    }

    /// Derivative with respect to the pre-activation value
    #[inline]
    pub fn derivative(self, v: f64) -> f64 {
        match self {
            Activation::ReLU => {
                if v > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => {
                let s = self.apply(v);
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = v.tanh();
                1.0 - t * t
            }
            Activation::Linear => 1.0,
        }
    }
}

/// Network family and its shape hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Architecture {
    /// Elman recurrent cell over the window, linear head on the last state
    Recurrent { hidden_size: usize },
    /// Feed-forward network over the whole window
    Mlp {
        hidden_layers: Vec<usize>,
        activation: Activation,
    },
    /// Linear autoregression `w · window + b`
    Linear,
}

impl Default for Architecture {
    fn default() -> Self {
        Architecture::Recurrent { hidden_size: 32 }
    }
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Recurrent { .. } => "recurrent",
            Architecture::Mlp { .. } => "mlp",
            Architecture::Linear => "linear",
        }
    }

    /// Number of trainable scalars for a given lookback
    pub fn parameter_count(&self, lookback: usize) -> usize {
        match self {
            Architecture::Recurrent { hidden_size: h } => h * h + 3 * h + 1,
            Architecture::Mlp { hidden_layers, .. } => {
                let mut sizes = vec![lookback];
                sizes.extend(hidden_layers.iter().copied());
                sizes.push(1);
                sizes.windows(2).map(|p| p[0] * p[1] + p[1]).sum()
            }
            Architecture::Linear => lookback + 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Architecture::Recurrent { hidden_size } if *hidden_size == 0 => Err(
                ForecastError::invalid_parameter("hidden_size", hidden_size, "must be at least 1"),
            ),
            Architecture::Mlp { hidden_layers, .. } if hidden_layers.contains(&0) => {
                Err(ForecastError::invalid_parameter(
                    "hidden_layers",
                    format!("{:?}", hidden_layers),
                    "every layer needs at least one unit",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Trained state of one sequence model, detached from the model instance.
///
/// This is what gets persisted as the binary half of an artifact bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub architecture: Architecture,
    pub lookback: usize,
    /// Flat parameter vector in the model's own layout
    pub weights: Vec<f64>,
}

/// Capability interface of a trainable window-to-scalar function.
pub trait SequenceModel: Send + Sync + Debug {
    fn architecture(&self) -> Architecture;

    fn lookback(&self) -> usize;

    /// Evaluate the model on one window of exactly `lookback` values
    fn forward(&self, window: ArrayView1<'_, f64>) -> f64;

    /// Squared error on one window and its gradient w.r.t. every parameter,
    /// laid out like [`flat_weights`](Self::flat_weights).
    fn sample_gradient(&self, window: ArrayView1<'_, f64>, target: f64) -> (f64, Array1<f64>);

    /// Current parameters as one flat vector
    fn flat_weights(&self) -> Array1<f64>;

    /// Add `update` (same layout as the flat weights) to the parameters
    fn apply_gradient_step(&mut self, update: &Array1<f64>);

    fn n_parameters(&self) -> usize {
        self.architecture().parameter_count(self.lookback())
    }

    /// Evaluate the model on every row of `windows`
    fn forward_batch(&self, windows: ArrayView2<'_, f64>) -> Array1<f64> {
        windows.rows().into_iter().map(|w| self.forward(w)).collect()
    }

    /// Batch mean-squared error and its gradient.
    ///
    /// Per-sample gradients are computed in parallel and summed in row
    /// order, so the result does not depend on thread scheduling.
    fn loss_and_gradient(
        &self,
        windows: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> (f64, Array1<f64>) {
        let n = windows.nrows();
        let mut gradient = Array1::zeros(self.n_parameters());
        if n == 0 {
            return (0.0, gradient);
        }

        let per_sample: Vec<(f64, Array1<f64>)> = (0..n)
            .into_par_iter()
            .map(|i| self.sample_gradient(windows.row(i), targets[i]))
            .collect();

        let mut loss = 0.0;
        for (sq_err, grad) in per_sample {
            loss += sq_err;
            gradient += &grad;
        }

        let scale = 1.0 / n as f64;
        (loss * scale, gradient * scale)
    }

    /// Snapshot the parameters for persistence
    fn parameters(&self) -> ModelParameters {
        ModelParameters {
            architecture: self.architecture(),
            lookback: self.lookback(),
            weights: self.flat_weights().to_vec(),
        }
    }
}

/// Create a freshly initialized model
pub fn init_model(
    architecture: &Architecture,
    lookback: usize,
    seed: Option<u64>,
) -> Result<Box<dyn SequenceModel>> {
    architecture.validate()?;
    if lookback == 0 {
        return Err(ForecastError::invalid_parameter("lookback", lookback, "must be at least 1"));
    }

    let mut rng = match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    };

    let model: Box<dyn SequenceModel> = match architecture {
        Architecture::Recurrent { hidden_size } => {
            Box::new(RecurrentNetwork::new(lookback, *hidden_size, &mut rng))
        }
        Architecture::Mlp { hidden_layers, activation } => {
            Box::new(WindowMlp::new(lookback, hidden_layers, *activation, &mut rng))
        }
        Architecture::Linear => Box::new(LinearAutoregressor::new(lookback, &mut rng)),
    };
    Ok(model)
}

/// Rebuild a model from persisted parameters
pub fn restore_model(params: &ModelParameters) -> Result<Box<dyn SequenceModel>> {
    params.architecture.validate()?;
    let expected = params.architecture.parameter_count(params.lookback);
    if params.weights.len() != expected {
        return Err(ForecastError::SerializationError(format!(
            "{} model with lookback {} expects {} parameters, found {}",
            params.architecture.name(),
            params.lookback,
            expected,
            params.weights.len()
        )));
    }

    let model: Box<dyn SequenceModel> = match &params.architecture {
        Architecture::Recurrent { hidden_size } => Box::new(RecurrentNetwork::from_weights(
            params.lookback,
            *hidden_size,
            &params.weights,
        )?),
        Architecture::Mlp { hidden_layers, activation } => Box::new(WindowMlp::from_weights(
            params.lookback,
            hidden_layers,
            *activation,
            &params.weights,
        )?),
        Architecture::Linear => {
            Box::new(LinearAutoregressor::from_weights(params.lookback, &params.weights)?)
        }
    };
    Ok(model)
}

/// Xavier/Glorot uniform initialization
pub(crate) fn xavier<R: Rng>(rng: &mut R, n_in: usize, n_out: usize, len: usize) -> Vec<f64> {
    let scale = (2.0 / (n_in + n_out) as f64).sqrt();
    (0..len).map(|_| rng.gen::<f64>() * 2.0 * scale - scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn all_architectures() -> Vec<Architecture> {
        vec![
            Architecture::Recurrent { hidden_size: 4 },
            Architecture::Mlp {
                hidden_layers: vec![6, 3],
                activation: Activation::Tanh,
            },
            Architecture::Linear,
        ]
    }

    #[test]
    fn test_parameter_count_matches_model() {
        for arch in all_architectures() {
            let model = init_model(&arch, 5, Some(7)).unwrap();
            assert_eq!(model.flat_weights().len(), arch.parameter_count(5), "{}", arch.name());
        }
    }

    #[test]
    fn test_restore_round_trip() {
        let window = array![0.1, 0.4, 0.3, 0.9, 0.5];
        for arch in all_architectures() {
            let model = init_model(&arch, 5, Some(11)).unwrap();
            let restored = restore_model(&model.parameters()).unwrap();
            assert_eq!(model.forward(window.view()), restored.forward(window.view()));
        }
    }

    #[test]
    fn test_restore_rejects_wrong_length() {
        let params = ModelParameters {
            architecture: Architecture::Linear,
            lookback: 3,
            weights: vec![0.0; 2],
        };
        assert!(matches!(
            restore_model(&params),
            Err(ForecastError::SerializationError(_))
        ));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let windows = Array2::from_shape_vec(
            (3, 4),
            vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.4, 0.3, 0.2, 0.9, 0.1, 0.6, 0.7],
        )
        .unwrap();
        let targets = array![0.5, 0.1, 0.4];
        let eps = 1e-6;

        for arch in all_architectures() {
            let model = init_model(&arch, 4, Some(3)).unwrap();
            let (_, grad) = model.loss_and_gradient(windows.view(), targets.view());
            let base = model.parameters();

            for k in [0, base.weights.len() / 2, base.weights.len() - 1] {
                let mut plus = base.clone();
                plus.weights[k] += eps;
                let mut minus = base.clone();
                minus.weights[k] -= eps;

                let (lp, _) = restore_model(&plus)
                    .unwrap()
                    .loss_and_gradient(windows.view(), targets.view());
                let (lm, _) = restore_model(&minus)
                    .unwrap()
                    .loss_and_gradient(windows.view(), targets.view());
                let numeric = (lp - lm) / (2.0 * eps);

                assert!(
                    (numeric - grad[k]).abs() < 1e-5,
                    "{} param {}: analytic {} vs numeric {}",
                    arch.name(),
                    k,
                    grad[k],
                    numeric
                );
            }
        }
    }

    #[test]
    fn test_invalid_architecture() {
        let arch = Architecture::Recurrent { hidden_size: 0 };
        assert!(init_model(&arch, 3, None).is_err());
    }
}
