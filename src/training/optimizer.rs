//! Gradient-descent update rules over a flat parameter vector

use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};

use super::model::SequenceModel;

/// Update rule used by the training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// Plain SGD with classical momentum
    Sgd { momentum: f64 },
    /// Adam with bias-corrected moment estimates
    Adam { beta1: f64, beta2: f64, epsilon: f64 },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Adam {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl OptimizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd { .. } => "sgd",
            OptimizerKind::Adam { .. } => "adam",
        }
    }
}

/// Optimizer state for one training run. Not persisted.
#[derive(Debug, Clone)]
pub struct Optimizer {
    kind: OptimizerKind,
    learning_rate: f64,
    /// Momentum buffer (SGD) or first moment (Adam)
    first: Array1<f64>,
    /// Second moment (Adam only)
    second: Array1<f64>,
    steps: u64,
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, learning_rate: f64, n_parameters: usize) -> Self {
        Self {
            kind,
            learning_rate,
            first: Array1::zeros(n_parameters),
            second: Array1::zeros(n_parameters),
            steps: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Turn a gradient into the delta to add to the parameters
    pub fn update(&mut self, gradient: &Array1<f64>) -> Array1<f64> {
        self.steps += 1;
        let lr = self.learning_rate;

        match self.kind {
            OptimizerKind::Sgd { momentum } => {
                self.first = &self.first * momentum - gradient * lr;
                self.first.clone()
            }
            OptimizerKind::Adam { beta1, beta2, epsilon } => {
                Zip::from(&mut self.first)
                    .and(&mut self.second)
                    .and(gradient)
                    .for_each(|m, v, &g| {
                        *m = beta1 * *m + (1.0 - beta1) * g;
                        *v = beta2 * *v + (1.0 - beta2) * g * g;
                    });

                let t = self.steps as i32;
                let m_corr = 1.0 - beta1.powi(t);
                let v_corr = 1.0 - beta2.powi(t);

                let mut delta = Array1::zeros(gradient.len());
                Zip::from(&mut delta)
                    .and(&self.first)
                    .and(&self.second)
                    .for_each(|d, &m, &v| {
                        let m_hat = m / m_corr;
                        let v_hat = v / v_corr;
                        *d = -lr * m_hat / (v_hat.sqrt() + epsilon);
                    });
                delta
            }
        }
    }

    /// Apply one update to `model` from a gradient of its loss
    pub fn step(&mut self, model: &mut dyn SequenceModel, gradient: &Array1<f64>) {
        let delta = self.update(gradient);
        model.apply_gradient_step(&delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sgd_without_momentum() {
        let mut opt = Optimizer::new(OptimizerKind::Sgd { momentum: 0.0 }, 0.5, 2);
        let delta = opt.update(&array![1.0, -2.0]);
        assert_eq!(delta, array![-0.5, 1.0]);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let mut opt = Optimizer::new(OptimizerKind::Sgd { momentum: 0.9 }, 0.1, 1);
        opt.update(&array![1.0]);
        let delta = opt.update(&array![1.0]);
        assert!((delta[0] - (-0.19)).abs() < 1e-12);
    }

    #[test]
    fn test_adam_first_step_has_learning_rate_magnitude() {
        let mut opt = Optimizer::new(OptimizerKind::default(), 1e-3, 3);
        let delta = opt.update(&array![10.0, -0.01, 3.0]);
        for (d, g) in delta.iter().zip([10.0, -0.01, 3.0]) {
            assert!((d.abs() - 1e-3).abs() < 1e-6);
            assert!(d.signum() == -f64::signum(g));
        }
        assert_eq!(opt.steps(), 1);
    }
}
