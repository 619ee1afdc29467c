//! Linear autoregression: `y = w · window + b`

use ndarray::{Array1, ArrayView1};
use rand::Rng;

use super::model::{xavier, Architecture, SequenceModel};
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
pub struct LinearAutoregressor {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearAutoregressor {
    pub fn new<R: Rng>(lookback: usize, rng: &mut R) -> Self {
        Self {
            coefficients: xavier(rng, lookback, 1, lookback).into(),
            intercept: 0.0,
        }
    }

    pub fn from_weights(lookback: usize, weights: &[f64]) -> Result<Self> {
        if weights.len() != lookback + 1 {
            return Err(ForecastError::SerializationError(format!(
                "linear model expects {} weights, found {}",
                lookback + 1,
                weights.len()
            )));
        }
        Ok(Self {
            coefficients: Array1::from(weights[..lookback].to_vec()),
            intercept: weights[lookback],
        })
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl SequenceModel for LinearAutoregressor {
    fn architecture(&self) -> Architecture {
        Architecture::Linear
    }

    fn lookback(&self) -> usize {
        self.coefficients.len()
    }

    fn forward(&self, window: ArrayView1<'_, f64>) -> f64 {
        self.coefficients.dot(&window) + self.intercept
    }

    fn sample_gradient(&self, window: ArrayView1<'_, f64>, target: f64) -> (f64, Array1<f64>) {
        let err = self.forward(window) - target;
        let d = 2.0 * err;
        let gradient = window
            .iter()
            .map(|x| d * x)
            .chain(std::iter::once(d))
            .collect();
        (err * err, gradient)
    }

    fn flat_weights(&self) -> Array1<f64> {
        self.coefficients
            .iter()
            .copied()
            .chain(std::iter::once(self.intercept))
            .collect()
    }

    fn apply_gradient_step(&mut self, update: &Array1<f64>) {
        let n = self.coefficients.len();
        for (c, u) in self.coefficients.iter_mut().zip(update.iter()) {
            *c += u;
        }
        if let Some(u) = update.get(n) {
            self.intercept += u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_forward() {
        let model = LinearAutoregressor::from_weights(3, &[0.5, 0.25, 0.25, 0.1]).unwrap();
        let y = model.forward(array![1.0, 2.0, 2.0].view());
        assert!((y - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_learns_persistence() {
        // Next value equals the last value of the window
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let mut model = LinearAutoregressor::new(2, &mut rng);
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i + j) as f64 * 0.37).sin() * 0.5 + 0.5);
        let y: Array1<f64> = x.column(1).to_owned();

        let (initial, _) = model.loss_and_gradient(x.view(), y.view());
        for _ in 0..3000 {
            let (_, grad) = model.loss_and_gradient(x.view(), y.view());
            model.apply_gradient_step(&(grad * -0.2));
        }
        let (loss, _) = model.loss_and_gradient(x.view(), y.view());
        assert!(loss < initial * 0.05, "loss {} (initial {})", loss, initial);
    }
}
