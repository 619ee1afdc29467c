//! Feed-forward network over the lookback window
//!
//! A multi-layer perceptron that sees the whole window as one input vector.
//! Batched forward and backward passes run as matrix products.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;

use super::model::{xavier, Activation, Architecture, SequenceModel};
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
pub struct WindowMlp {
    lookback: usize,
    hidden_layers: Vec<usize>,
    activation: Activation,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
}

impl WindowMlp {
    pub fn new<R: Rng>(
        lookback: usize,
        hidden_layers: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let sizes = layer_sizes(lookback, hidden_layers);
        let mut weights = Vec::with_capacity(sizes.len() - 1);
        let mut biases = Vec::with_capacity(sizes.len() - 1);

        for pair in sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let values = xavier(rng, n_in, n_out, n_in * n_out);
            weights.push(Array2::from_shape_fn((n_in, n_out), |(i, j)| values[i * n_out + j]));
            biases.push(Array1::zeros(n_out));
        }

        Self {
            lookback,
            hidden_layers: hidden_layers.to_vec(),
            activation,
            weights,
            biases,
        }
    }

    pub fn from_weights(
        lookback: usize,
        hidden_layers: &[usize],
        activation: Activation,
        flat: &[f64],
    ) -> Result<Self> {
        let sizes = layer_sizes(lookback, hidden_layers);
        let mut weights = Vec::with_capacity(sizes.len() - 1);
        let mut biases = Vec::with_capacity(sizes.len() - 1);
        let mut offset = 0;

        for pair in sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let end = offset + n_in * n_out + n_out;
            if end > flat.len() {
                return Err(ForecastError::SerializationError(format!(
                    "mlp weights truncated at layer {}x{}",
                    n_in, n_out
                )));
            }
            let w = &flat[offset..offset + n_in * n_out];
            let b = &flat[offset + n_in * n_out..end];
            weights.push(Array2::from_shape_vec((n_in, n_out), w.to_vec())?);
            biases.push(Array1::from(b.to_vec()));
            offset = end;
        }

        Ok(Self {
            lookback,
            hidden_layers: hidden_layers.to_vec(),
            activation,
            weights,
            biases,
        })
    }

    /// Forward pass over a batch, keeping every layer's activations and
    /// pre-activations for backpropagation.
    fn forward_layers(&self, x: ArrayView2<'_, f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.to_owned()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len() - 1;

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                let act = self.activation;
                z.mapv(|v| act.apply(v))
            } else {
                z.clone() // Linear output for regression
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y: ArrayView1<'_, f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.len() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // d(MSE)/d(output)
        let y_2d = y.insert_axis(Axis(1));
        let output = &activations[activations.len() - 1];
        let mut delta = (output - &y_2d) * (2.0 / n);

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                let act = self.activation;
                let d_act = z_values[i - 1].mapv(|v| act.derivative(v));
                delta = delta.dot(&self.weights[i].t()) * d_act;
            }
        }

        gradients.reverse();
        gradients
    }

    fn flatten(gradients: &[(Array2<f64>, Array1<f64>)]) -> Array1<f64> {
        gradients
            .iter()
            .flat_map(|(w, b)| w.iter().chain(b.iter()))
            .copied()
            .collect()
    }
}

impl SequenceModel for WindowMlp {
    fn architecture(&self) -> Architecture {
        Architecture::Mlp {
            hidden_layers: self.hidden_layers.clone(),
            activation: self.activation,
        }
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn forward(&self, window: ArrayView1<'_, f64>) -> f64 {
        let batch = window.insert_axis(Axis(0));
        self.forward_batch(batch)[0]
    }

    fn forward_batch(&self, windows: ArrayView2<'_, f64>) -> Array1<f64> {
        let (activations, _) = self.forward_layers(windows);
        activations[activations.len() - 1].column(0).to_owned()
    }

    fn sample_gradient(&self, window: ArrayView1<'_, f64>, target: f64) -> (f64, Array1<f64>) {
        let windows = window.insert_axis(Axis(0));
        let targets = Array1::from(vec![target]);
        self.loss_and_gradient(windows, targets.view())
    }

    fn loss_and_gradient(
        &self,
        windows: ArrayView2<'_, f64>,
        targets: ArrayView1<'_, f64>,
    ) -> (f64, Array1<f64>) {
        if windows.nrows() == 0 {
            return (0.0, Array1::zeros(self.n_parameters()));
        }

        let (activations, z_values) = self.forward_layers(windows);
        let output = activations[activations.len() - 1].column(0);
        let loss = output
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / targets.len() as f64;

        let gradients = self.backward(targets, &activations, &z_values);
        (loss, Self::flatten(&gradients))
    }

    fn flat_weights(&self) -> Array1<f64> {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .flat_map(|(w, b)| w.iter().chain(b.iter()))
            .copied()
            .collect()
    }

    fn apply_gradient_step(&mut self, update: &Array1<f64>) {
        let params = self
            .weights
            .iter_mut()
            .zip(self.biases.iter_mut())
            .flat_map(|(w, b)| w.iter_mut().chain(b.iter_mut()));
        for (p, u) in params.zip(update.iter()) {
            *p += u;
        }
    }
}

fn layer_sizes(lookback: usize, hidden_layers: &[usize]) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(hidden_layers.len() + 2);
    sizes.push(lookback);
    sizes.extend_from_slice(hidden_layers);
    sizes.push(1);
    sizes
}
