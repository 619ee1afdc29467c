//! Elman recurrent network
//!
//! Reads the window one value at a time:
//! `h_t = tanh(w_in * x_t + W_rec h_{t-1} + b)`, starting from `h_0 = 0`,
//! and predicts `w_out · h_L + b_out`. Gradients are computed by
//! backpropagation through time over the whole window.

use std::iter;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use super::model::{xavier, Architecture, SequenceModel};
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
pub struct RecurrentNetwork {
    lookback: usize,
    hidden_size: usize,
    w_in: Array1<f64>,
    /// `w_rec[[i, j]]` feeds hidden unit `j` at `t - 1` into unit `i` at `t`
    w_rec: Array2<f64>,
    bias: Array1<f64>,
    w_out: Array1<f64>,
    b_out: f64,
}

impl RecurrentNetwork {
    pub fn new<R: Rng>(lookback: usize, hidden_size: usize, rng: &mut R) -> Self {
        let h = hidden_size;
        let w_in: Array1<f64> = xavier(rng, 1, h, h).into();
        let rec = xavier(rng, h, h, h * h);
        let w_rec = Array2::from_shape_fn((h, h), |(i, j)| rec[i * h + j]);
        let w_out: Array1<f64> = xavier(rng, h, 1, h).into();

        Self {
            lookback,
            hidden_size: h,
            w_in,
            w_rec,
            bias: Array1::zeros(h),
            w_out,
            b_out: 0.0,
        }
    }

    pub fn from_weights(lookback: usize, hidden_size: usize, weights: &[f64]) -> Result<Self> {
        let h = hidden_size;
        let expected = h * h + 3 * h + 1;
        if weights.len() != expected {
            return Err(ForecastError::SerializationError(format!(
                "recurrent network expects {} weights, found {}",
                expected,
                weights.len()
            )));
        }

        let (w_in, rest) = weights.split_at(h);
        let (w_rec, rest) = rest.split_at(h * h);
        let (bias, rest) = rest.split_at(h);
        let (w_out, rest) = rest.split_at(h);

        Ok(Self {
            lookback,
            hidden_size: h,
            w_in: Array1::from(w_in.to_vec()),
            w_rec: Array2::from_shape_vec((h, h), w_rec.to_vec())?,
            bias: Array1::from(bias.to_vec()),
            w_out: Array1::from(w_out.to_vec()),
            b_out: rest[0],
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Hidden states `h_0..=h_L`, with `h_0` the zero state
    fn hidden_states(&self, window: ArrayView1<'_, f64>) -> Vec<Array1<f64>> {
        let mut states = Vec::with_capacity(window.len() + 1);
        states.push(Array1::zeros(self.hidden_size));

        for &x in window.iter() {
            let prev = &states[states.len() - 1];
            let pre = &self.w_in * x + self.w_rec.dot(prev) + &self.bias;
            states.push(pre.mapv(f64::tanh));
        }
        states
    }
}

impl SequenceModel for RecurrentNetwork {
    fn architecture(&self) -> Architecture {
        Architecture::Recurrent {
            hidden_size: self.hidden_size,
        }
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn forward(&self, window: ArrayView1<'_, f64>) -> f64 {
        let states = self.hidden_states(window);
        self.w_out.dot(&states[states.len() - 1]) + self.b_out
    }

    fn sample_gradient(&self, window: ArrayView1<'_, f64>, target: f64) -> (f64, Array1<f64>) {
        let h = self.hidden_size;
        let states = self.hidden_states(window);
        let last = &states[states.len() - 1];

        let err = self.w_out.dot(last) + self.b_out - target;
        let d_out = 2.0 * err;

        let g_w_out = last * d_out;
        let g_b_out = d_out;
        let mut g_w_in = Array1::<f64>::zeros(h);
        let mut g_w_rec = Array2::<f64>::zeros((h, h));
        let mut g_bias = Array1::<f64>::zeros(h);

        // Backpropagation through time
        let mut dh = &self.w_out * d_out;
        for t in (1..states.len()).rev() {
            let da = &dh * &states[t].mapv(|v| 1.0 - v * v);
            g_w_in.scaled_add(window[t - 1], &da);
            g_w_rec += &da
                .view()
                .insert_axis(Axis(1))
                .dot(&states[t - 1].view().insert_axis(Axis(0)));
            g_bias += &da;
            dh = self.w_rec.t().dot(&da);
        }

        let gradient = g_w_in
            .iter()
            .chain(g_w_rec.iter())
            .chain(g_bias.iter())
            .chain(g_w_out.iter())
            .chain(iter::once(&g_b_out))
            .copied()
            .collect();

        (err * err, gradient)
    }

    fn flat_weights(&self) -> Array1<f64> {
        self.w_in
            .iter()
            .chain(self.w_rec.iter())
            .chain(self.bias.iter())
            .chain(self.w_out.iter())
            .chain(iter::once(&self.b_out))
            .copied()
            .collect()
    }

    fn apply_gradient_step(&mut self, update: &Array1<f64>) {
        let params = self
            .w_in
            .iter_mut()
            .chain(self.w_rec.iter_mut())
            .chain(self.bias.iter_mut())
            .chain(self.w_out.iter_mut())
            .chain(iter::once(&mut self.b_out));
        for (w, u) in params.zip(update.iter()) {
            *w += u;
        }
    }
}
