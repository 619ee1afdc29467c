//! Sliding-window construction over a normalized series

use crate::error::{ForecastError, Result};
use ndarray::{s, Array1, Array2, ArrayView1};

/// One training example: `lookback` consecutive values and the value that
/// immediately follows them.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    /// Index of the first input value in the source series
    pub start: usize,
    pub input: ArrayView1<'a, f64>,
    pub target: f64,
}

impl Window<'_> {
    /// Index of the target value in the source series
    pub fn target_index(&self) -> usize {
        self.start + self.input.len()
    }
}

/// Ordered windows cut from one normalized series.
///
/// Row `i` of `inputs` is `series[i..i + lookback]` and `targets[i]` is
/// `series[i + lookback]`, so row order always follows series order.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    lookback: usize,
    /// Series index of row 0 (non-zero only for the tail of a split)
    offset: usize,
    inputs: Array2<f64>,
    targets: Array1<f64>,
}

impl WindowSet {
    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Input matrix, one window per row
    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    /// Targets aligned with the rows of [`inputs`](Self::inputs)
    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    pub fn get(&self, i: usize) -> Option<Window<'_>> {
        if i >= self.len() {
            return None;
        }
        Some(Window {
            start: self.offset + i,
            input: self.inputs.row(i),
            target: self.targets[i],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Window<'_>> + '_ {
        self.inputs
            .rows()
            .into_iter()
            .zip(self.targets.iter())
            .enumerate()
            .map(move |(i, (input, &target))| Window {
                start: self.offset + i,
                input,
                target,
            })
    }

    /// Split chronologically: the first `n` windows and the rest.
    pub fn split_at(&self, n: usize) -> (WindowSet, WindowSet) {
        let n = n.min(self.len());
        let head = WindowSet {
            lookback: self.lookback,
            offset: self.offset,
            inputs: self.inputs.slice(s![..n, ..]).to_owned(),
            targets: self.targets.slice(s![..n]).to_owned(),
        };
        let tail = WindowSet {
            lookback: self.lookback,
            offset: self.offset + n,
            inputs: self.inputs.slice(s![n.., ..]).to_owned(),
            targets: self.targets.slice(s![n..]).to_owned(),
        };
        (head, tail)
    }
}

/// Cut `series` into `len - lookback` windows of width `lookback`.
///
/// Fails with `InsufficientData` (required `lookback + 1`) when the series
/// is not strictly longer than the lookback.
pub fn build_windows(series: &[f64], lookback: usize) -> Result<WindowSet> {
    if lookback == 0 {
        return Err(ForecastError::invalid_parameter(
            "lookback",
            lookback,
            "must be at least 1",
        ));
    }
    if series.len() <= lookback {
        return Err(ForecastError::insufficient_data(series.len(), lookback + 1));
    }

    let n_windows = series.len() - lookback;
    let inputs = Array2::from_shape_fn((n_windows, lookback), |(i, j)| series[i + j]);
    let targets: Array1<f64> = series[lookback..].iter().copied().collect();

    Ok(WindowSet {
        lookback,
        offset: 0,
        inputs,
        targets,
    })
}
