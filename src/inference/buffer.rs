//! Fixed-length rolling window for autoregressive rollout.

use ndarray::ArrayView1;

/// A window of exactly `capacity` values, oldest first.
///
/// Values are mirrored into a backing store of twice the capacity, so the
/// current window is always one contiguous slice and sliding never
/// allocates or shifts.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    data: Vec<f64>,
    capacity: usize,
    /// Position of the oldest value
    head: usize,
}

impl RollingWindow {
    /// Build a full window from the last `capacity` values of `history`.
    ///
    /// Returns `None` when `capacity` is zero or `history` is shorter.
    pub fn from_history(history: &[f64], capacity: usize) -> Option<Self> {
        if capacity == 0 || history.len() < capacity {
            return None;
        }
        let recent = &history[history.len() - capacity..];
        let mut data = Vec::with_capacity(2 * capacity);
        data.extend_from_slice(recent);
        data.extend_from_slice(recent);
        Some(Self {
            data,
            capacity,
            head: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    /// Drop the oldest value and append `value` as the newest
    pub fn push(&mut self, value: f64) {
        let slot = self.head;
        self.data[slot] = value;
        self.data[slot + self.capacity] = value;
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data[self.head..self.head + self.capacity]
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(self.as_slice())
    }

    pub fn newest(&self) -> f64 {
        self.as_slice()[self.capacity - 1]
    }
}
