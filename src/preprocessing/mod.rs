//! Series preprocessing
//!
//! Provides the two transformations every forecasting run goes through:
//! - Min-max scaling with an exact inverse
//! - Fixed-width sliding windows paired with the next-step target

mod scaler;
mod windows;

pub use scaler::{MinMaxScaler, ScalingState};
pub use windows::{build_windows, Window, WindowSet};
