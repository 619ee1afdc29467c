//! Inference engine module
//!
//! Loads the published bundle for a key and rolls its model forward over a
//! fixed-length window of recent observations.

mod buffer;
mod engine;

pub use buffer::RollingWindow;
pub use engine::{rollout, Forecast, Predictor};
