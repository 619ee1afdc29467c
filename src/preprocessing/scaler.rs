//! Min-max scaling for a single series

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Fitted min-max parameters of one training series.
///
/// `min <= max` always holds; `min == max` only for a constant series, in
/// which case every value normalizes to 0 and denormalizes back to `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingState {
    pub min: f64,
    pub max: f64,
}

impl ScalingState {
    /// Width of the observed range
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Whether the fitted series was constant
    pub fn is_degenerate(&self) -> bool {
        self.range() == 0.0
    }

    /// Map one value into the normalized range
    #[inline]
    pub fn normalize(&self, v: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            (v - self.min) / self.range()
        }
    }

    /// Map one normalized value back to original units
    #[inline]
    pub fn denormalize(&self, v: f64) -> f64 {
        v * self.range() + self.min
    }
}

/// Min-max scaler: `(x - min) / (max - min)`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxScaler {
    state: Option<ScalingState>,
}

impl MinMaxScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Rebuild a scaler from persisted parameters
    pub fn from_state(state: ScalingState) -> Self {
        Self { state: Some(state) }
    }

    /// Fitted parameters, if any
    pub fn state(&self) -> Option<&ScalingState> {
        self.state.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Fit the scaler to a series
    pub fn fit(&mut self, series: &[f64]) -> Result<ScalingState> {
        if series.is_empty() {
            return Err(ForecastError::insufficient_data(0, 1));
        }
        if let Some(idx) = series.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::invalid_parameter(
                format!("series[{}]", idx),
                series[idx],
                "observations must be finite",
            ));
        }

        let (min, max) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        let state = ScalingState { min, max };
        if !state.range().is_finite() {
            return Err(ForecastError::invalid_parameter(
                "series",
                format!("[{}, {}]", min, max),
                "range max - min must be finite",
            ));
        }
        if state.is_degenerate() {
            tracing::warn!(value = min, "constant series, normalizing every observation to 0");
        }

        self.state = Some(state);
        Ok(state)
    }

    /// Normalize a series with the fitted parameters
    pub fn transform(&self, series: &[f64]) -> Result<Vec<f64>> {
        let state = self.state.as_ref().ok_or_else(ForecastError::not_fitted)?;
        Ok(series.iter().map(|&v| state.normalize(v)).collect())
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, series: &[f64]) -> Result<(Vec<f64>, ScalingState)> {
        let state = self.fit(series)?;
        let normalized = self.transform(series)?;
        Ok((normalized, state))
    }

    /// Map normalized values back to original units
    pub fn inverse_transform(&self, normalized: &[f64]) -> Result<Vec<f64>> {
        let state = self.state.as_ref().ok_or_else(ForecastError::not_fitted)?;
        Ok(normalized.iter().map(|&v| state.denormalize(v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        let tol = 1e-6 * b.abs().max(1.0);
        assert!((a - b).abs() <= tol, "{} != {}", a, b);
    }

    #[test]
    fn test_fit_computes_min_max() {
        let series: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let mut scaler = MinMaxScaler::new();
        let state = scaler.fit(&series).unwrap();
        assert_eq!(state, ScalingState { min: 1.0, max: 10.0 });
    }

    #[test]
    fn test_transform_scenario() {
        let series: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let mut scaler = MinMaxScaler::new();
        let (normalized, _) = scaler.fit_transform(&series).unwrap();

        assert_close(normalized[0], 0.0);
        assert_close(normalized[1], 1.0 / 9.0);
        assert_close(normalized[5], 5.0 / 9.0);
        assert_close(normalized[9], 1.0);
    }

    #[test]
    fn test_round_trip() {
        let series = vec![101.5, 99.25, 250.0, -3.75, 0.0, 1e4, 17.125];
        let mut scaler = MinMaxScaler::new();
        let (normalized, _) = scaler.fit_transform(&series).unwrap();
        let restored = scaler.inverse_transform(&normalized).unwrap();

        for (r, s) in restored.iter().zip(series.iter()) {
            assert_close(*r, *s);
        }
    }

    #[test]
    fn test_overflowing_range_rejected() {
        let mut scaler = MinMaxScaler::new();
        let err = scaler.fit(&[-1e308, 0.0, 1e308]).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { ref name, .. } if name == "series"));
        assert!(!scaler.is_fitted());
    }

    #[test]
    fn test_constant_series_normalizes_to_zero() {
        let series = vec![42.0; 12];
        let mut scaler = MinMaxScaler::new();
        let (normalized, state) = scaler.fit_transform(&series).unwrap();

        assert!(state.is_degenerate());
        assert!(normalized.iter().all(|&v| v == 0.0));

        let restored = scaler.inverse_transform(&normalized).unwrap();
        assert!(restored.iter().all(|&v| v == 42.0));
    }

    #[test]
    fn test_empty_series_fails() {
        let mut scaler = MinMaxScaler::new();
        let err = scaler.fit(&[]).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { observed: 0, required: 1, .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut scaler = MinMaxScaler::new();
        let err = scaler.fit(&[1.0, f64::NAN, 3.0]).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { .. }));
    }

    #[test]
    fn test_not_fitted() {
        let scaler = MinMaxScaler::new();
        assert!(matches!(scaler.transform(&[1.0]), Err(ForecastError::NotFitted { .. })));
        assert!(matches!(scaler.inverse_transform(&[0.5]), Err(ForecastError::NotFitted { .. })));
    }

    #[test]
    fn test_from_state_reuses_training_range() {
        let scaler = MinMaxScaler::from_state(ScalingState { min: 10.0, max: 20.0 });
        let normalized = scaler.transform(&[15.0, 25.0]).unwrap();
        assert_close(normalized[0], 0.5);
        // Values outside the training range extrapolate linearly
        assert_close(normalized[1], 1.5);
    }
}
