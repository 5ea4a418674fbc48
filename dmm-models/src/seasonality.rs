//! Seasonal variation in transmission
//!
//! Seasonality is described by a three term Fourier series over a 365 day year,
//!
//! $$ \theta(t) = \max\left(a_0 + \sum_{k=1}^{3} a_k \cos\frac{2\pi k t}{365} + b_k \sin\frac{2\pi k t}{365}, 0.001\right) $$
//!
//! which is normalised by its mean over a year so that seasonality redistributes
//! transmission without changing its annual total.

use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::state::InitialState;
use dmm_core::timeseries::{FloatValue, Time};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const DAYS_PER_YEAR: FloatValue = 365.0;
/// Seasonality never drops transmission below this fraction of the base level
const THETA_FLOOR: FloatValue = 0.001;
/// Number of samples used to evaluate the annual mean
const MEAN_SAMPLES: usize = 3650;

/// Fourier coefficients of the seasonal profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourierCoefficients {
    pub ssa0: FloatValue,
    pub ssa1: FloatValue,
    pub ssa2: FloatValue,
    pub ssa3: FloatValue,
    pub ssb1: FloatValue,
    pub ssb2: FloatValue,
    pub ssb3: FloatValue,
}

impl FourierCoefficients {
    pub const NAMES: [&'static str; 7] = ["ssa0", "ssa1", "ssa2", "ssa3", "ssb1", "ssb2", "ssb3"];

    pub fn from_state(state: &InitialState) -> DmmResult<Self> {
        Ok(Self {
            ssa0: state.scalar("ssa0")?,
            ssa1: state.scalar("ssa1")?,
            ssa2: state.scalar("ssa2")?,
            ssa3: state.scalar("ssa3")?,
            ssb1: state.scalar("ssb1")?,
            ssb2: state.scalar("ssb2")?,
            ssb3: state.scalar("ssb3")?,
        })
    }

    /// Coefficients paired with their parameter names
    pub fn named(&self) -> [(&'static str, FloatValue); 7] {
        [
            ("ssa0", self.ssa0),
            ("ssa1", self.ssa1),
            ("ssa2", self.ssa2),
            ("ssa3", self.ssa3),
            ("ssb1", self.ssb1),
            ("ssb2", self.ssb2),
            ("ssb3", self.ssb3),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Seasonality {
    coefficients: FourierCoefficients,
    mean: FloatValue,
}

impl Seasonality {
    pub fn new(coefficients: FourierCoefficients) -> DmmResult<Self> {
        if let Some((name, value)) = coefficients
            .named()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(DmmError::InvalidParameter {
                name: name.to_string(),
                reason: format!("seasonality coefficient must be finite, got {}", value),
            });
        }

        let mut seasonality = Self {
            coefficients,
            mean: 1.0,
        };
        let step = DAYS_PER_YEAR / MEAN_SAMPLES as FloatValue;
        let total: FloatValue = (0..MEAN_SAMPLES)
            .map(|i| seasonality.theta(i as Time * step))
            .sum();
        seasonality.mean = total / MEAN_SAMPLES as FloatValue;
        Ok(seasonality)
    }

    pub fn from_state(state: &InitialState) -> DmmResult<Self> {
        Self::new(FourierCoefficients::from_state(state)?)
    }

    pub fn coefficients(&self) -> &FourierCoefficients {
        &self.coefficients
    }

    /// Mean of `theta` over a year
    pub fn mean(&self) -> FloatValue {
        self.mean
    }

    /// Unnormalised seasonal profile
    pub fn theta(&self, t: Time) -> FloatValue {
        let c = &self.coefficients;
        let w = 2.0 * PI * t / DAYS_PER_YEAR;
        let value = c.ssa0
            + c.ssa1 * w.cos()
            + c.ssa2 * (2.0 * w).cos()
            + c.ssa3 * (3.0 * w).cos()
            + c.ssb1 * w.sin()
            + c.ssb2 * (2.0 * w).sin()
            + c.ssb3 * (3.0 * w).sin();
        value.max(THETA_FLOOR)
    }

    /// Multiplier applied to the force of infection at time `t`
    pub fn multiplier(&self, t: Time) -> FloatValue {
        self.theta(t) / self.mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coefficients() -> FourierCoefficients {
        FourierCoefficients {
            ssa0: 0.28,
            ssa1: -0.32,
            ssa2: 0.07,
            ssa3: 0.01,
            ssb1: 0.2,
            ssb2: -0.12,
            ssb3: 0.03,
        }
    }

    #[test]
    fn multiplier_averages_to_one() {
        let seasonality = Seasonality::new(coefficients()).unwrap();
        let mean: f64 = (0..365).map(|t| seasonality.multiplier(t as f64)).sum::<f64>() / 365.0;
        assert_relative_eq!(mean, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn profile_is_periodic() {
        let seasonality = Seasonality::new(coefficients()).unwrap();
        assert_relative_eq!(
            seasonality.theta(40.0),
            seasonality.theta(40.0 + 365.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn profile_is_floored() {
        let seasonality = Seasonality::new(FourierCoefficients {
            ssa0: -1.0,
            ssa1: 0.0,
            ssa2: 0.0,
            ssa3: 0.0,
            ssb1: 0.0,
            ssb2: 0.0,
            ssb3: 0.0,
        })
        .unwrap();
        assert_eq!(seasonality.theta(10.0), THETA_FLOOR);
        assert_relative_eq!(seasonality.multiplier(10.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_coefficients_are_rejected() {
        let mut c = coefficients();
        c.ssb2 = f64::NAN;
        assert!(matches!(
            Seasonality::new(c),
            Err(DmmError::InvalidParameter { name, .. }) if name == "ssb2"
        ));
    }
}
