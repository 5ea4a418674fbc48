//! Time types and the sampling grids used to request model output.

use crate::errors::{DmmError, DmmResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
/// Simulation time in days.
pub type Time = f64;

/// Absolute tolerance used when matching sampled times against a grid.
pub const TIME_EPSILON: Time = 1e-6;

/// An ordered set of time points at which model output is sampled.
///
/// Grids are non-empty, non-negative and strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    values: Array1<Time>,
}

impl TimeGrid {
    pub fn new(values: Array1<Time>) -> DmmResult<Self> {
        if values.is_empty() {
            return Err(DmmError::InvalidTimeGrid(
                "a time grid requires at least one point".to_string(),
            ));
        }
        if values.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(DmmError::InvalidTimeGrid(
                "time points must be finite and non-negative".to_string(),
            ));
        }
        if values.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(DmmError::InvalidTimeGrid(
                "time points must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { values })
    }

    /// Evenly spaced points from `start` to `end` inclusive.
    pub fn range(start: Time, end: Time, step: Time) -> DmmResult<Self> {
        if step <= 0.0 || !step.is_finite() {
            return Err(DmmError::InvalidTimeGrid(format!(
                "step must be positive, got {}",
                step
            )));
        }
        if end < start {
            return Err(DmmError::InvalidTimeGrid(format!(
                "end ({}) is before start ({})",
                end, start
            )));
        }
        let n = ((end - start) / step + TIME_EPSILON).floor() as usize;
        Self::new(Array1::from_iter((0..=n).map(|i| start + i as Time * step)))
    }

    /// The grid `0, 1, ..., horizon` used for a single run.
    pub fn from_days(horizon: usize) -> Self {
        Self {
            values: Array1::from_iter((0..=horizon).map(|t| t as Time)),
        }
    }

    /// The `index`-th block of `length` unit-spaced points.
    ///
    /// Window `k` covers `k * length + 1 ..= (k + 1) * length`, so consecutive windows tile the
    /// time axis without overlap and window `k` ends at `(k + 1) * length`.
    pub fn window(index: usize, length: usize) -> DmmResult<Self> {
        if length == 0 {
            return Err(DmmError::InvalidTimeGrid(
                "window length must be at least one".to_string(),
            ));
        }
        let start = index * length + 1;
        Ok(Self {
            values: Array1::from_iter((start..start + length).map(|t| t as Time)),
        })
    }

    /// A copy of this grid moved forward by `offset`.
    pub fn shift(&self, offset: Time) -> DmmResult<Self> {
        Self::new(self.values.mapv(|t| t + offset))
    }

    /// This grid with one extra leading point a single step before the start.
    ///
    /// The leading point is where an integration resumes from, so the first requested sample
    /// joins seamlessly onto previously reported output.
    pub fn with_seam(&self) -> DmmResult<Self> {
        let step = self.step().unwrap_or(1.0);
        let mut values = Vec::with_capacity(self.len() + 1);
        values.push(self.start() - step);
        values.extend(self.values.iter().copied());
        Self::new(Array1::from_vec(values))
    }

    /// The spacing between points, if the grid is uniformly spaced with at least two points.
    pub fn step(&self) -> Option<Time> {
        if self.len() < 2 {
            return None;
        }
        let step = self.values[1] - self.values[0];
        let uniform = self
            .values
            .windows(2)
            .into_iter()
            .all(|w| ((w[1] - w[0]) - step).abs() <= TIME_EPSILON);
        uniform.then_some(step)
    }

    pub fn start(&self) -> Time {
        self.values[0]
    }

    pub fn end(&self) -> Time {
        self.values[self.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array1<Time> {
        &self.values
    }

    /// Index of the grid point matching `t`, if any.
    pub fn position(&self, t: Time) -> Option<usize> {
        let slice = self.values.as_slice()?;
        let idx = slice.partition_point(|v| *v < t - TIME_EPSILON);
        (idx < slice.len() && (slice[idx] - t).abs() <= TIME_EPSILON).then_some(idx)
    }

    pub fn contains(&self, t: Time) -> bool {
        self.position(t).is_some()
    }
}
