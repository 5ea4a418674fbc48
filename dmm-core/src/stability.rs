//! Integrate window by window until a model output stops changing.
//!
//! The first window is integrated from the model's initial state.
//! Every following window resumes the previous integration from its [`ContinuationToken`]
//! and is compared against the tail of the output accumulated so far.
//! Once every sampled value of the designated observable differs from the value one window
//! earlier by less than the tolerance, the model is considered stable and the output
//! accumulated *before* that window is returned.
//!
//! ```text
//! FirstWindow -> Extending -> ... -> Extending -> Converged
//!                                             \-> Aborted (horizon exceeded)
//! ```

use crate::errors::{DmmError, DmmResult};
use crate::frame::OutputFrame;
use crate::ivp::{ContinuationToken, IntegrationResult, OdeModel};
use crate::timeseries::{FloatValue, Time, TimeGrid};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Number of daily samples in a stabilisation window
pub const DEFAULT_WINDOW_LENGTH: usize = 365;

/// Options for the stabilisation loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Largest absolute difference between windows that is still considered stable
    pub tolerance: FloatValue,
    /// No window may end after this time (days)
    pub max_horizon: Time,
    /// Number of unit-spaced samples per window
    pub window_length: usize,
    /// Output series used to decide stability
    pub observable: String,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_horizon: 36500.0,
            window_length: DEFAULT_WINDOW_LENGTH,
            observable: "inc".to_string(),
        }
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> DmmResult<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(DmmError::Config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.window_length == 0 {
            return Err(DmmError::Config(
                "window_length must be at least one".to_string(),
            ));
        }
        if !self.max_horizon.is_finite() || self.max_horizon < 0.0 {
            return Err(DmmError::Config(format!(
                "max_horizon must be a finite, non-negative number, got {}",
                self.max_horizon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilisationState {
    /// Nothing has been integrated yet
    FirstWindow,
    /// At least one window is accumulated and the model is not yet stable
    Extending,
    Converged,
    /// The horizon was exceeded or a step failed
    Aborted,
}

impl StabilisationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StabilisationState::Converged | StabilisationState::Aborted
        )
    }
}

/// Drives a model through the stabilisation loop.
///
/// The stabiliser exclusively owns the continuation token between windows.
pub struct Stabiliser<'a, M: OdeModel> {
    model: &'a M,
    config: StabilityConfig,
    state: StabilisationState,
    grid: Option<TimeGrid>,
    previous: Option<IntegrationResult>,
    token: Option<ContinuationToken>,
    accumulated: Option<OutputFrame>,
    extensions: usize,
}

impl<'a, M: OdeModel> Stabiliser<'a, M> {
    pub fn new(model: &'a M, config: StabilityConfig) -> DmmResult<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            state: StabilisationState::FirstWindow,
            grid: None,
            previous: None,
            token: None,
            accumulated: None,
            extensions: 0,
        })
    }

    pub fn state(&self) -> StabilisationState {
        self.state
    }

    /// Number of continuation windows integrated so far
    pub fn extensions(&self) -> usize {
        self.extensions
    }

    /// Output accumulated so far
    pub fn accumulated(&self) -> Option<&OutputFrame> {
        self.accumulated.as_ref()
    }

    /// Advance the loop by one window.
    ///
    /// Any error is fatal: the stabiliser moves to [`StabilisationState::Aborted`] and can not
    /// be resumed.
    pub fn step(&mut self) -> DmmResult<StabilisationState> {
        let result = match self.state {
            StabilisationState::FirstWindow => self.first_window(),
            StabilisationState::Extending => self.extend(),
            StabilisationState::Converged | StabilisationState::Aborted => return Ok(self.state),
        };
        match result {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(err) => {
                self.state = StabilisationState::Aborted;
                self.token = None;
                Err(err)
            }
        }
    }

    /// Step until the model is stable and return the accumulated output.
    pub fn run(mut self) -> DmmResult<OutputFrame> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        match (self.state, self.accumulated) {
            (StabilisationState::Converged, Some(output)) => Ok(output),
            _ => Err(DmmError::Integration(
                "stabilisation ended without output".to_string(),
            )),
        }
    }

    fn first_window(&mut self) -> DmmResult<StabilisationState> {
        let grid = TimeGrid::window(0, self.config.window_length)?;
        let (result, token) = self.model.integrate(&grid.with_seam()?, true)?;
        let token = token.ok_or(DmmError::MissingContinuation)?;
        let frame = self.model.transform(&result)?.restrict_to(&grid);
        check_window(&frame, &grid)?;
        // Fail early if the observable isn't produced
        frame.series(&self.config.observable)?;

        debug!(
            t_end = grid.end(),
            rows = frame.len(),
            "Integrated first window"
        );

        self.grid = Some(grid);
        self.previous = Some(result);
        self.token = Some(token);
        self.accumulated = Some(frame);
        Ok(StabilisationState::Extending)
    }

    fn extend(&mut self) -> DmmResult<StabilisationState> {
        let window_length = self.config.window_length;
        let previous_grid = self.grid.as_ref().ok_or(DmmError::MissingContinuation)?;
        let grid = previous_grid.shift(window_length as Time)?;

        if grid.end() > self.config.max_horizon {
            warn!(
                attempted_end = grid.end(),
                max_horizon = self.config.max_horizon,
                extensions = self.extensions,
                "Model did not stabilise before the maximum horizon"
            );
            return Err(DmmError::HorizonExceeded {
                attempted_end: grid.end(),
                max_horizon: self.config.max_horizon,
            });
        }

        let token = self.token.take().ok_or(DmmError::MissingContinuation)?;
        let prior = self.previous.take().ok_or(DmmError::MissingContinuation)?;
        let (result, next_token) =
            self.model
                .continue_integration(&prior, &grid.with_seam()?, token, true)?;
        let next_token = next_token.ok_or(DmmError::MissingContinuation)?;
        self.extensions += 1;

        let accumulated = self
            .accumulated
            .as_mut()
            .ok_or(DmmError::MissingContinuation)?;
        let mut frame = self.model.transform(&result)?.restrict_to(&grid);
        if let Some(reported) = accumulated.last_time() {
            frame = frame.after(reported);
        }
        check_window(&frame, &grid)?;

        let history = accumulated.tail(window_length);
        let previous_values = history.series(&self.config.observable)?;
        let new_values = frame.series(&self.config.observable)?;
        let difference = max_abs_difference(previous_values, new_values);

        debug!(
            t_end = grid.end(),
            extensions = self.extensions,
            max_difference = ?difference,
            tolerance = self.config.tolerance,
            "Compared window against previous output"
        );

        if within_tolerance(previous_values, new_values, self.config.tolerance) {
            info!(
                t_end = ?accumulated.last_time(),
                extensions = self.extensions,
                "Model stabilised"
            );
            return Ok(StabilisationState::Converged);
        }

        accumulated.append(frame)?;
        self.grid = Some(grid);
        self.previous = Some(result);
        self.token = Some(next_token);
        Ok(StabilisationState::Extending)
    }
}

/// A window's output must report every point of the requested grid exactly once.
fn check_window(frame: &OutputFrame, grid: &TimeGrid) -> DmmResult<()> {
    if frame.len() != grid.len() {
        return Err(DmmError::Integration(format!(
            "window ending at t={} produced {} rows, expected {}",
            grid.end(),
            frame.len(),
            grid.len()
        )));
    }
    Ok(())
}

/// Integrate `model` window by window until `config.observable` is stable.
pub fn stabilise<M: OdeModel>(model: &M, config: &StabilityConfig) -> DmmResult<OutputFrame> {
    Stabiliser::new(model, config.clone())?.run()
}

/// Pair the tail of `previous` with the values one window later in `new`.
///
/// If either series is shorter than the other only the overlapping trailing points are
/// compared, which keeps each pair at the same phase of the window.
fn aligned(
    previous: ArrayView1<FloatValue>,
    new: ArrayView1<FloatValue>,
) -> Vec<(FloatValue, FloatValue)> {
    let n = previous.len().min(new.len());
    let previous_tail = previous.iter().skip(previous.len() - n);
    let new_tail = new.iter().skip(new.len() - n);
    previous_tail.zip(new_tail).map(|(a, b)| (*a, *b)).collect()
}

/// Returns true if every paired value differs by less than `tolerance`.
///
/// Non-finite differences are never within tolerance and there must be at least one pair.
pub fn within_tolerance(
    previous: ArrayView1<FloatValue>,
    new: ArrayView1<FloatValue>,
    tolerance: FloatValue,
) -> bool {
    let pairs = aligned(previous, new);
    !pairs.is_empty() && pairs.iter().all(|(a, b)| (b - a).abs() < tolerance)
}

/// Largest absolute difference between paired values.
pub fn max_abs_difference(
    previous: ArrayView1<FloatValue>,
    new: ArrayView1<FloatValue>,
) -> Option<FloatValue> {
    aligned(previous, new)
        .into_iter()
        .map(|(a, b)| (b - a).abs())
        .fold(None, |acc, d| match acc {
            Some(m) if m >= d => Some(m),
            _ => Some(d),
        })
}
