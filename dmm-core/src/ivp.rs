//! Integration of model right-hand sides and the [`OdeModel`] seam.
//!
//! A model instance integrates an initial state over a [`TimeGrid`], can resume a previous
//! integration from a [`ContinuationToken`] and transforms raw solver output into an
//! [`OutputFrame`].
//! [`OdeIntegrator`] implements the integration half of that contract on top of `ode_solvers`
//! for any type implementing [`Derivatives`].

use crate::errors::{DmmError, DmmResult};
use crate::frame::OutputFrame;
use crate::timeseries::{FloatValue, Time, TimeGrid, TIME_EPSILON};
use nalgebra::DVector;
use ndarray::{Array1, Array2, ArrayView1};
use ode_solvers::dop_shared::Stats;
use ode_solvers::{Dopri5, Rk4, System};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Flattened state vector of a model.
pub type ModelState = DVector<FloatValue>;

/// Right-hand side of a system of ODEs.
pub trait Derivatives: Send + Sync {
    /// Number of state variables.
    fn dimension(&self) -> usize;

    fn calculate_dy_dt(&self, t: Time, y: &ModelState, dy_dt: &mut ModelState);
}

struct SystemAdapter<D>(Arc<D>);

impl<D: Derivatives> System<Time, ModelState> for SystemAdapter<D> {
    fn system(&self, t: Time, y: &ModelState, dy: &mut ModelState) {
        self.0.calculate_dy_dt(t, y, dy)
    }
}

/// Which `ode_solvers` stepper is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// Adaptive Dormand-Prince 5(4) with dense output
    Dopri5,
    /// Classic fixed step Runge-Kutta
    Rk4,
}

/// Solver options for the ODE integration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub method: SolverMethod,
    pub rtol: FloatValue,
    pub atol: FloatValue,
    /// Step size used by [`SolverMethod::Rk4`]
    pub step_size: FloatValue,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: SolverMethod::Dopri5,
            rtol: 1e-6,
            atol: 1e-6,
            step_size: 0.25,
        }
    }
}

/// Cumulative work done by the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub evaluations: u32,
    pub accepted_steps: u32,
    pub rejected_steps: u32,
}

impl SolverStats {
    fn accumulate(self, stats: &Stats) -> Self {
        Self {
            evaluations: self.evaluations + stats.num_eval,
            accepted_steps: self.accepted_steps + stats.accepted_steps,
            rejected_steps: self.rejected_steps + stats.rejected_steps,
        }
    }
}

/// Raw trajectory produced by an integration.
///
/// Row `i` of `states` is the flattened model state at `time[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationResult {
    time: Array1<Time>,
    states: Array2<FloatValue>,
}

impl IntegrationResult {
    pub fn new(time: Array1<Time>, states: Array2<FloatValue>) -> DmmResult<Self> {
        if states.nrows() != time.len() {
            return Err(DmmError::Integration(format!(
                "{} states were reported for {} time points",
                states.nrows(),
                time.len()
            )));
        }
        Ok(Self { time, states })
    }

    pub fn time(&self) -> &Array1<Time> {
        &self.time
    }

    pub fn states(&self) -> &Array2<FloatValue> {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn state_at(&self, index: usize) -> ArrayView1<'_, FloatValue> {
        self.states.row(index)
    }

    pub fn end_time(&self) -> Option<Time> {
        self.time.iter().next_back().copied()
    }
}

/// Solver state retained at the end of an integration so that it can be resumed.
///
/// Tokens are not `Clone`. A token is consumed by the continuation it resumes, which hands back
/// a fresh one when asked to retain it.
#[derive(Debug)]
pub struct ContinuationToken {
    time: Time,
    state: ModelState,
    stats: SolverStats,
}

impl ContinuationToken {
    pub fn new(time: Time, state: ModelState, stats: SolverStats) -> Self {
        Self { time, state, stats }
    }

    /// Time the integration stopped at
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }
}

/// A model instance that can be integrated, resumed and transformed.
pub trait OdeModel {
    /// Integrate from the model's initial state over `grid`.
    ///
    /// The initial state applies at `grid.start()`.
    /// When `retain` is true a token is returned that resumes from `grid.end()`.
    fn integrate(
        &self,
        grid: &TimeGrid,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)>;

    /// Resume a previous integration.
    ///
    /// `grid` must start at the time the token was taken.
    fn continue_integration(
        &self,
        prior: &IntegrationResult,
        grid: &TimeGrid,
        token: ContinuationToken,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)>;

    /// Map raw solver output to named output series.
    fn transform(&self, result: &IntegrationResult) -> DmmResult<OutputFrame>;
}

/// Check that a continuation joins onto the integration it resumes.
pub fn check_seam(
    prior: &IntegrationResult,
    grid: &TimeGrid,
    token: &ContinuationToken,
) -> DmmResult<()> {
    if (grid.start() - token.time()).abs() > TIME_EPSILON {
        return Err(DmmError::InvalidTimeGrid(format!(
            "continuation grid starts at t={} but the solver stopped at t={}",
            grid.start(),
            token.time()
        )));
    }
    match prior.end_time() {
        Some(end) if (end - token.time()).abs() <= TIME_EPSILON => Ok(()),
        end => Err(DmmError::Integration(format!(
            "continuation token (t={}) does not belong to the prior integration (end={:?})",
            token.time(),
            end
        ))),
    }
}

/// Integrates a [`Derivatives`] implementation on a sampling grid.
#[derive(Debug)]
pub struct OdeIntegrator<D> {
    rhs: Arc<D>,
    options: SolverOptions,
}

impl<D: Derivatives + 'static> OdeIntegrator<D> {
    pub fn new(rhs: Arc<D>, options: SolverOptions) -> Self {
        Self { rhs, options }
    }

    pub fn rhs(&self) -> &D {
        &self.rhs
    }

    /// Integrate `y0` from `grid.start()` and sample the solution at every grid point.
    pub fn solve(
        &self,
        y0: ModelState,
        grid: &TimeGrid,
        stats: SolverStats,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        if y0.len() != self.rhs.dimension() {
            return Err(DmmError::Integration(format!(
                "initial state has {} values but the model has {} state variables",
                y0.len(),
                self.rhs.dimension()
            )));
        }

        let (times, states, stats) = if grid.len() == 1 {
            (vec![grid.start()], vec![y0], stats)
        } else {
            let step = grid.step().ok_or_else(|| {
                DmmError::InvalidTimeGrid("grid points must be evenly spaced".to_string())
            })?;
            self.step_through(y0, grid, step, stats)?
        };

        let result = sample(grid, &times, &states)?;
        let token = match retain {
            true => {
                let last = result.state_at(result.len() - 1);
                let state = ModelState::from_iterator(last.len(), last.iter().copied());
                Some(ContinuationToken::new(grid.end(), state, stats))
            }
            false => None,
        };
        Ok((result, token))
    }

    /// Resume from a token, sampling on `grid` (which starts at the token time).
    pub fn resume(
        &self,
        grid: &TimeGrid,
        token: ContinuationToken,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        let ContinuationToken { state, stats, .. } = token;
        self.solve(state, grid, stats, retain)
    }

    fn step_through(
        &self,
        y0: ModelState,
        grid: &TimeGrid,
        step: Time,
        stats: SolverStats,
    ) -> DmmResult<(Vec<Time>, Vec<ModelState>, SolverStats)> {
        let system = SystemAdapter(self.rhs.clone());
        let (t0, t1) = (grid.start(), grid.end());

        let (times, states, solver_stats) = match self.options.method {
            SolverMethod::Dopri5 => {
                let mut solver =
                    Dopri5::new(system, t0, t1, step, y0, self.options.rtol, self.options.atol);
                let solver_stats = solver
                    .integrate()
                    .map_err(|e| DmmError::Integration(format!("{:?}", e)))?;
                let (times, states) = solver.results().get();
                (times.clone(), states.clone(), solver_stats)
            }
            SolverMethod::Rk4 => {
                let step_size = self.options.step_size.min(step);
                let mut solver = Rk4::new(system, t0, y0, t1, step_size);
                let solver_stats = solver
                    .integrate()
                    .map_err(|e| DmmError::Integration(format!("{:?}", e)))?;
                let (times, states) = solver.results().get();
                (times.clone(), states.clone(), solver_stats)
            }
        };

        debug!(
            t_start = t0,
            t_end = t1,
            evaluations = solver_stats.num_eval,
            accepted = solver_stats.accepted_steps,
            rejected = solver_stats.rejected_steps,
            "Integrated window"
        );

        if states.iter().any(|y| y.iter().any(|v| !v.is_finite())) {
            return Err(DmmError::Integration(format!(
                "non-finite state encountered between t={} and t={}",
                t0, t1
            )));
        }

        Ok((times, states, stats.accumulate(&solver_stats)))
    }
}

/// Pick the solver output at each grid point.
fn sample(grid: &TimeGrid, times: &[Time], states: &[ModelState]) -> DmmResult<IntegrationResult> {
    let dimension = states.first().map(|s| s.len()).unwrap_or(0);
    let mut values = Array2::zeros((grid.len(), dimension));
    let mut cursor = 0;

    for (row, t) in grid.values().iter().enumerate() {
        while cursor < times.len() && times[cursor] < t - TIME_EPSILON {
            cursor += 1;
        }
        match times.get(cursor) {
            Some(found) if (found - t).abs() <= TIME_EPSILON => {
                values
                    .row_mut(row)
                    .iter_mut()
                    .zip(states[cursor].iter())
                    .for_each(|(v, s)| *v = *s);
            }
            _ => {
                return Err(DmmError::Integration(format!(
                    "solver did not report a value at t={}",
                    t
                )))
            }
        }
    }

    IntegrationResult::new(grid.values().clone(), values)
}
