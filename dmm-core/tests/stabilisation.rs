//! Stabilisation loop tests against synthetic models.
//!
//! The synthetic model reports a prescribed observable at every requested time, so the
//! number of windows needed to stabilise is known exactly.

use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::frame::OutputFrame;
use dmm_core::ivp::{
    check_seam, ContinuationToken, IntegrationResult, ModelState, OdeModel, SolverStats,
};
use dmm_core::stability::{stabilise, StabilisationState, Stabiliser, StabilityConfig};
use dmm_core::timeseries::{FloatValue, Time, TimeGrid};
use ndarray::{s, Array2, Axis};
use std::cell::Cell;

struct SyntheticModel<F: Fn(Time) -> FloatValue> {
    observable: F,
    continuations: Cell<usize>,
    fail_on_continuation: Option<usize>,
    retain_on_continuation: bool,
    /// Drop the last output row of integrations starting at or after this time
    drop_last_row_from: Option<Time>,
}

impl<F: Fn(Time) -> FloatValue> SyntheticModel<F> {
    fn new(observable: F) -> Self {
        Self {
            observable,
            continuations: Cell::new(0),
            fail_on_continuation: None,
            retain_on_continuation: true,
            drop_last_row_from: None,
        }
    }

    fn evaluate(
        &self,
        grid: &TimeGrid,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        let values = grid.values().mapv(|t| (self.observable)(t));
        let result = IntegrationResult::new(grid.values().clone(), values.insert_axis(Axis(1)))?;
        let token = retain.then(|| {
            ContinuationToken::new(
                grid.end(),
                ModelState::from_element(1, (self.observable)(grid.end())),
                SolverStats::default(),
            )
        });
        Ok((result, token))
    }
}

impl<F: Fn(Time) -> FloatValue> OdeModel for SyntheticModel<F> {
    fn integrate(
        &self,
        grid: &TimeGrid,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        self.evaluate(grid, retain)
    }

    fn continue_integration(
        &self,
        prior: &IntegrationResult,
        grid: &TimeGrid,
        token: ContinuationToken,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        check_seam(prior, grid, &token)?;
        let n = self.continuations.get() + 1;
        self.continuations.set(n);
        if self.fail_on_continuation == Some(n) {
            return Err(DmmError::Integration("step size too small".to_string()));
        }
        self.evaluate(grid, retain && self.retain_on_continuation)
    }

    fn transform(&self, result: &IntegrationResult) -> DmmResult<OutputFrame> {
        let inc = result.states().column(0).to_owned();
        let mut values = Array2::zeros((result.len(), 2));
        values.column_mut(0).assign(&inc);
        values.column_mut(1).fill(0.25);
        let mut time = result.time().clone();
        if let Some(from) = self.drop_last_row_from {
            if time[0] >= from {
                let rows = time.len() - 1;
                time = time.slice(s![..rows]).to_owned();
                values = values.slice(s![..rows, ..]).to_owned();
            }
        }
        OutputFrame::new(
            time,
            vec!["inc".to_string(), "prev".to_string()],
            values,
        )
    }
}

fn config(tolerance: f64, max_horizon: f64) -> StabilityConfig {
    StabilityConfig {
        tolerance,
        max_horizon,
        ..Default::default()
    }
}

#[test]
fn stops_one_window_after_the_observable_settles() {
    // Differs by 1e-3 in the first window, constant afterwards
    let model = SyntheticModel::new(|t| if t <= 365.0 { 0.501 } else { 0.5 });

    let output = stabilise(&model, &config(1e-4, 36500.0)).unwrap();

    assert_eq!(model.continuations.get(), 2);
    assert_eq!(output.len(), 730);
    assert_eq!(output.time()[0], 1.0);
    assert_eq!(output.last_time(), Some(730.0));
    // The window which proved stability is not part of the output
    assert!(output.time().iter().all(|t| *t <= 730.0));
}

#[test]
fn aborts_when_the_horizon_is_exceeded() {
    let model = SyntheticModel::new(|t| t * 1e-3);

    let err = stabilise(&model, &config(1e-4, 730.0)).unwrap_err();

    match err {
        DmmError::HorizonExceeded {
            attempted_end,
            max_horizon,
        } => {
            assert_eq!(attempted_end, 1095.0);
            assert_eq!(max_horizon, 730.0);
        }
        other => panic!("expected HorizonExceeded, got {:?}", other),
    }
    assert_eq!(model.continuations.get(), 1);
}

#[test]
fn accumulated_output_grows_by_one_window_per_iteration() {
    let model = SyntheticModel::new(|t| (-t / 200.0).exp());
    let mut stabiliser = Stabiliser::new(&model, config(1e-3, 36500.0)).unwrap();

    assert_eq!(stabiliser.state(), StabilisationState::FirstWindow);
    assert_eq!(stabiliser.step().unwrap(), StabilisationState::Extending);
    assert_eq!(stabiliser.accumulated().unwrap().len(), 365);

    let mut windows = 1;
    while stabiliser.step().unwrap() == StabilisationState::Extending {
        windows += 1;
        let accumulated = stabiliser.accumulated().unwrap();
        assert_eq!(accumulated.len(), 365 * windows);
        assert_eq!(accumulated.last_time(), Some(365.0 * windows as f64));
    }

    assert_eq!(stabiliser.state(), StabilisationState::Converged);
    assert_eq!(stabiliser.extensions(), windows);
    // Terminal states are sticky
    assert_eq!(stabiliser.step().unwrap(), StabilisationState::Converged);

    // Every value of the last returned window is within tolerance of the next one
    let output = stabiliser.run().unwrap();
    let last = output.tail(365);
    for (t, v) in last.time().iter().zip(last.column("inc").unwrap()) {
        assert!(((-(t + 365.0) / 200.0).exp() - v).abs() < 1e-3);
    }
}

#[test]
fn continuation_failure_is_propagated() {
    let mut model = SyntheticModel::new(|t| t);
    model.fail_on_continuation = Some(2);
    let mut stabiliser = Stabiliser::new(&model, config(1e-4, 36500.0)).unwrap();

    stabiliser.step().unwrap();
    stabiliser.step().unwrap();
    let err = stabiliser.step().unwrap_err();
    assert!(matches!(err, DmmError::Integration(_)));
    assert_eq!(stabiliser.state(), StabilisationState::Aborted);
    // No further work is attempted after a failed continuation
    assert_eq!(stabiliser.step().unwrap(), StabilisationState::Aborted);
    assert_eq!(model.continuations.get(), 2);
}

#[test]
fn continuation_must_retain_a_token() {
    let mut model = SyntheticModel::new(|t| t);
    model.retain_on_continuation = false;

    let err = stabilise(&model, &config(1e-4, 36500.0)).unwrap_err();
    assert!(matches!(err, DmmError::MissingContinuation));
}

#[test]
fn unknown_observable_fails_before_extending() {
    let model = SyntheticModel::new(|_| 1.0);
    let config = StabilityConfig {
        observable: "EIR".to_string(),
        ..Default::default()
    };

    let err = stabilise(&model, &config).unwrap_err();
    assert!(matches!(err, DmmError::MissingOutput(name) if name == "EIR"));
    assert_eq!(model.continuations.get(), 0);
}

#[test]
fn alternative_observable() {
    // "prev" is constant so stability is reached on the first comparison
    let model = SyntheticModel::new(|t| t);
    let config = StabilityConfig {
        observable: "prev".to_string(),
        ..Default::default()
    };

    let output = stabilise(&model, &config).unwrap();
    assert_eq!(output.len(), 365);
    assert_eq!(model.continuations.get(), 1);
}

#[test]
fn short_first_window_is_an_error() {
    let mut model = SyntheticModel::new(|_| 1.0);
    model.drop_last_row_from = Some(0.0);
    let mut stabiliser = Stabiliser::new(&model, config(1e-4, 2000.0)).unwrap();

    let err = stabiliser.step().unwrap_err();
    assert!(matches!(err, DmmError::Integration(_)));
    assert_eq!(stabiliser.state(), StabilisationState::Aborted);
    assert_eq!(model.continuations.get(), 0);
}

#[test]
fn short_continuation_window_is_an_error() {
    // The first window is complete, every later one is missing its last day
    let mut model = SyntheticModel::new(|t| t * 1e-3);
    model.drop_last_row_from = Some(365.0);
    let mut stabiliser = Stabiliser::new(&model, config(1e-4, 2000.0)).unwrap();

    assert_eq!(stabiliser.step().unwrap(), StabilisationState::Extending);
    let err = stabiliser.step().unwrap_err();
    assert!(matches!(err, DmmError::Integration(_)));
    assert_eq!(stabiliser.state(), StabilisationState::Aborted);
    // Nothing from the short window was accumulated
    assert_eq!(stabiliser.accumulated().unwrap().len(), 365);
}

#[test]
fn unbounded_horizon_is_rejected() {
    let model = SyntheticModel::new(|t| t);
    let err = stabilise(&model, &config(0.0, f64::INFINITY)).unwrap_err();
    assert!(matches!(err, DmmError::Config(_)));
    assert_eq!(model.continuations.get(), 0);
}
