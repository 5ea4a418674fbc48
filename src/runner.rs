//! Entry points for model runs
//!
//! Both runs share the same preparation: parameters are built, the equilibrium initial state is
//! solved and filtered to the inputs the selected variant accepts, and a model is instantiated.
//! A single run then integrates once over a fixed horizon, while a stability run extends the
//! integration window by window (see [`dmm_core::stability`]).

use crate::options::{RunOptions, ScenarioOptions, StabilityOptions};
use dmm_core::errors::DmmResult;
use dmm_core::frame::OutputFrame;
use dmm_core::ivp::OdeModel;
use dmm_core::parameters::{ParameterBuilder, ParameterSet};
use dmm_core::stability::stabilise;
use dmm_core::timeseries::TimeGrid;
use dmm_models::equilibrium::{AgeStructuredEquilibrium, EquilibriumSolver};
use dmm_models::human::HumanModel;
use dmm_models::variants::select_variant;
use tracing::info;

/// Merge the scenario's named and extra parameters into the defaults
pub fn build_parameters(scenario: &ScenarioOptions) -> DmmResult<ParameterSet> {
    let mut builder = ParameterBuilder::new();
    for (name, value) in &scenario.parameters {
        builder.set(name, *value);
    }
    builder
        .with_overrides(scenario.extra_params.clone())
        .build()
}

/// Build a model instance starting from equilibrium
pub fn prepare_model(scenario: &ScenarioOptions) -> DmmResult<HumanModel> {
    let parameters = build_parameters(scenario)?;
    let state = AgeStructuredEquilibrium::new(scenario.locations.clone())
        .solve(&scenario.equilibrium_inputs(), &parameters)?;
    let variant = select_variant(&scenario.model)?;
    let accepted = variant.filter(&state);
    info!(
        model = %variant,
        eir = scenario.init_eir,
        ft = scenario.init_ft,
        inputs = accepted.len(),
        "Prepared model from equilibrium"
    );
    variant.instantiate(&accepted, scenario.solver)
}

/// Run a model once from equilibrium for `options.time` days.
///
/// The output has one row per day from 0 to `options.time` inclusive.
pub fn run_model(options: &RunOptions) -> DmmResult<OutputFrame> {
    let model = prepare_model(&options.scenario)?;
    let grid = TimeGrid::from_days(options.time);
    let (result, _) = model.integrate(&grid, false)?;
    model.transform(&result)
}

/// Run a model from equilibrium until its output is stable.
///
/// The window which showed the output to be stable is not part of the returned output.
pub fn run_model_until_stable(options: &StabilityOptions) -> DmmResult<OutputFrame> {
    let model = prepare_model(&options.scenario)?;
    stabilise(&model, &options.stability)
}
