//! The closed set of model variants
//!
//! Every variant shares the human model right-hand side and differs only in how the force
//! of infection changes over time.
//! A variant declares the initial state names it accepts, and the initial state is filtered
//! to that set before a model is instantiated.

use crate::human::{Forcing, HumanModel, INITIAL_COMPARTMENTS};
use crate::seasonality::{FourierCoefficients, Seasonality};
use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::ivp::SolverOptions;
use dmm_core::state::InitialState;
use std::fmt;
use std::str::FromStr;

/// Inputs accepted by every variant
const COMMON_INPUTS: [&str; 13] = [
    "age", "age_rate", "het_wt", "foi_eq", "EIR_eq", "ft", "eta", "phi", "rT", "rD", "rA",
    "rU", "rP",
];

const INTERVENTION_INPUTS: [&str; 3] = ["itn_cov", "itn_efficacy", "intervention_start"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Constant transmission
    Base,
    /// Transmission follows a Fourier seasonal profile
    Seasonal,
    /// Bed nets reduce transmission from a given time
    Intervention,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [
        ModelVariant::Base,
        ModelVariant::Seasonal,
        ModelVariant::Intervention,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::Base => "base",
            ModelVariant::Seasonal => "seasonal",
            ModelVariant::Intervention => "intervention",
        }
    }

    /// Names of the initial state values this variant is constructed from
    pub fn accepted_inputs(&self) -> Vec<&'static str> {
        let mut inputs: Vec<&'static str> = INITIAL_COMPARTMENTS
            .iter()
            .chain(COMMON_INPUTS.iter())
            .copied()
            .collect();
        match self {
            ModelVariant::Base => {}
            ModelVariant::Seasonal => inputs.extend(FourierCoefficients::NAMES),
            ModelVariant::Intervention => inputs.extend(INTERVENTION_INPUTS),
        }
        inputs
    }

    /// Keep only the initial state values this variant accepts
    pub fn filter(&self, state: &InitialState) -> InitialState {
        state.restrict_to(&self.accepted_inputs())
    }

    /// Construct a model instance from a filtered initial state
    pub fn instantiate(
        &self,
        state: &InitialState,
        solver: SolverOptions,
    ) -> DmmResult<HumanModel> {
        let forcing = match self {
            ModelVariant::Base => Forcing::Constant,
            ModelVariant::Seasonal => Forcing::Seasonal(Seasonality::from_state(state)?),
            ModelVariant::Intervention => {
                let coverage = state.scalar("itn_cov")?;
                let efficacy = state.scalar("itn_efficacy")?;
                for (name, value) in [("itn_cov", coverage), ("itn_efficacy", efficacy)] {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(DmmError::InvalidParameter {
                            name: name.to_string(),
                            reason: format!("must be within [0, 1], got {}", value),
                        });
                    }
                }
                Forcing::Intervention {
                    start: state.scalar("intervention_start")?,
                    reduction: coverage * efficacy,
                }
            }
        };
        HumanModel::from_state(state, forcing, solver)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelVariant {
    type Err = DmmError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ModelVariant::ALL
            .into_iter()
            .find(|variant| variant.name() == name)
            .ok_or_else(|| DmmError::UnknownModel {
                name: name.to_string(),
                expected: ModelVariant::ALL
                    .iter()
                    .map(|v| v.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Select a model variant by name
pub fn select_variant(name: &str) -> DmmResult<ModelVariant> {
    name.parse()
}
