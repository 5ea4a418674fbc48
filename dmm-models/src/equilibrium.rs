//! Equilibrium initial conditions
//!
//! The equilibrium is the steady state of the human model under constant transmission.
//! Because ageing only moves people from younger to older classes, the steady state can be
//! found one age class at a time, starting with the youngest:
//!
//! $$ \left((\eta + r_i) I - J(\lambda_{ij})\right) X_{ij} = \text{inflow}_{ij} $$
//!
//! where $J$ are the transitions between compartments, $r_i$ is the rate of ageing out of
//! class $i$ and the inflow is either births (youngest class) or people ageing in from the
//! previous class.

use crate::heterogeneity::{age_biting, Heterogeneity};
use crate::human::{HumanRates, COMPARTMENTS, INITIAL_COMPARTMENTS};
use crate::location::{Location, LocationTable};
use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::parameters::ParameterSet;
use dmm_core::state::{InitialState, StateValue};
use dmm_core::timeseries::FloatValue;
use nalgebra::{Matrix6, Vector6};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DAYS_PER_YEAR: FloatValue = 365.0;

/// Inputs describing the setting an equilibrium is computed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumInputs {
    /// Lower bound of each age class (years)
    pub age: Vec<FloatValue>,
    /// Annual entomological inoculation rate
    pub eir: FloatValue,
    /// Fraction of clinical cases which are treated
    pub ft: FloatValue,
    /// Number of biting heterogeneity brackets
    pub het_brackets: usize,
    pub location: Option<Location>,
}

/// Computes the initial state of a model run
pub trait EquilibriumSolver {
    /// Solve for the initial state.
    ///
    /// Implementations must be deterministic.
    fn solve(
        &self,
        inputs: &EquilibriumInputs,
        parameters: &ParameterSet,
    ) -> DmmResult<InitialState>;
}

/// Steady state of the age-structured human model
#[derive(Debug, Clone, Default)]
pub struct AgeStructuredEquilibrium {
    locations: LocationTable,
}

impl AgeStructuredEquilibrium {
    pub fn new(locations: LocationTable) -> Self {
        Self { locations }
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }
}

fn inconsistent(message: String) -> DmmError {
    DmmError::EquilibriumSolve(message)
}

fn validate(inputs: &EquilibriumInputs) -> DmmResult<()> {
    if inputs.age.is_empty() {
        return Err(inconsistent("at least one age class is required".to_string()));
    }
    if inputs.age.iter().any(|a| !a.is_finite() || *a < 0.0) {
        return Err(inconsistent(format!(
            "ages must be non-negative, got {:?}",
            inputs.age
        )));
    }
    if inputs.age.windows(2).any(|w| w[1] <= w[0]) {
        return Err(inconsistent(format!(
            "ages must be strictly increasing, got {:?}",
            inputs.age
        )));
    }
    if !(inputs.eir.is_finite() && inputs.eir >= 0.0) {
        return Err(inconsistent(format!(
            "EIR must be non-negative, got {}",
            inputs.eir
        )));
    }
    if !(0.0..=1.0).contains(&inputs.ft) {
        return Err(inconsistent(format!(
            "ft must be within [0, 1], got {}",
            inputs.ft
        )));
    }
    if inputs.het_brackets == 0 {
        return Err(inconsistent(
            "at least one heterogeneity bracket is required".to_string(),
        ));
    }
    Ok(())
}

/// Rate of ageing out of each class (per day). Nobody ages out of the oldest class.
pub fn ageing_rates(age: &[FloatValue]) -> Array1<FloatValue> {
    let na = age.len();
    Array1::from_shape_fn(na, |i| match i + 1 < na {
        true => 1.0 / ((age[i + 1] - age[i]) * DAYS_PER_YEAR),
        false => 0.0,
    })
}

/// Representative age of each class in days: the midpoint, or the lower bound of the last class
fn representative_age_days(age: &[FloatValue]) -> Array1<FloatValue> {
    let na = age.len();
    Array1::from_shape_fn(na, |i| match i + 1 < na {
        true => (age[i] + age[i + 1]) / 2.0 * DAYS_PER_YEAR,
        false => age[i] * DAYS_PER_YEAR,
    })
}

impl EquilibriumSolver for AgeStructuredEquilibrium {
    fn solve(
        &self,
        inputs: &EquilibriumInputs,
        parameters: &ParameterSet,
    ) -> DmmResult<InitialState> {
        validate(inputs)?;

        let mut state = InitialState::from_parameters(parameters);
        state.insert("ft", StateValue::Scalar(inputs.ft));
        let rates = HumanRates::from_state(&state)?;
        rates.validate().map_err(inconsistent)?;

        let b = parameters.scalar("b")?;
        let rho = parameters.scalar("rho")?;
        let a0 = parameters.scalar("a0")?;
        let sigma2 = parameters.scalar("sigma2")?;
        if !(0.0..=1.0).contains(&b) || !(0.0..=1.0).contains(&rho) {
            return Err(inconsistent(format!(
                "b and rho must be within [0, 1], got b={} rho={}",
                b, rho
            )));
        }
        if !(a0.is_finite() && a0 > 0.0) {
            return Err(inconsistent(format!("a0 must be positive, got {}", a0)));
        }

        let na = inputs.age.len();
        let nh = inputs.het_brackets;
        let age_rate = ageing_rates(&inputs.age);
        let psi = age_biting(&representative_age_days(&inputs.age), rho, a0);
        let heterogeneity =
            Heterogeneity::new(nh, sigma2).map_err(|e| inconsistent(e.to_string()))?;
        let daily_eir = inputs.eir / DAYS_PER_YEAR;
        let foi_eq = Array2::from_shape_fn((na, nh), |(i, j)| {
            b * daily_eir * psi[i] * heterogeneity.zeta[j]
        });

        let mut compartments: Vec<Array2<FloatValue>> =
            (0..COMPARTMENTS.len()).map(|_| Array2::zeros((na, nh))).collect();
        let (mut prev_eq, mut inc_eq) = (0.0, 0.0);

        for j in 0..nh {
            let mut inflow = Vector6::zeros();
            inflow[0] = rates.eta * heterogeneity.het_wt[j];

            for i in 0..na {
                let foi = foi_eq[[i, j]];
                let system = Matrix6::identity() * (rates.eta + age_rate[i]) - rates.transitions(foi);
                let x = system.lu().solve(&inflow).ok_or_else(|| {
                    inconsistent(format!(
                        "singular steady state system in age class {} bracket {}",
                        i, j
                    ))
                })?;
                if x.iter().any(|v| !v.is_finite() || *v < -1e-12) {
                    return Err(inconsistent(format!(
                        "invalid steady state in age class {} bracket {}",
                        i, j
                    )));
                }

                for (c, compartment) in compartments.iter_mut().enumerate() {
                    compartment[[i, j]] = x[c];
                }
                prev_eq += x[1] + x[2] + x[3];
                inc_eq += rates.clinical_incidence(foi, &x);
                inflow = x * age_rate[i];
            }
        }

        debug!(
            eir = inputs.eir,
            ft = inputs.ft,
            age_classes = na,
            brackets = nh,
            prevalence = prev_eq,
            incidence = inc_eq,
            "Solved equilibrium"
        );

        for (name, values) in INITIAL_COMPARTMENTS.iter().zip(compartments) {
            state.insert(name, StateValue::Matrix(values));
        }
        state.insert("age", StateValue::Vector(Array1::from_vec(inputs.age.clone())));
        state.insert("age_rate", StateValue::Vector(age_rate));
        state.insert("psi", StateValue::Vector(psi));
        state.insert("zeta", StateValue::Vector(heterogeneity.zeta));
        state.insert("het_wt", StateValue::Vector(heterogeneity.het_wt));
        state.insert("foi_eq", StateValue::Matrix(foi_eq));
        state.insert("EIR_eq", StateValue::Scalar(inputs.eir));
        state.insert("prev_eq", StateValue::Scalar(prev_eq));
        state.insert("inc_eq", StateValue::Scalar(inc_eq));
        state.insert("na", StateValue::Scalar(na as FloatValue));
        state.insert("nh", StateValue::Scalar(nh as FloatValue));

        if let Some(location) = &inputs.location {
            let profile = self.locations.find(location)?;
            for (name, value) in profile.coefficients().named() {
                state.insert(name, StateValue::Scalar(value));
            }
        }

        Ok(state)
    }
}
