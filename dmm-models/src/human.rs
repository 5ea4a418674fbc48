//! Age-structured human infection model
//!
//! The human population is split into age classes and biting heterogeneity brackets.
//! Within every (age, bracket) cell people move between six compartments:
//!
//! | Name | Description                                   |
//! |------|-----------------------------------------------|
//! | S    | Susceptible                                   |
//! | T    | Treated clinical disease                      |
//! | D    | Untreated clinical disease                    |
//! | A    | Asymptomatic patent infection                 |
//! | U    | Sub-patent infection                          |
//! | P    | Prophylaxis following treatment               |
//!
//! New infections arise from S, A and U at the force of infection $\lambda$.
//! A fraction $\phi$ of infections are clinical, of which a fraction $f_T$ are treated:
//!
//! $$ \frac{dS}{dt} = -\lambda S + r_P P + r_U U $$
//! $$ \frac{dT}{dt} = \phi f_T \lambda (S + A + U) - r_T T $$
//! $$ \frac{dD}{dt} = \phi (1 - f_T) \lambda (S + A + U) - r_D D $$
//! $$ \frac{dA}{dt} = (1 - \phi) \lambda (S + U) + r_D D - (\phi \lambda + r_A) A $$
//! $$ \frac{dU}{dt} = r_A A - (\lambda + r_U) U $$
//! $$ \frac{dP}{dt} = r_T T - r_P P $$
//!
//! Every compartment also ages into the next age class and dies at rate $\eta$.
//! Births enter the youngest susceptible class, split across brackets by their weights,
//! so the total population stays at one.

use crate::seasonality::Seasonality;
use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::frame::OutputFrame;
use dmm_core::ivp::{
    check_seam, ContinuationToken, Derivatives, IntegrationResult, ModelState, OdeIntegrator,
    OdeModel, SolverOptions, SolverStats,
};
use dmm_core::state::InitialState;
use dmm_core::timeseries::{FloatValue, Time, TimeGrid};
use nalgebra::{Matrix6, Vector6};
use ndarray::{Array1, Array2, ArrayView1};
use std::sync::Arc;

pub const COMPARTMENTS: [&str; 6] = ["S", "T", "D", "A", "U", "P"];

const S: usize = 0;
const T: usize = 1;
const D: usize = 2;
const A: usize = 3;
const U: usize = 4;
const P: usize = 5;

/// Initial state names holding the compartment matrices (age class x bracket).
pub const INITIAL_COMPARTMENTS: [&str; 6] =
    ["init_S", "init_T", "init_D", "init_A", "init_U", "init_P"];

/// Output series produced by [`HumanModel::transform`](OdeModel::transform).
///
/// `prev` and `prev_2_10` count patent infections (T, D and A). Sub-patent U is not included.
pub const OUTPUT_COLUMNS: [&str; 10] = [
    "S",
    "T",
    "D",
    "A",
    "U",
    "P",
    "prev",
    "prev_2_10",
    "inc",
    "EIR",
];

/// Transition rates between compartments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanRates {
    /// Mortality
    pub eta: FloatValue,
    /// Probability an infection is clinical
    pub phi: FloatValue,
    /// Fraction of clinical cases treated
    pub ft: FloatValue,
    pub r_t: FloatValue,
    pub r_d: FloatValue,
    pub r_a: FloatValue,
    pub r_u: FloatValue,
    pub r_p: FloatValue,
}

impl HumanRates {
    pub fn from_state(state: &InitialState) -> DmmResult<Self> {
        Ok(Self {
            eta: state.scalar("eta")?,
            phi: state.scalar("phi")?,
            ft: state.scalar("ft")?,
            r_t: state.scalar("rT")?,
            r_d: state.scalar("rD")?,
            r_a: state.scalar("rA")?,
            r_u: state.scalar("rU")?,
            r_p: state.scalar("rP")?,
        })
    }

    /// Check that the rates describe a valid model
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("eta", self.eta),
            ("rT", self.r_t),
            ("rD", self.r_d),
            ("rA", self.r_a),
            ("rU", self.r_u),
            ("rP", self.r_p),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("rate '{}' must be positive, got {}", name, value));
            }
        }
        for (name, value) in [("phi", self.phi), ("ft", self.ft)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("'{}' must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }

    /// Linear flows between compartments for a force of infection `foi`.
    ///
    /// Column `j` holds the flows out of compartment `j`, so every column sums to zero.
    pub fn transitions(&self, foi: FloatValue) -> Matrix6<FloatValue> {
        let clinical_treated = self.phi * self.ft * foi;
        let clinical_untreated = self.phi * (1.0 - self.ft) * foi;
        let asymptomatic = (1.0 - self.phi) * foi;

        let mut m = Matrix6::zeros();

        m[(S, S)] = -foi;
        m[(T, S)] = clinical_treated;
        m[(D, S)] = clinical_untreated;
        m[(A, S)] = asymptomatic;

        m[(T, T)] = -self.r_t;
        m[(P, T)] = self.r_t;

        m[(D, D)] = -self.r_d;
        m[(A, D)] = self.r_d;

        m[(A, A)] = -(self.phi * foi + self.r_a);
        m[(T, A)] = clinical_treated;
        m[(D, A)] = clinical_untreated;
        m[(U, A)] = self.r_a;

        m[(U, U)] = -(foi + self.r_u);
        m[(S, U)] = self.r_u;
        m[(T, U)] = clinical_treated;
        m[(D, U)] = clinical_untreated;
        m[(A, U)] = asymptomatic;

        m[(P, P)] = -self.r_p;
        m[(S, P)] = self.r_p;

        m
    }

    /// Daily rate of new clinical cases in a cell
    pub fn clinical_incidence(&self, foi: FloatValue, cell: &Vector6<FloatValue>) -> FloatValue {
        self.phi * foi * (cell[S] + cell[A] + cell[U])
    }
}

/// Time dependence of the force of infection
#[derive(Debug, Clone, PartialEq)]
pub enum Forcing {
    Constant,
    Seasonal(Seasonality),
    /// Transmission is reduced by a constant fraction from `start` onwards
    Intervention {
        start: Time,
        reduction: FloatValue,
    },
}

impl Forcing {
    /// Multiplier applied to the equilibrium force of infection at time `t`
    pub fn multiplier(&self, t: Time) -> FloatValue {
        match self {
            Forcing::Constant => 1.0,
            Forcing::Seasonal(seasonality) => seasonality.multiplier(t),
            Forcing::Intervention { start, reduction } => match t >= *start {
                true => 1.0 - reduction,
                false => 1.0,
            },
        }
    }
}

/// Right-hand side of the human model
#[derive(Debug, Clone)]
pub struct HumanDynamics {
    na: usize,
    nh: usize,
    age_rate: Vec<FloatValue>,
    het_wt: Vec<FloatValue>,
    foi_eq: Array2<FloatValue>,
    rates: HumanRates,
    forcing: Forcing,
}

impl HumanDynamics {
    pub fn new(
        age_rate: Vec<FloatValue>,
        het_wt: Vec<FloatValue>,
        foi_eq: Array2<FloatValue>,
        rates: HumanRates,
        forcing: Forcing,
    ) -> DmmResult<Self> {
        let (na, nh) = foi_eq.dim();
        if na == 0 || nh == 0 || age_rate.len() != na || het_wt.len() != nh {
            return Err(DmmError::InvalidParameter {
                name: "foi_eq".to_string(),
                reason: format!(
                    "shape {:?} is inconsistent with {} age rates and {} bracket weights",
                    foi_eq.dim(),
                    age_rate.len(),
                    het_wt.len()
                ),
            });
        }
        rates.validate().map_err(|reason| DmmError::InvalidParameter {
            name: "rates".to_string(),
            reason,
        })?;
        Ok(Self {
            na,
            nh,
            age_rate,
            het_wt,
            foi_eq,
            rates,
            forcing,
        })
    }

    pub fn age_classes(&self) -> usize {
        self.na
    }

    pub fn brackets(&self) -> usize {
        self.nh
    }

    pub fn rates(&self) -> &HumanRates {
        &self.rates
    }

    pub fn forcing(&self) -> &Forcing {
        &self.forcing
    }

    /// Force of infection in age class `i`, bracket `j` at time `t`
    pub fn foi(&self, t: Time, i: usize, j: usize) -> FloatValue {
        self.foi_eq[[i, j]] * self.forcing.multiplier(t)
    }

    fn index(&self, compartment: usize, i: usize, j: usize) -> usize {
        (compartment * self.na + i) * self.nh + j
    }

    fn cell(&self, y: ArrayView1<FloatValue>, i: usize, j: usize) -> Vector6<FloatValue> {
        Vector6::from_fn(|c, _| y[self.index(c, i, j)])
    }

    /// Flatten per-compartment matrices into a state vector
    pub fn pack(&self, compartments: &[&Array2<FloatValue>]) -> DmmResult<ModelState> {
        if compartments.len() != COMPARTMENTS.len()
            || compartments.iter().any(|m| m.dim() != (self.na, self.nh))
        {
            return Err(DmmError::InvalidParameter {
                name: "init".to_string(),
                reason: format!(
                    "expected {} compartments of shape ({}, {})",
                    COMPARTMENTS.len(),
                    self.na,
                    self.nh
                ),
            });
        }
        let mut y = ModelState::zeros(self.dimension());
        for (c, m) in compartments.iter().enumerate() {
            for ((i, j), v) in m.indexed_iter() {
                y[self.index(c, i, j)] = *v;
            }
        }
        Ok(y)
    }
}

impl Derivatives for HumanDynamics {
    fn dimension(&self) -> usize {
        COMPARTMENTS.len() * self.na * self.nh
    }

    fn calculate_dy_dt(&self, t: Time, y: &ModelState, dy_dt: &mut ModelState) {
        let y = ArrayView1::from(y.as_slice());
        let multiplier = self.forcing.multiplier(t);

        for j in 0..self.nh {
            let mut younger: Option<Vector6<FloatValue>> = None;
            for i in 0..self.na {
                let x = self.cell(y, i, j);
                let transitions = self.rates.transitions(self.foi_eq[[i, j]] * multiplier);
                let mut dx = transitions * x - (self.rates.eta + self.age_rate[i]) * x;

                match (i, younger) {
                    (0, _) => dx[S] += self.rates.eta * self.het_wt[j],
                    (_, Some(previous)) => dx += self.age_rate[i - 1] * previous,
                    (_, None) => {}
                }

                for c in 0..COMPARTMENTS.len() {
                    dy_dt[self.index(c, i, j)] = dx[c];
                }
                younger = Some(x);
            }
        }
    }
}

/// An instantiated human model, ready to integrate
#[derive(Debug)]
pub struct HumanModel {
    integrator: OdeIntegrator<HumanDynamics>,
    initial: ModelState,
    age: Array1<FloatValue>,
    eir_eq: FloatValue,
}

impl HumanModel {
    /// Create a model from a (filtered) initial state
    pub fn from_state(
        state: &InitialState,
        forcing: Forcing,
        solver: SolverOptions,
    ) -> DmmResult<Self> {
        let dynamics = HumanDynamics::new(
            state.vector("age_rate")?.to_vec(),
            state.vector("het_wt")?.to_vec(),
            state.matrix("foi_eq")?.clone(),
            HumanRates::from_state(state)?,
            forcing,
        )?;
        let compartments = INITIAL_COMPARTMENTS
            .iter()
            .map(|name| state.matrix(name))
            .collect::<DmmResult<Vec<_>>>()?;
        let initial = dynamics.pack(&compartments)?;

        let age = state.vector("age")?.clone();
        if age.len() != dynamics.age_classes() {
            return Err(DmmError::InvalidParameter {
                name: "age".to_string(),
                reason: format!(
                    "{} ages supplied for {} age classes",
                    age.len(),
                    dynamics.age_classes()
                ),
            });
        }

        Ok(Self {
            integrator: OdeIntegrator::new(Arc::new(dynamics), solver),
            initial,
            age,
            eir_eq: state.scalar("EIR_eq")?,
        })
    }

    pub fn dynamics(&self) -> &HumanDynamics {
        self.integrator.rhs()
    }

    pub fn initial_state(&self) -> &ModelState {
        &self.initial
    }
}

impl OdeModel for HumanModel {
    fn integrate(
        &self,
        grid: &TimeGrid,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        self.integrator
            .solve(self.initial.clone(), grid, SolverStats::default(), retain)
    }

    fn continue_integration(
        &self,
        prior: &IntegrationResult,
        grid: &TimeGrid,
        token: ContinuationToken,
        retain: bool,
    ) -> DmmResult<(IntegrationResult, Option<ContinuationToken>)> {
        check_seam(prior, grid, &token)?;
        self.integrator.resume(grid, token, retain)
    }

    fn transform(&self, result: &IntegrationResult) -> DmmResult<OutputFrame> {
        let dynamics = self.dynamics();
        let (na, nh) = (dynamics.age_classes(), dynamics.brackets());
        let rates = dynamics.rates();
        let school_age: Vec<bool> = self.age.iter().map(|a| (2.0..10.0).contains(a)).collect();

        let mut values = Array2::zeros((result.len(), OUTPUT_COLUMNS.len()));
        for (row, t) in result.time().iter().enumerate() {
            let y = result.state_at(row);
            let mut totals = [0.0; 6];
            let mut incidence = 0.0;
            let (mut infected_2_10, mut population_2_10) = (0.0, 0.0);

            for i in 0..na {
                for j in 0..nh {
                    let cell = dynamics.cell(y, i, j);
                    for (total, value) in totals.iter_mut().zip(cell.iter()) {
                        *total += value;
                    }
                    incidence += rates.clinical_incidence(dynamics.foi(*t, i, j), &cell);
                    if school_age[i] {
                        infected_2_10 += cell[T] + cell[D] + cell[A];
                        population_2_10 += cell.sum();
                    }
                }
            }

            let mut out = values.row_mut(row);
            for (c, total) in totals.iter().enumerate() {
                out[c] = *total;
            }
            out[6] = totals[T] + totals[D] + totals[A];
            out[7] = match population_2_10 > 0.0 {
                true => infected_2_10 / population_2_10,
                false => 0.0,
            };
            out[8] = incidence;
            out[9] = self.eir_eq * dynamics.forcing().multiplier(*t);
        }

        OutputFrame::new(
            result.time().clone(),
            OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            values,
        )
    }
}
