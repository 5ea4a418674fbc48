//! Core types for running deterministic, age-structured malaria transmission models.
//!
//! The crate defines the seams a model run is assembled from:
//! - [`parameters`]: named parameter sets and how caller overrides are merged into them
//! - [`state`]: the named initial values a model is constructed from
//! - [`ivp`]: the [`ivp::OdeModel`] contract and an `ode_solvers` backed integrator
//! - [`frame`]: named output series
//! - [`stability`]: the loop that extends an integration until the output stabilises

pub mod errors;
pub mod frame;
pub mod ivp;
pub mod parameters;
pub mod stability;
pub mod state;
pub mod timeseries;
