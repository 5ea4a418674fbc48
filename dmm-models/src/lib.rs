//! Age-structured human malaria transmission models
//!
//! This crate provides the concrete models run by `dmm`:
//! - `human`: the S, T, D, A, U, P compartment model by age class and biting heterogeneity
//! - `equilibrium`: steady state initial conditions for a given transmission intensity
//! - `variants`: the closed set of model variants and the inputs each accepts
//!
//! # Forcing
//!
//! Variants differ only in their force of infection. Seasonal profiles are described by
//! Fourier coefficients (`seasonality`), optionally looked up by location (`location`).

pub mod equilibrium;
pub mod heterogeneity;
pub mod human;
pub mod location;
pub mod seasonality;
pub mod variants;
