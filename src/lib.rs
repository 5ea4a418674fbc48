//! Deterministic malaria model runs
//!
//! Two operations are provided:
//! - [`run_model`] integrates a model variant from equilibrium over a fixed number of days
//! - [`run_model_until_stable`] keeps extending the integration a year at a time until the
//!   chosen output stops changing
//!
//! ```no_run
//! use dmm::{run_model, RunOptions, ScenarioOptions};
//!
//! let scenario = ScenarioOptions {
//!     model: "seasonal".to_string(),
//!     init_eir: 50.0,
//!     ..Default::default()
//! };
//! let output = run_model(&RunOptions::new(scenario, 365)).unwrap();
//! let incidence = output.column("inc").unwrap();
//! ```

pub mod options;
pub mod runner;

pub use dmm_core::errors::{DmmError, DmmResult};
pub use dmm_core::frame::OutputFrame;
pub use dmm_core::stability::StabilityConfig;
pub use options::{Config, RunOptions, ScenarioOptions, StabilityOptions};
pub use runner::{build_parameters, run_model, run_model_until_stable};
