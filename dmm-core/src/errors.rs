use crate::timeseries::Time;
use thiserror::Error;

/// Error type for failed model runs.
///
/// Every failure is surfaced to the caller as-is. No step of a run retries or recovers locally.
#[derive(Error, Debug)]
pub enum DmmError {
    #[error("Parameter '{name}' is a standard model parameter and cannot be supplied as an extra parameter")]
    NameCollision { name: String },
    #[error("Unknown model variant '{name}'. Expected one of: {expected}")]
    UnknownModel { name: String, expected: String },
    #[error("Could not solve for the equilibrium initial state: {0}")]
    EquilibriumSolve(String),
    #[error("Model did not stabilise within the maximum horizon. Attempted end time={attempted_end}, max horizon={max_horizon}")]
    HorizonExceeded { attempted_end: Time, max_horizon: Time },
    #[error("Integration failed: {0}")]
    Integration(String),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Model input '{0}' is required but was not provided")]
    MissingInput(String),
    #[error("Invalid time grid: {0}")]
    InvalidTimeGrid(String),
    #[error("The integrator did not retain a continuation token")]
    MissingContinuation,
    #[error("Output series '{0}' not found")]
    MissingOutput(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, DmmError>`.
pub type DmmResult<T> = Result<T, DmmError>;
