//! Options for model runs
//!
//! Options are plain `serde` structs with defaults for every field, so a configuration file
//! only needs to name the values it changes:
//!
//! ```toml
//! [scenario]
//! model = "seasonal"
//! init_eir = 50.0
//! extra_params = { irs_cov = 0.3 }
//!
//! [stability]
//! tolerance = 1e-5
//!
//! [[locations]]
//! country = "Burkina Faso"
//! admin_unit = "Cascades"
//! ssa0 = 0.28
//! ssa1 = -0.32
//! ```

use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::ivp::SolverOptions;
use dmm_core::parameters::ParameterValue;
use dmm_core::stability::StabilityConfig;
use dmm_core::timeseries::FloatValue;
use dmm_models::equilibrium::EquilibriumInputs;
use dmm_models::location::{Location, LocationTable, SeasonalProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Lower bounds of the default age classes (years)
pub const DEFAULT_AGES: [FloatValue; 21] = [
    0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 3.5, 5.0, 7.5, 10.0, 15.0, 20.0, 30.0, 40.0,
    50.0, 60.0, 70.0, 80.0,
];

/// Number of days simulated by a single run
pub const DEFAULT_HORIZON: usize = 100;

/// The setting a model is run for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOptions {
    /// Model variant name
    pub model: String,
    /// Lower bound of each age class (years)
    pub age: Vec<FloatValue>,
    /// Annual entomological inoculation rate at equilibrium
    pub init_eir: FloatValue,
    /// Fraction of clinical cases treated
    pub init_ft: FloatValue,
    pub het_brackets: usize,
    pub location: Option<Location>,
    /// Values for standard (or extra) parameters, set by name
    pub parameters: BTreeMap<String, FloatValue>,
    /// Extra parameters forwarded verbatim.
    ///
    /// These must not repeat a standard parameter or a name in `parameters`.
    pub extra_params: BTreeMap<String, ParameterValue>,
    pub solver: SolverOptions,
    /// Seasonal profiles that `location` is looked up in
    #[serde(skip)]
    pub locations: LocationTable,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            age: DEFAULT_AGES.to_vec(),
            init_eir: 10.0,
            init_ft: 0.4,
            het_brackets: 5,
            location: None,
            parameters: BTreeMap::new(),
            extra_params: BTreeMap::new(),
            solver: SolverOptions::default(),
            locations: LocationTable::default(),
        }
    }
}

impl ScenarioOptions {
    pub fn equilibrium_inputs(&self) -> EquilibriumInputs {
        EquilibriumInputs {
            age: self.age.clone(),
            eir: self.init_eir,
            ft: self.init_ft,
            het_brackets: self.het_brackets,
            location: self.location.clone(),
        }
    }
}

/// Options for a single run over a fixed horizon
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub scenario: ScenarioOptions,
    /// Simulated days. Output is reported for every day from 0 to `time` inclusive.
    pub time: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(ScenarioOptions::default(), DEFAULT_HORIZON)
    }
}

impl RunOptions {
    pub fn new(scenario: ScenarioOptions, time: usize) -> Self {
        Self { scenario, time }
    }

    pub fn from_toml_str(content: &str) -> DmmResult<Self> {
        Ok(Config::from_toml_str(content)?.run_options())
    }

    pub fn from_toml_file(path: &Path) -> DmmResult<Self> {
        Ok(Config::from_toml_file(path)?.run_options())
    }
}

/// Options for running a model until its output is stable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StabilityOptions {
    pub scenario: ScenarioOptions,
    pub stability: StabilityConfig,
}

impl StabilityOptions {
    pub fn new(scenario: ScenarioOptions, stability: StabilityConfig) -> Self {
        Self {
            scenario,
            stability,
        }
    }

    pub fn from_toml_str(content: &str) -> DmmResult<Self> {
        Ok(Config::from_toml_str(content)?.stability_options())
    }

    pub fn from_toml_file(path: &Path) -> DmmResult<Self> {
        Ok(Config::from_toml_file(path)?.stability_options())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub time: usize,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            time: DEFAULT_HORIZON,
        }
    }
}

/// Contents of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scenario: ScenarioOptions,
    pub run: RunSection,
    pub stability: StabilityConfig,
    pub locations: Vec<SeasonalProfile>,
}

impl Config {
    pub fn from_toml_str(content: &str) -> DmmResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| DmmError::Config(e.to_string()))?;
        config.stability.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> DmmResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Scenario with the configured location table attached
    pub fn scenario(&self) -> ScenarioOptions {
        ScenarioOptions {
            locations: LocationTable::new(self.locations.clone()),
            ..self.scenario.clone()
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.scenario(), self.run.time)
    }

    pub fn stability_options(&self) -> StabilityOptions {
        StabilityOptions::new(self.scenario(), self.stability.clone())
    }
}
