//! Named model parameters.
//!
//! A [`ParameterSet`] is the canonical mapping of parameter names to values used by the
//! equilibrium initializer and the model variants.
//! It always contains every standard parameter (see [`STANDARD_PARAMETERS`]) and may carry any
//! number of extra named values which are forwarded verbatim.

use crate::errors::{DmmError, DmmResult};
use crate::timeseries::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Scalar(FloatValue),
    Vector(Vec<FloatValue>),
}

impl ParameterValue {
    pub fn as_scalar(&self) -> Option<FloatValue> {
        match self {
            ParameterValue::Scalar(v) => Some(*v),
            ParameterValue::Vector(_) => None,
        }
    }
}

impl From<FloatValue> for ParameterValue {
    fn from(value: FloatValue) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<Vec<FloatValue>> for ParameterValue {
    fn from(value: Vec<FloatValue>) -> Self {
        ParameterValue::Vector(value)
    }
}

/// Standard parameter names and their default values.
///
/// Rates are per day unless noted otherwise.
pub const STANDARD_PARAMETERS: &[(&str, FloatValue)] = &[
    // Human mortality rate (mean life expectancy of 21 years)
    ("eta", 1.0 / (21.0 * 365.0)),
    // Age-dependent biting: psi = 1 - rho * exp(-age / a0)
    ("rho", 0.85),
    // unit: days
    ("a0", 2920.0),
    // Variance of the log heterogeneity in biting rates
    ("sigma2", 1.67),
    // Probability that an infectious bite results in infection
    ("b", 0.59),
    // Probability that an infection is clinical
    ("phi", 0.5),
    // Recovery from treated disease
    ("rT", 0.2),
    // Recovery from untreated disease to asymptomatic infection
    ("rD", 0.2),
    // Clearance of patent asymptomatic infection
    ("rA", 1.0 / 195.0),
    // Clearance of sub-patent infection
    ("rU", 1.0 / 110.0),
    // Loss of prophylaxis after treatment
    ("rP", 1.0 / 25.0),
    // Fourier coefficients of the seasonal transmission profile
    ("ssa0", 1.0),
    ("ssa1", 0.5),
    ("ssa2", 0.0),
    ("ssa3", 0.0),
    ("ssb1", 0.0),
    ("ssb2", 0.0),
    ("ssb3", 0.0),
    // Bed net coverage and per-bite protective efficacy
    ("itn_cov", 0.0),
    ("itn_efficacy", 0.5),
    // unit: days
    ("intervention_start", 0.0),
];

/// Returns true if `name` is one of the standard (reserved) parameter names.
pub fn is_standard_parameter(name: &str) -> bool {
    STANDARD_PARAMETERS.iter().any(|(n, _)| *n == name)
}

/// An immutable set of named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    values: BTreeMap<String, ParameterValue>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            values: STANDARD_PARAMETERS
                .iter()
                .map(|(name, value)| (name.to_string(), ParameterValue::Scalar(*value)))
                .collect(),
        }
    }
}

impl ParameterSet {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Get a scalar parameter
    ///
    /// Returns an error if the parameter is missing or is not a scalar.
    pub fn scalar(&self, name: &str) -> DmmResult<FloatValue> {
        match self.values.get(name) {
            Some(ParameterValue::Scalar(v)) => Ok(*v),
            Some(ParameterValue::Vector(_)) => Err(DmmError::InvalidParameter {
                name: name.to_string(),
                reason: "expected a scalar value".to_string(),
            }),
            None => Err(DmmError::MissingInput(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build a [`ParameterSet`] from the defaults plus caller supplied values.
///
/// Values can be supplied individually with [`ParameterBuilder::set`], which may override a
/// standard parameter or add an extra one, or as a single aggregate with
/// [`ParameterBuilder::with_overrides`].
/// Keys in the aggregate must not name a standard parameter or a value already set by name.
///
/// # Examples
///
/// ```
/// use dmm_core::parameters::{ParameterBuilder, ParameterValue};
/// use std::collections::BTreeMap;
///
/// let mut extras = BTreeMap::new();
/// extras.insert("irs_decay".to_string(), ParameterValue::Scalar(0.01));
///
/// let parameters = ParameterBuilder::new()
///     .set("rho", 0.9)
///     .with_overrides(extras)
///     .build()
///     .unwrap();
/// assert_eq!(parameters.scalar("rho").unwrap(), 0.9);
/// assert!(parameters.contains("irs_decay"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct ParameterBuilder {
    named: Vec<(String, ParameterValue)>,
    overrides: Vec<(String, ParameterValue)>,
}

impl ParameterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single named value
    pub fn set(&mut self, name: &str, value: impl Into<ParameterValue>) -> &mut Self {
        self.named.push((name.to_string(), value.into()));
        self
    }

    /// Supply an aggregate of extra parameters
    pub fn with_overrides(
        &mut self,
        overrides: impl IntoIterator<Item = (String, ParameterValue)>,
    ) -> &mut Self {
        self.overrides.extend(overrides);
        self
    }

    /// Merge the supplied values into the defaults
    ///
    /// Fails with [`DmmError::NameCollision`] if any aggregate key duplicates a standard
    /// parameter name or a value supplied by name.
    pub fn build(&self) -> DmmResult<ParameterSet> {
        let mut parameters = ParameterSet::default();

        for (name, value) in &self.named {
            if is_standard_parameter(name) && value.as_scalar().is_none() {
                return Err(DmmError::InvalidParameter {
                    name: name.clone(),
                    reason: "standard parameters must be scalars".to_string(),
                });
            }
            parameters.values.insert(name.clone(), value.clone());
        }

        for (name, value) in &self.overrides {
            let supplied_by_name = self.named.iter().any(|(n, _)| n == name);
            if is_standard_parameter(name) || supplied_by_name {
                return Err(DmmError::NameCollision { name: name.clone() });
            }
            if parameters.values.insert(name.clone(), value.clone()).is_some() {
                return Err(DmmError::NameCollision { name: name.clone() });
            }
        }

        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extras(names: &[&str]) -> Vec<(String, ParameterValue)> {
        names
            .iter()
            .map(|n| (n.to_string(), ParameterValue::Scalar(1.0)))
            .collect()
    }

    #[test]
    fn defaults_contain_every_standard_parameter() {
        let parameters = ParameterBuilder::new().build().unwrap();
        assert_eq!(parameters.len(), STANDARD_PARAMETERS.len());
        for (name, value) in STANDARD_PARAMETERS {
            assert_eq!(parameters.scalar(name).unwrap(), *value);
        }
    }

    #[test]
    fn named_values_override_defaults() {
        let parameters = ParameterBuilder::new()
            .set("phi", 0.3)
            .set("custom", vec![1.0, 2.0])
            .build()
            .unwrap();
        assert_eq!(parameters.scalar("phi").unwrap(), 0.3);
        assert_eq!(
            parameters.get("custom"),
            Some(&ParameterValue::Vector(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn aggregate_with_reserved_name_collides() {
        for (name, _) in STANDARD_PARAMETERS {
            let result = ParameterBuilder::new()
                .with_overrides(extras(&["fine", *name]))
                .build();
            match result {
                Err(DmmError::NameCollision { name: collided }) => assert_eq!(collided, *name),
                other => panic!("expected a name collision for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn disjoint_aggregate_never_collides() {
        let parameters = ParameterBuilder::new()
            .set("rho", 0.5)
            .with_overrides(extras(&["alpha", "beta", "gamma"]))
            .build()
            .unwrap();
        assert!(parameters.contains("alpha"));
        assert!(parameters.contains("gamma"));
        assert_eq!(parameters.scalar("rho").unwrap(), 0.5);
    }

    #[test]
    fn aggregate_duplicating_named_extra_collides() {
        let result = ParameterBuilder::new()
            .set("alpha", 2.0)
            .with_overrides(extras(&["alpha"]))
            .build();
        assert!(matches!(result, Err(DmmError::NameCollision { .. })));
    }

    #[test]
    fn vector_standard_parameter_is_rejected() {
        let result = ParameterBuilder::new().set("eta", vec![0.1]).build();
        assert!(matches!(result, Err(DmmError::InvalidParameter { .. })));
    }

    #[test]
    fn scalar_lookup_errors() {
        let parameters = ParameterBuilder::new()
            .set("ages", vec![0.0, 1.0])
            .build()
            .unwrap();
        assert!(matches!(
            parameters.scalar("ages"),
            Err(DmmError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parameters.scalar("missing"),
            Err(DmmError::MissingInput(_))
        ));
    }

    #[test]
    fn untagged_values_deserialise() {
        let value: BTreeMap<String, ParameterValue> =
            toml::from_str("a = 1.5\nb = [1.0, 2.0]").unwrap();
        assert_eq!(value["a"], ParameterValue::Scalar(1.5));
        assert_eq!(value["b"], ParameterValue::Vector(vec![1.0, 2.0]));
    }
}
