//! Initial conditions for a model run.

use crate::errors::{DmmError, DmmResult};
use crate::parameters::{ParameterSet, ParameterValue};
use crate::timeseries::FloatValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named initial value.
///
/// Compartment values are resolved by age class (rows) and heterogeneity bracket (columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    Scalar(FloatValue),
    Vector(Array1<FloatValue>),
    Matrix(Array2<FloatValue>),
}

impl From<&ParameterValue> for StateValue {
    fn from(value: &ParameterValue) -> Self {
        match value {
            ParameterValue::Scalar(v) => StateValue::Scalar(*v),
            ParameterValue::Vector(v) => StateValue::Vector(Array1::from_vec(v.clone())),
        }
    }
}

/// The named values a model instance is constructed from.
///
/// An initial state usually carries more names than any one model accepts,
/// so it is filtered with [`InitialState::restrict_to`] before a model is instantiated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    values: BTreeMap<String, StateValue>,
}

impl InitialState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state holding every value of a parameter set.
    pub fn from_parameters(parameters: &ParameterSet) -> Self {
        Self {
            values: parameters
                .iter()
                .map(|(name, value)| (name.clone(), StateValue::from(value)))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: &str, value: StateValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&StateValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only the values whose names are in `accepted`.
    pub fn restrict_to(&self, accepted: &[&str]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(name, _)| accepted.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn scalar(&self, name: &str) -> DmmResult<FloatValue> {
        match self.require(name)? {
            StateValue::Scalar(v) => Ok(*v),
            _ => Err(wrong_shape(name, "scalar")),
        }
    }

    pub fn vector(&self, name: &str) -> DmmResult<&Array1<FloatValue>> {
        match self.require(name)? {
            StateValue::Vector(v) => Ok(v),
            _ => Err(wrong_shape(name, "vector")),
        }
    }

    pub fn matrix(&self, name: &str) -> DmmResult<&Array2<FloatValue>> {
        match self.require(name)? {
            StateValue::Matrix(v) => Ok(v),
            _ => Err(wrong_shape(name, "matrix")),
        }
    }

    fn require(&self, name: &str) -> DmmResult<&StateValue> {
        self.values
            .get(name)
            .ok_or_else(|| DmmError::MissingInput(name.to_string()))
    }
}

fn wrong_shape(name: &str, expected: &str) -> DmmError {
    DmmError::InvalidParameter {
        name: name.to_string(),
        reason: format!("expected a {} value", expected),
    }
}
