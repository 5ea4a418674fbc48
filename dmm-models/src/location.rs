//! Seasonal profiles of known locations

use crate::seasonality::FourierCoefficients;
use dmm_core::errors::{DmmError, DmmResult};
use dmm_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// A first level administrative unit within a country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub admin_unit: String,
}

impl Location {
    pub fn new(country: &str, admin_unit: &str) -> Self {
        Self {
            country: country.to_string(),
            admin_unit: admin_unit.to_string(),
        }
    }
}

/// Fitted seasonality of a single location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    pub country: String,
    pub admin_unit: String,
    pub ssa0: FloatValue,
    #[serde(default)]
    pub ssa1: FloatValue,
    #[serde(default)]
    pub ssa2: FloatValue,
    #[serde(default)]
    pub ssa3: FloatValue,
    #[serde(default)]
    pub ssb1: FloatValue,
    #[serde(default)]
    pub ssb2: FloatValue,
    #[serde(default)]
    pub ssb3: FloatValue,
}

impl SeasonalProfile {
    pub fn matches(&self, location: &Location) -> bool {
        self.country.eq_ignore_ascii_case(&location.country)
            && self.admin_unit.eq_ignore_ascii_case(&location.admin_unit)
    }

    pub fn coefficients(&self) -> FourierCoefficients {
        FourierCoefficients {
            ssa0: self.ssa0,
            ssa1: self.ssa1,
            ssa2: self.ssa2,
            ssa3: self.ssa3,
            ssb1: self.ssb1,
            ssb2: self.ssb2,
            ssb3: self.ssb3,
        }
    }
}

/// Lookup table of seasonal profiles, read from `[[locations]]` entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationTable {
    #[serde(default)]
    pub locations: Vec<SeasonalProfile>,
}

impl LocationTable {
    pub fn new(locations: Vec<SeasonalProfile>) -> Self {
        Self { locations }
    }

    pub fn from_toml_str(content: &str) -> DmmResult<Self> {
        toml::from_str(content).map_err(|e| DmmError::Config(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Find the profile for a location (case-insensitive)
    pub fn find(&self, location: &Location) -> DmmResult<&SeasonalProfile> {
        self.locations
            .iter()
            .find(|profile| profile.matches(location))
            .ok_or_else(|| {
                DmmError::EquilibriumSolve(format!(
                    "no seasonal profile for admin unit '{}' in '{}'",
                    location.admin_unit, location.country
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
[[locations]]
country = "Burkina Faso"
admin_unit = "Cascades"
ssa0 = 0.28
ssa1 = -0.32
ssb1 = 0.2

[[locations]]
country = "Ghana"
admin_unit = "Upper East"
ssa0 = 0.3
ssa2 = 0.05
"#;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = LocationTable::from_toml_str(TABLE).unwrap();
        assert_eq!(table.len(), 2);

        let profile = table.find(&Location::new("burkina faso", "CASCADES")).unwrap();
        let c = profile.coefficients();
        assert_eq!(c.ssa0, 0.28);
        assert_eq!(c.ssa1, -0.32);
        assert_eq!(c.ssb1, 0.2);
        assert_eq!(c.ssb3, 0.0);
    }

    #[test]
    fn unknown_location() {
        let table = LocationTable::from_toml_str(TABLE).unwrap();
        let err = table.find(&Location::new("Ghana", "Volta")).unwrap_err();
        assert!(matches!(err, DmmError::EquilibriumSolve(_)));
    }

    #[test]
    fn invalid_table() {
        let result = LocationTable::from_toml_str("[[locations]]\ncountry = 1");
        assert!(matches!(result, Err(DmmError::Config(_))));
    }
}
