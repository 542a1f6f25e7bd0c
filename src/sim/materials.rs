use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;
use crate::units::UNIVERSE_MEAN_DENSITY;

/// Room temperature in K.
pub const STP_TEMPERATURE: f64 = 293.15;
/// Atmospheric pressure in Pa.
pub const STP_PRESSURE: f64 = 101_325.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialState {
    Solid,
    Liquid,
    Gas,
}

/// Bulk material used by logical volumes.
///
/// Either a single effective element (`z`, `a`) or a list of elements with
/// mass fractions. `stopping_power` is the mean energy loss of a minimum
/// ionising particle per unit length, in MeV/mm, used by the straight-line
/// transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Density in g/cm3.
    pub density: f64,
    pub state: MaterialState,
    /// Temperature in K.
    pub temperature: f64,
    /// Pressure in Pa.
    pub pressure: f64,
    /// Effective atomic number.
    pub z: f64,
    /// Effective molar mass in g/mole.
    pub a: f64,
    /// Element symbol and mass fraction.
    pub composition: Vec<(String, f64)>,
    pub stopping_power: f64,
}

impl Material {
    /// Single-element material at room conditions.
    pub fn new(name: &str, z: f64, a: f64, density: f64, state: MaterialState) -> Self {
        Self {
            name: name.to_string(),
            density,
            state,
            temperature: STP_TEMPERATURE,
            pressure: STP_PRESSURE,
            z,
            a,
            composition: Vec::new(),
            stopping_power: 0.0,
        }
    }

    pub fn with_conditions(mut self, temperature: f64, pressure: f64) -> Self {
        self.temperature = temperature;
        self.pressure = pressure;
        self
    }

    pub fn with_composition(mut self, composition: &[(&str, f64)]) -> Self {
        self.composition = composition
            .iter()
            .map(|(el, frac)| (el.to_string(), *frac))
            .collect();
        self
    }

    pub fn with_stopping_power(mut self, stopping_power: f64) -> Self {
        self.stopping_power = stopping_power;
        self
    }

    /// Intergalactic vacuum: hydrogen at the universe mean density.
    pub fn galactic() -> Self {
        Self::new("Galactic", 1.0, 1.01, UNIVERSE_MEAN_DENSITY, MaterialState::Gas)
            .with_conditions(2.73, 3e-18)
    }

    /// Looks up a material of the NIST database subset known to this crate.
    pub fn nist(name: &str) -> Option<Self> {
        let m = match name {
            "G4_Si" => Self::new(name, 14.0, 28.0855, 2.33, MaterialState::Solid)
                .with_composition(&[("Si", 1.0)])
                .with_stopping_power(0.3876),
            "G4_Al" => Self::new(name, 13.0, 26.9815, 2.699, MaterialState::Solid)
                .with_composition(&[("Al", 1.0)])
                .with_stopping_power(0.4359),
            "G4_ALUMINUM_OXIDE" => Self::new(name, 10.0, 20.392, 3.97, MaterialState::Solid)
                .with_composition(&[("Al", 0.529251), ("O", 0.470749)])
                .with_stopping_power(0.6538),
            "G4_AIR" => Self::new(name, 7.3, 14.6, 1.20479e-3, MaterialState::Gas)
                .with_composition(&[("C", 0.000124), ("N", 0.755268), ("O", 0.231781), ("Ar", 0.012827)])
                .with_stopping_power(2.187e-4),
            _ => return None,
        };
        Some(m)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " Material: {:>20}    density: {:.4e} g/cm3   State: {:?}   T: {:.2} K  P: {:.3e} Pa",
            self.name, self.density, self.state, self.temperature, self.pressure
        )?;
        if self.composition.is_empty() {
            write!(f, "   Z: {:.2}  A: {:.3} g/mole", self.z, self.a)
        } else {
            let parts: Vec<String> = self
                .composition
                .iter()
                .map(|(el, frac)| format!("{el} {:.2}%", 100.0 * frac))
                .collect();
            write!(f, "   [{}]", parts.join(", "))
        }
    }
}

/// Materials defined for a run, addressed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialTable {
    materials: BTreeMap<String, Material>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a material.
    pub fn add(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    /// Returns the material, building it from the NIST subset on first use.
    pub fn find_or_build(&mut self, name: &str) -> Result<&Material> {
        if !self.materials.contains_key(name) {
            let m = Material::nist(name)
                .ok_or_else(|| DetectorError::MaterialNotFound(name.to_string()))?;
            self.add(m);
        }
        self.get(name)
    }

    /// Returns a material already in the table.
    pub fn get(&self, name: &str) -> Result<&Material> {
        self.materials
            .get(name)
            .ok_or_else(|| DetectorError::MaterialNotFound(name.to_string()).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }
}

impl fmt::Display for MaterialTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "***** Table : Nb of materials = {} *****", self.len())?;
        for m in self.iter() {
            writeln!(f, "{m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_galactic() {
        let m = Material::galactic();
        assert_eq!(m.state, MaterialState::Gas);
        assert_eq!(m.temperature, 2.73);
        assert_eq!(m.density, UNIVERSE_MEAN_DENSITY);
        assert_eq!(m.stopping_power, 0.0);
    }

    #[test]
    fn test_find_or_build() {
        let mut table = MaterialTable::new();
        assert!(table.get("G4_Si").is_err());
        let si = table.find_or_build("G4_Si").unwrap();
        assert_eq!(si.z, 14.0);
        assert!(table.contains("G4_Si"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_material() {
        let mut table = MaterialTable::new();
        let err = table.find_or_build("G4_UNOBTAINIUM").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DetectorError>(),
            Some(DetectorError::MaterialNotFound(name)) if name == "G4_UNOBTAINIUM"
        ));
    }

    #[test]
    fn test_composition_sums_to_one() {
        for name in ["G4_Si", "G4_Al", "G4_ALUMINUM_OXIDE", "G4_AIR"] {
            let m = Material::nist(name).unwrap();
            let total: f64 = m.composition.iter().map(|(_, f)| f).sum();
            assert!((total - 1.0).abs() < 1e-3, "{name}: {total}");
        }
    }

    #[test]
    fn test_display_table() {
        let mut table = MaterialTable::new();
        table.add(Material::galactic());
        table.find_or_build("G4_ALUMINUM_OXIDE").unwrap();
        let text = table.to_string();
        assert!(text.contains("Nb of materials = 2"));
        assert!(text.contains("Galactic"));
        assert!(text.contains("O 47.07%"));
    }
}
