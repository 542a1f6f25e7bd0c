//! Internal units and unit-aware formatting.
//!
//! Lengths are stored in mm and energies in MeV. Multiply by a constant to
//! convert into internal units, divide to convert out of them.

pub const MEV: f64 = 1.0;
pub const KEV: f64 = 1e-3;
pub const EV: f64 = 1e-6;
pub const GEV: f64 = 1e3;

pub const MM: f64 = 1.0;
pub const UM: f64 = 1e-3;
pub const NM: f64 = 1e-6;
pub const CM: f64 = 10.0;
pub const M: f64 = 1e3;

pub const DEG: f64 = std::f64::consts::PI / 180.0;

/// Density in g/cm3.
pub const G_PER_CM3: f64 = 1.0;

/// Lowest density allowed for a material (g/cm3).
pub const UNIVERSE_MEAN_DENSITY: f64 = 1e-25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Energy,
    Length,
}

impl Category {
    fn internal(self) -> &'static str {
        match self {
            Self::Energy => "MeV",
            Self::Length => "mm",
        }
    }

    /// Units from largest to smallest.
    fn table(self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Energy => &[("GeV", GEV), ("MeV", MEV), ("keV", KEV), ("eV", EV)],
            Self::Length => &[("m", M), ("cm", CM), ("mm", MM), ("um", UM), ("nm", NM)],
        }
    }
}

/// Formats a value with the largest unit in which it is at least 1.
pub fn best_unit(value: f64, category: Category) -> String {
    let table = category.table();
    if value == 0.0 || !value.is_finite() {
        return format!("{value} {}", category.internal());
    }
    let (name, scale) = table
        .iter()
        .find(|(_, scale)| value.abs() >= *scale)
        .unwrap_or(&table[table.len() - 1]);
    format!("{:.4} {name}", value / scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_unit_energy() {
        assert_eq!(best_unit(1.0, Category::Energy), "1.0000 MeV");
        assert_eq!(best_unit(0.25, Category::Energy), "250.0000 keV");
        assert_eq!(best_unit(2500.0, Category::Energy), "2.5000 GeV");
        assert_eq!(best_unit(1e-9, Category::Energy), "0.0010 eV");
    }

    #[test]
    fn test_best_unit_length() {
        assert_eq!(best_unit(0.3, Category::Length), "300.0000 um");
        assert_eq!(best_unit(14.5, Category::Length), "1.4500 cm");
        assert_eq!(best_unit(0.0, Category::Length), "0 mm");
    }
}
