//! Detection efficiency from an event n-tuple.
//!
//! An event counts as detected when its deposit column is positive. The
//! efficiency is a percentage with a Poisson error on the detected count.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DetectorError;
use crate::io::csv::read_ntuple;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    pub total: usize,
    pub detected: usize,
    /// Percent of events detected.
    pub efficiency: f64,
    /// Absolute error of `efficiency`, in percent.
    pub error: f64,
}

impl fmt::Display for Efficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Efficiency: {:.3} +/- {:.3} % ({} / {})",
            self.efficiency, self.error, self.detected, self.total
        )
    }
}

pub fn compute(total: usize, detected: usize) -> Result<Efficiency> {
    if total == 0 {
        bail!(DetectorError::InvalidConfig(
            "efficiency needs at least one event".to_string()
        ));
    }
    if detected > total {
        bail!(DetectorError::InvalidConfig(format!(
            "{detected} detected events out of {total}"
        )));
    }
    let efficiency = 100.0 * detected as f64 / total as f64;
    let error = if detected == 0 {
        0.0
    } else {
        efficiency / (detected as f64).sqrt()
    };
    Ok(Efficiency {
        total,
        detected,
        efficiency,
        error,
    })
}

/// Counts the rows of a CSV n-tuple and those with `column > 0`.
pub fn from_ntuple_csv(path: &Path, column: &str) -> Result<Efficiency> {
    let nt = read_ntuple(path)?;
    let Some(idx) = nt.column_index(column) else {
        bail!(DetectorError::Booking(format!(
            "column '{column}' not found in {}",
            path.display()
        )));
    };
    let total = nt.rows().len();
    let detected = nt.rows().iter().filter(|row| row[idx] > 0.0).count();
    compute(total, detected)
}

/// Appends `label\tefficiency\terror\tdetected\ttotal` to `path`.
pub fn append_record(path: &Path, label: &str, eff: &Efficiency) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    writeln!(
        file,
        "{label}\t{}\t{}\t{}\t{}",
        eff.efficiency, eff.error, eff.detected, eff.total
    )
    .with_context(|| format!("Failed to write file: {}", path.display()))?;
    info!("{label}: {eff} appended to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::csv::write_ntuple;
    use crate::sim::analysis::Ntuple;

    #[test]
    fn test_compute() {
        let e = compute(1000, 250).unwrap();
        assert!((e.efficiency - 25.0).abs() < 1e-12);
        assert!((e.error - 25.0 / 250f64.sqrt()).abs() < 1e-12);
        assert!((e.error - 1.581).abs() < 1e-3);

        let none = compute(10, 0).unwrap();
        assert_eq!(none.efficiency, 0.0);
        assert_eq!(none.error, 0.0);

        assert!(compute(0, 0).is_err());
        assert!(compute(1, 2).is_err());
    }

    #[test]
    fn test_from_ntuple_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut nt = Ntuple::new("B4", "Edep and TrackL");
        nt.create_d_column("Ediode").unwrap();
        nt.create_d_column("Ldiode").unwrap();
        nt.finish().unwrap();
        for e in [0.0, 0.2, 0.0, 0.5] {
            nt.fill_d_column(0, e).unwrap();
            nt.fill_d_column(1, 0.3).unwrap();
            nt.add_row().unwrap();
        }
        let csv = dir.path().join("run_nt_B4.csv");
        write_ntuple(&csv, &nt).unwrap();

        let eff = from_ntuple_csv(&csv, "Ediode").unwrap();
        assert_eq!((eff.detected, eff.total), (2, 4));
        assert!((eff.efficiency - 50.0).abs() < 1e-12);
        assert!(from_ntuple_csv(&csv, "Eannular").is_err());

        let dat = dir.path().join("electron_efficiency_data.dat");
        append_record(&dat, "1 MeV", &eff).unwrap();
        append_record(&dat, "2 MeV", &eff).unwrap();
        let text = std::fs::read_to_string(&dat).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields[0], "1 MeV");
        assert_eq!(fields[1].parse::<f64>().unwrap(), 50.0);
        assert_eq!(fields[3], "2");
        assert_eq!(fields[4], "4");
    }
}
