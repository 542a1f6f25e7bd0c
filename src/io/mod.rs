//! File I/O for analysis results and geometry.
//!
//! The analysis output format is chosen from the file extension, the same
//! way for every run: `.csv` (default when there is no extension), `.xml`
//! and `.json`. ROOT and HDF5 files are recognised but not written.

pub mod csv;
pub mod geometry;
pub mod json;
pub mod xml;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::error::DetectorError;
use crate::sim::analysis::{H1, Ntuple};

pub use geometry::{read_geometry, write_geometry};

/// Analysis output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Xml,
    Json,
}

impl OutputFormat {
    /// Selects the format from the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "" | "csv" => Ok(Self::Csv),
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            _ => bail!(DetectorError::UnsupportedFormat(ext)),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xml => "xml",
            Self::Json => "json",
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Csv => "Csv",
            Self::Xml => "Xml",
            Self::Json => "Json",
        }
    }
}

/// `dir/stem{suffix}.ext`
pub(crate) fn with_suffix(base: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{stem}{suffix}.{ext}"))
}

/// Writes histograms and the n-tuple next to `base`, returning the files
/// created. `suffix` is inserted before each extension (e.g. `_t0`).
pub fn write_analysis(
    format: OutputFormat,
    base: &Path,
    suffix: &str,
    histograms: &[H1],
    ntuple: Option<&Ntuple>,
) -> Result<Vec<PathBuf>> {
    match format {
        OutputFormat::Csv => {
            let mut files = Vec::new();
            let stem = base
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            for h in histograms {
                let path = base.with_file_name(format!("{stem}_h1_{}{suffix}.csv", h.name));
                csv::write_h1(&path, h)?;
                files.push(path);
            }
            if let Some(nt) = ntuple {
                let path = base.with_file_name(format!("{stem}_nt_{}{suffix}.csv", nt.name));
                csv::write_ntuple(&path, nt)?;
                files.push(path);
            }
            Ok(files)
        }
        OutputFormat::Xml => {
            let path = with_suffix(base, suffix, "xml");
            xml::write_aida(&path, histograms, ntuple)?;
            Ok(vec![path])
        }
        OutputFormat::Json => {
            let path = with_suffix(base, suffix, "json");
            json::write_json(&path, histograms, ntuple)?;
            Ok(vec![path])
        }
    }
}
