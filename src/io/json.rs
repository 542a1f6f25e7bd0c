use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sim::analysis::{H1, Ntuple};

/// Contents of a JSON analysis file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFile {
    pub histograms: Vec<H1>,
    pub ntuple: Option<Ntuple>,
}

pub fn write_json(path: &Path, histograms: &[H1], ntuple: Option<&Ntuple>) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let contents = AnalysisFile {
        histograms: histograms.to_vec(),
        ntuple: ntuple.cloned(),
    };
    serde_json::to_writer_pretty(BufWriter::new(file), &contents)
        .with_context(|| format!("Failed to serialize analysis to: {}", path.display()))?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<AnalysisFile> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to deserialize analysis from: {}", path.display()))
}
