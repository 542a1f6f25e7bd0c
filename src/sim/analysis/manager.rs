use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, info};

use super::h1::H1;
use super::ntuple::Ntuple;
use super::summary::{RunSummary, SummaryLine, SummaryScope};
use crate::error::DetectorError;
use crate::io::{OutputFormat, write_analysis};
use crate::units::Category;

/// Lifecycle of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Unopened,
    Open,
    Closed,
}

impl FileState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unopened => "not open",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Histograms, the event n-tuple and the output file of one thread.
///
/// Histogram and column ids are indices in booking order. Fills require an
/// open file; a closed file cannot be reopened.
///
/// The master writes the histograms merged from all workers. N-tuple rows
/// are merged too when n-tuple merging is on; otherwise every worker writes
/// its own n-tuple file with a `_t<N>` suffix.
#[derive(Debug, Clone)]
pub struct AnalysisManager {
    thread: Option<usize>,
    ntuple_merging: bool,
    histograms: Vec<H1>,
    ntuple: Option<Ntuple>,
    state: FileState,
    format: Option<OutputFormat>,
    path: Option<PathBuf>,
    written: Vec<PathBuf>,
}

impl AnalysisManager {
    /// Manager of the master thread.
    pub fn new() -> Self {
        Self {
            thread: None,
            ntuple_merging: false,
            histograms: Vec::new(),
            ntuple: None,
            state: FileState::Unopened,
            format: None,
            path: None,
            written: Vec::new(),
        }
    }

    pub fn for_worker(thread: usize) -> Self {
        Self {
            thread: Some(thread),
            ..Self::new()
        }
    }

    pub fn is_master(&self) -> bool {
        self.thread.is_none()
    }

    pub fn set_ntuple_merging(&mut self, merging: bool) {
        self.ntuple_merging = merging;
    }

    pub fn ntuple_merging(&self) -> bool {
        self.ntuple_merging
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.format
    }

    pub fn create_h1(&mut self, name: &str, title: &str, nbins: usize, min: f64, max: f64) -> Result<usize> {
        self.require_not_closed("book a histogram")?;
        if self.histograms.iter().any(|h| h.name == name) {
            bail!(DetectorError::Booking(format!("histogram '{name}' booked twice")));
        }
        self.histograms.push(H1::new(name, title, nbins, min, max)?);
        Ok(self.histograms.len() - 1)
    }

    pub fn create_ntuple(&mut self, name: &str, title: &str) -> Result<()> {
        self.require_not_closed("book an n-tuple")?;
        if let Some(nt) = &self.ntuple {
            bail!(DetectorError::Booking(format!(
                "n-tuple '{}' already booked, cannot book '{name}'",
                nt.name
            )));
        }
        self.ntuple = Some(Ntuple::new(name, title));
        Ok(())
    }

    pub fn create_ntuple_d_column(&mut self, name: &str) -> Result<usize> {
        self.ntuple_mut()?.create_d_column(name)
    }

    pub fn finish_ntuple(&mut self) -> Result<()> {
        self.ntuple_mut()?.finish()
    }

    /// Opens the output file; the extension selects the format.
    pub fn open_file(&mut self, path: &Path) -> Result<()> {
        if self.state != FileState::Unopened {
            bail!(DetectorError::SinkState {
                state: self.state.as_str(),
                action: "open a file",
            });
        }
        let format = OutputFormat::from_path(path)?;
        let path = if path.extension().is_none() {
            path.with_extension(format.extension())
        } else {
            path.to_path_buf()
        };
        if self.is_master() {
            info!("Using {} output: {}", format.type_name(), path.display());
        } else {
            debug!("Thread {:?} using {} output", self.thread, format.type_name());
        }
        self.format = Some(format);
        self.path = Some(path);
        self.state = FileState::Open;
        Ok(())
    }

    pub fn fill_h1(&mut self, id: usize, value: f64) -> Result<()> {
        self.require_open("fill a histogram")?;
        let n = self.histograms.len();
        let Some(h) = self.histograms.get_mut(id) else {
            bail!(DetectorError::Booking(format!("histogram id {id} not booked ({n} booked)")));
        };
        h.fill(value);
        Ok(())
    }

    pub fn fill_ntuple_d_column(&mut self, id: usize, value: f64) -> Result<()> {
        self.require_open("fill an n-tuple")?;
        self.ntuple_mut()?.fill_d_column(id, value)
    }

    pub fn add_ntuple_row(&mut self) -> Result<()> {
        self.require_open("add an n-tuple row")?;
        self.ntuple_mut()?.add_row()
    }

    /// Writes what this thread is responsible for and returns the files.
    pub fn write(&mut self) -> Result<Vec<PathBuf>> {
        self.require_open("write")?;
        let (Some(format), Some(path)) = (self.format, self.path.clone()) else {
            bail!("Output file was opened without a path");
        };
        let files = match self.thread {
            None => {
                let ntuple = if self.ntuple_merging {
                    self.ntuple.as_ref()
                } else {
                    None
                };
                write_analysis(format, &path, "", &self.histograms, ntuple)?
            }
            Some(_) if self.ntuple_merging => Vec::new(),
            Some(t) => match &self.ntuple {
                Some(nt) => write_analysis(format, &path, &format!("_t{t}"), &[], Some(nt))?,
                None => Vec::new(),
            },
        };
        for f in &files {
            debug!("Written {}", f.display());
        }
        self.written.extend(files.iter().cloned());
        Ok(files)
    }

    pub fn close_file(&mut self) -> Result<()> {
        self.require_open("close the file")?;
        self.state = FileState::Closed;
        Ok(())
    }

    /// Adds the histograms of a worker, and its n-tuple rows when merging.
    pub fn merge(&mut self, worker: &AnalysisManager) -> Result<()> {
        if self.histograms.len() != worker.histograms.len() {
            bail!(DetectorError::Booking(format!(
                "cannot merge {} histograms into {}",
                worker.histograms.len(),
                self.histograms.len()
            )));
        }
        for (mine, theirs) in self.histograms.iter_mut().zip(&worker.histograms) {
            mine.merge(theirs)?;
        }
        if self.ntuple_merging
            && let (Some(mine), Some(theirs)) = (self.ntuple.as_mut(), worker.ntuple.as_ref())
        {
            mine.merge(theirs)?;
        }
        Ok(())
    }

    pub fn h1(&self, id: usize) -> Option<&H1> {
        self.histograms.get(id)
    }

    pub fn h1_by_name(&self, name: &str) -> Option<&H1> {
        self.histograms.iter().find(|h| h.name == name)
    }

    pub fn histograms(&self) -> &[H1] {
        &self.histograms
    }

    pub fn ntuple(&self) -> Option<&Ntuple> {
        self.ntuple.as_ref()
    }

    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    /// Mean and rms of the given histograms, skipping empty ones.
    pub fn summary(&self, wanted: &[(usize, Category)]) -> RunSummary {
        let lines = wanted
            .iter()
            .filter_map(|&(id, category)| {
                let h = self.histograms.get(id)?;
                let entries = h.entries();
                (entries > 0).then(|| SummaryLine {
                    name: h.name.clone(),
                    category,
                    entries,
                    mean: h.mean(),
                    rms: h.rms(),
                })
            })
            .collect();
        RunSummary {
            scope: match self.thread {
                None => SummaryScope::Master,
                Some(t) => SummaryScope::Worker(t),
            },
            lines,
        }
    }

    fn ntuple_mut(&mut self) -> Result<&mut Ntuple> {
        self.ntuple
            .as_mut()
            .ok_or_else(|| DetectorError::Booking("no n-tuple booked".to_string()).into())
    }

    fn require_open(&self, action: &'static str) -> Result<()> {
        if self.state != FileState::Open {
            bail!(DetectorError::SinkState {
                state: self.state.as_str(),
                action,
            });
        }
        Ok(())
    }

    fn require_not_closed(&self, action: &'static str) -> Result<()> {
        if self.state == FileState::Closed {
            bail!(DetectorError::SinkState {
                state: self.state.as_str(),
                action,
            });
        }
        Ok(())
    }
}

impl Default for AnalysisManager {
    fn default() -> Self {
        Self::new()
    }
}
