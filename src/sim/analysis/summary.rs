use std::fmt;

use crate::units::{Category, best_unit};

/// Who printed the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryScope {
    Master,
    Worker(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub name: String,
    pub category: Category,
    pub entries: u64,
    pub mean: f64,
    pub rms: f64,
}

/// Mean and rms of selected histograms at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scope: SummaryScope,
    pub lines: Vec<SummaryLine>,
}

impl RunSummary {
    pub fn line(&self, name: &str) -> Option<&SummaryLine> {
        self.lines.iter().find(|l| l.name == name)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            SummaryScope::Master => "for the entire run",
            SummaryScope::Worker(_) => "for the local thread",
        };
        writeln!(f, " ----> print histograms statistic {scope}")?;
        writeln!(f)?;
        for l in &self.lines {
            writeln!(
                f,
                " {} : mean = {} rms = {}",
                l.name,
                best_unit(l.mean, l.category),
                best_unit(l.rms, l.category)
            )?;
        }
        Ok(())
    }
}
