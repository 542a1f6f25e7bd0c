//! Run statistics: histograms, the event n-tuple and the output file.

pub mod h1;
pub mod manager;
pub mod ntuple;
pub mod summary;

pub use h1::{BinStats, H1};
pub use manager::{AnalysisManager, FileState};
pub use ntuple::Ntuple;
pub use summary::{RunSummary, SummaryLine, SummaryScope};
