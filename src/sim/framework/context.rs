use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::geom::volume::VolumeTree;
use crate::sim::analysis::{AnalysisManager, RunSummary};
use crate::sim::config::RunConfig;
use crate::sim::field::FieldSetup;
use crate::sim::materials::MaterialTable;
use crate::sim::sensitive::SdManager;

/// State of one thread of a run, passed explicitly to every callback.
///
/// The master context owns the geometry it built. Worker contexts share that
/// geometry and the material table read-only and own their sensitive
/// detectors, field and analysis output.
pub struct RunContext {
    pub config: RunConfig,
    pub materials: MaterialTable,
    pub field: FieldSetup,
    pub sd: SdManager,
    pub analysis: AnalysisManager,
    /// Filled by the end-of-run callback.
    pub summary: Option<RunSummary>,
    geometry: Option<Arc<VolumeTree>>,
    thread: Option<usize>,
}

impl RunContext {
    /// Master context of a run.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            materials: MaterialTable::new(),
            field: FieldSetup::new(),
            sd: SdManager::new(),
            analysis: AnalysisManager::new(),
            summary: None,
            geometry: None,
            thread: None,
        }
    }

    /// Context for worker `thread`, sharing this context's geometry.
    pub fn worker(&self, thread: usize) -> Self {
        Self {
            config: self.config.clone(),
            materials: self.materials.clone(),
            field: FieldSetup::new(),
            sd: SdManager::new(),
            analysis: AnalysisManager::for_worker(thread),
            summary: None,
            geometry: self.geometry.clone(),
            thread: Some(thread),
        }
    }

    pub fn is_master(&self) -> bool {
        self.thread.is_none()
    }

    pub fn thread(&self) -> Option<usize> {
        self.thread
    }

    pub fn set_geometry(&mut self, tree: VolumeTree) {
        self.geometry = Some(Arc::new(tree));
    }

    pub fn geometry(&self) -> Result<&VolumeTree> {
        self.geometry
            .as_deref()
            .ok_or_else(|| anyhow!("Geometry has not been built"))
    }

    pub(crate) fn shared_geometry(&self) -> Result<Arc<VolumeTree>> {
        self.geometry
            .clone()
            .ok_or_else(|| anyhow!("Geometry has not been built"))
    }
}
