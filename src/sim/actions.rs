//! Callbacks wiring the diode detector, its readout and the analysis output
//! into a run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::Vector;
use crate::geom::volume::VolumeTree;
use crate::sim::config::DetectorLayout;
use crate::sim::detector::{ANNULAR_LV, DIODE_LV, DetectorConstruction};
use crate::sim::event::{ANNULAR_COLLECTION, DIODE_COLLECTION, EventAggregator, Region};
use crate::sim::framework::{RunContext, SimulationCallbacks};
use crate::sim::hits::HitsOfEvent;
use crate::sim::sensitive::CalorimeterSd;

/// Run callbacks of the diode simulation. One instance per thread.
#[derive(Debug, Clone, Default)]
pub struct DiodeActions {
    aggregator: Option<EventAggregator>,
}

impl DiodeActions {
    pub fn new() -> Self {
        Self::default()
    }

    fn regions(ctx: &RunContext) -> Vec<Region> {
        let mut regions = vec![Region::diode(ctx.config.analysis.naming)];
        if ctx.config.geometry.layout == DetectorLayout::Annular {
            regions.push(Region::annular());
        }
        regions
    }
}

impl SimulationCallbacks for DiodeActions {
    fn name(&self) -> &'static str {
        "diode"
    }

    fn build_geometry(&mut self, ctx: &mut RunContext) -> Result<VolumeTree> {
        DetectorConstruction::new(ctx.config.geometry.clone()).build(ctx)
    }

    fn construct_sd_and_field(&mut self, ctx: &mut RunContext) -> Result<()> {
        let geometry = ctx.shared_geometry()?;
        let layers = ctx.config.geometry.layers;
        ctx.sd.bind(
            &geometry,
            DIODE_LV,
            CalorimeterSd::new("DiodeSD", DIODE_COLLECTION, layers),
        )?;
        if ctx.config.geometry.layout == DetectorLayout::Annular {
            // The ring is a single cell placed directly in its housing
            ctx.sd.bind(
                &geometry,
                ANNULAR_LV,
                CalorimeterSd::new("AnnularSD", ANNULAR_COLLECTION, 1).with_cell_depth(0),
            )?;
        }
        ctx.field.register(Vector::from(ctx.config.geometry.field));
        Ok(())
    }

    fn begin_of_run(&mut self, ctx: &mut RunContext) -> Result<()> {
        let mut aggregator = EventAggregator::new(Self::regions(ctx), ctx.config.run.print_progress);
        ctx.analysis.set_ntuple_merging(ctx.config.analysis.ntuple_merging);
        aggregator.book(&mut ctx.analysis, &ctx.config.analysis)?;
        let output = PathBuf::from(&ctx.config.analysis.output);
        ctx.analysis
            .open_file(&output)
            .with_context(|| format!("Cannot open analysis output {}", output.display()))?;
        self.aggregator = Some(aggregator);
        Ok(())
    }

    fn end_of_event(&mut self, event: &HitsOfEvent, ctx: &mut RunContext) -> Result<()> {
        let aggregator = self
            .aggregator
            .as_mut()
            .context("End of event before the run was started")?;
        aggregator.on_event_end(event, &ctx.sd, &mut ctx.analysis)
    }

    fn end_of_run(&mut self, ctx: &mut RunContext) -> Result<()> {
        let aggregator = self
            .aggregator
            .as_ref()
            .context("End of run before the run was started")?;
        let summary = ctx.analysis.summary(&aggregator.summary_histograms());
        if !summary.lines.is_empty() {
            info!("\n{summary}");
        }
        ctx.summary = Some(summary);
        ctx.analysis.write()?;
        ctx.analysis.close_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::RunConfig;

    #[test]
    fn test_single_thread_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::default();
        config.analysis.output = dir.path().join("B4.csv").display().to_string();
        config.geometry.field = [0.0, 0.0, 0.1];

        let mut master = RunContext::new(config);
        let mut actions = DiodeActions::new();
        let tree = actions.build_geometry(&mut master).unwrap();
        master.set_geometry(tree);

        let mut worker = master.worker(0);
        let mut worker_actions = DiodeActions::new();
        worker_actions.construct_sd_and_field(&mut worker).unwrap();
        assert!(worker.field.is_active());
        assert_eq!(worker.sd.detectors()[0].n_cells(), 1);

        worker_actions.begin_of_run(&mut worker).unwrap();
        let event = worker.sd.begin_event(0);
        worker_actions.end_of_event(&event, &mut worker).unwrap();
        worker_actions.end_of_run(&mut worker).unwrap();
        assert_eq!(worker.analysis.histograms().len(), 5);
        assert_eq!(worker.analysis.ntuple().unwrap().rows().len(), 1);
        // Merging is on: the worker leaves writing to the master
        assert!(worker.analysis.written_files().is_empty());
    }

    #[test]
    fn test_annular_regions() {
        let mut config = RunConfig::default();
        config.geometry.layout = DetectorLayout::Annular;
        let ctx = RunContext::new(config);
        let regions = DiodeActions::regions(&ctx);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].energy_name(), "Eannular");
    }
}
