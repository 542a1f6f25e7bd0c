use anyhow::Result;

use super::RunContext;
use crate::geom::volume::VolumeTree;
use crate::sim::hits::HitsOfEvent;

/// User hooks called by the [`RunManager`](super::RunManager).
///
/// One instance is created for the master and one per worker. The master
/// builds the geometry and takes part in `begin_of_run`/`end_of_run`;
/// workers bind sensitive detectors and see every event.
pub trait SimulationCallbacks: Send {
    /// Human-readable identifier for logs.
    fn name(&self) -> &'static str;

    /// Builds materials and volumes. Called once, on the master.
    fn build_geometry(&mut self, ctx: &mut RunContext) -> Result<VolumeTree>;

    /// Binds sensitive detectors and sets the field. Called on each worker.
    fn construct_sd_and_field(&mut self, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    fn begin_of_run(&mut self, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    fn begin_of_event(&mut self, _event: &HitsOfEvent, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }

    /// Called once the transport of an event is complete.
    fn end_of_event(&mut self, event: &HitsOfEvent, ctx: &mut RunContext) -> Result<()>;

    fn end_of_run(&mut self, _ctx: &mut RunContext) -> Result<()> {
        Ok(())
    }
}
