//! Particle transport through a volume tree.
//!
//! The engine moves a primary through the geometry and reports every step
//! to a [`StepSink`]. Physics is not modelled beyond what the engines below
//! need to produce steps.

pub mod scripted;
pub mod straight_line;

use anyhow::Result;

use crate::geom::volume::VolumeTree;
use crate::sim::materials::MaterialTable;
use crate::sim::primary::Primary;
use crate::sim::sensitive::Step;

pub use scripted::{ScriptedStep, ScriptedTransport};
pub use straight_line::StraightLineTransport;

/// Receives the steps of one event.
pub trait StepSink {
    fn on_step(&mut self, step: &Step) -> Result<()>;
}

impl StepSink for Vec<Step> {
    fn on_step(&mut self, step: &Step) -> Result<()> {
        self.push(step.clone());
        Ok(())
    }
}

/// Moves one primary through the geometry.
///
/// Engines are shared by all workers, so `transport` takes `&self`.
pub trait TransportEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn transport(
        &self,
        primary: &Primary,
        tree: &VolumeTree,
        materials: &MaterialTable,
        sink: &mut dyn StepSink,
    ) -> Result<()>;

    /// Whether charged tracks bend in a magnetic field.
    fn supports_field(&self) -> bool {
        false
    }
}
