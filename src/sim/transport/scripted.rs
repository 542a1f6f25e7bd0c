use anyhow::{Result, anyhow};

use super::{StepSink, TransportEngine};
use crate::Point;
use crate::geom::volume::VolumeTree;
use crate::sim::materials::MaterialTable;
use crate::sim::primary::Primary;
use crate::sim::sensitive::Step;

/// A step to replay: where it starts, what it deposits and how long it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedStep {
    pub position: Point,
    pub edep: f64,
    pub length: f64,
}

/// Replays the same list of steps for every event, ignoring the primary's
/// kinematics. The particle type is taken from the primary.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    steps: Vec<ScriptedStep>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self { steps }
    }

    pub fn with_step(mut self, position: Point, edep: f64, length: f64) -> Self {
        self.steps.push(ScriptedStep {
            position,
            edep,
            length,
        });
        self
    }
}

impl TransportEngine for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn transport(
        &self,
        primary: &Primary,
        tree: &VolumeTree,
        _materials: &MaterialTable,
        sink: &mut dyn StepSink,
    ) -> Result<()> {
        for s in &self.steps {
            let touchable = tree
                .locate(s.position)
                .ok_or_else(|| anyhow!("Scripted step at {} is outside the world", s.position))?;
            sink.on_step(&Step {
                particle: primary.particle,
                edep: s.edep,
                length: s.length,
                pre_position: s.position,
                logical: tree.physical(touchable.physical()).logical,
                touchable,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;
    use crate::geom::solid::Solid;
    use crate::sim::primary::ParticleKind;

    #[test]
    fn test_replay() {
        let mut tree = VolumeTree::new(true);
        let world = tree
            .add_logical("World", Solid::new_box("World", 5., 5., 5.).unwrap(), "Galactic")
            .unwrap();
        tree.place_world("World", world).unwrap();
        let engine = ScriptedTransport::default()
            .with_step(Point::new(0., 0., 1.), 1.0, 0.3)
            .with_step(Point::new(0., 0., 2.), 0.5, 0.1);
        let primary = Primary {
            particle: ParticleKind::Proton,
            energy: 3.0,
            position: Point::origin(),
            direction: Vector::new(0., 0., 1.),
        };
        let mut steps: Vec<Step> = Vec::new();
        engine
            .transport(&primary, &tree, &MaterialTable::new(), &mut steps)
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].edep, 0.5);
        assert_eq!(steps[0].particle, ParticleKind::Proton);

        let outside = ScriptedTransport::default().with_step(Point::new(0., 0., 9.), 1.0, 0.1);
        assert!(
            outside
                .transport(&primary, &tree, &MaterialTable::new(), &mut steps)
                .is_err()
        );
    }
}
