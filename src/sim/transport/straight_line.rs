use anyhow::{Result, bail};

use super::{StepSink, TransportEngine};
use crate::geom::volume::VolumeTree;
use crate::sim::materials::MaterialTable;
use crate::sim::primary::Primary;
use crate::sim::sensitive::Step;

/// Distance past the current point used to decide which volume a step is in.
const PROBE: f64 = 1e-7;

/// Shortest step taken when a boundary is closer than [`PROBE`].
const MIN_STEP: f64 = 1e-6;

const MAX_STEPS: usize = 1_000_000;

/// Straight tracks with continuous energy loss.
///
/// A charged particle of charge `q` loses `q^2 * stopping_power` MeV per mm
/// of the material it crosses and stops when its energy is used up.
/// Neutral particles cross the geometry without depositing anything.
/// Steps end at volume boundaries or after `max_step` mm.
#[derive(Debug, Clone)]
pub struct StraightLineTransport {
    max_step: f64,
}

impl StraightLineTransport {
    pub fn new(max_step: f64) -> Self {
        Self { max_step }
    }
}

impl TransportEngine for StraightLineTransport {
    fn name(&self) -> &'static str {
        "straight-line"
    }

    fn transport(
        &self,
        primary: &Primary,
        tree: &VolumeTree,
        materials: &MaterialTable,
        sink: &mut dyn StepSink,
    ) -> Result<()> {
        let dir = primary.direction;
        let charge = primary.particle.charge();
        let mut position = primary.position;
        let mut energy = primary.energy;

        for _ in 0..MAX_STEPS {
            let Some(touchable) = tree.locate(position.advance(dir, PROBE)) else {
                // Left the world
                return Ok(());
            };
            let logical = tree.physical(touchable.physical()).logical;
            let material = materials.get(&tree.logical(logical).material)?;

            let boundary = tree.distance_to_boundary(&touchable, position, dir);
            let mut length = boundary.min(self.max_step).max(MIN_STEP);
            let loss_per_mm = charge * charge * material.stopping_power;
            let mut edep = loss_per_mm * length;
            let stopped = edep >= energy && loss_per_mm > 0.0;
            if stopped {
                length = energy / loss_per_mm;
                edep = energy;
            }

            sink.on_step(&Step {
                particle: primary.particle,
                edep,
                length,
                pre_position: position,
                logical,
                touchable,
            })?;

            if stopped {
                return Ok(());
            }
            energy -= edep;
            position = position.advance(dir, length);
        }
        bail!(
            "Track of {} stuck after {MAX_STEPS} steps at {position}",
            primary.particle.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::rotation::RotationMatrix;
    use crate::geom::solid::Solid;
    use crate::sim::materials::Material;
    use crate::sim::primary::ParticleKind;
    use crate::{Point, Vector};

    fn slab_world() -> (VolumeTree, MaterialTable) {
        let mut materials = MaterialTable::new();
        materials.add(Material::galactic());
        materials.find_or_build("G4_Si").unwrap();
        let mut tree = VolumeTree::new(true);
        let world = tree
            .add_logical("World", Solid::new_box("World", 10., 10., 10.).unwrap(), "Galactic")
            .unwrap();
        let slab = tree
            .add_logical("DiodeLV", Solid::new_box("Diode", 5., 5., 0.15).unwrap(), "G4_Si")
            .unwrap();
        tree.place_world("World", world).unwrap();
        tree.place("Diode", slab, world, RotationMatrix::identity(), Vector::zero(), 0)
            .unwrap();
        (tree, materials)
    }

    fn primary(particle: ParticleKind, energy: f64) -> Primary {
        Primary {
            particle,
            energy,
            position: Point::new(0., 0., -10.),
            direction: Vector::new(0., 0., 1.),
        }
    }

    #[test]
    fn test_deposit_in_slab() {
        let (tree, materials) = slab_world();
        let mut steps: Vec<Step> = Vec::new();
        StraightLineTransport::new(100.0)
            .transport(&primary(ParticleKind::Electron, 10.0), &tree, &materials, &mut steps)
            .unwrap();
        let slab = tree.logical_index("DiodeLV").unwrap();
        let in_slab: Vec<&Step> = steps.iter().filter(|s| s.logical == slab).collect();
        assert_eq!(in_slab.len(), 1);
        assert!((in_slab[0].length - 0.3).abs() < 1e-6);
        assert!((in_slab[0].edep - 0.3876 * 0.3).abs() < 1e-6);
        // Vacuum before and after the slab
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().filter(|s| s.logical != slab).all(|s| s.edep == 0.0));
    }

    #[test]
    fn test_max_step_splits_track() {
        let (tree, materials) = slab_world();
        let mut steps: Vec<Step> = Vec::new();
        StraightLineTransport::new(0.1)
            .transport(&primary(ParticleKind::Electron, 10.0), &tree, &materials, &mut steps)
            .unwrap();
        let slab = tree.logical_index("DiodeLV").unwrap();
        let total: f64 = steps.iter().filter(|s| s.logical == slab).map(|s| s.edep).sum();
        assert!((total - 0.3876 * 0.3).abs() < 1e-6);
        assert!(steps.iter().filter(|s| s.logical == slab).count() >= 3);
    }

    #[test]
    fn test_particle_stops() {
        let (tree, materials) = slab_world();
        let mut steps: Vec<Step> = Vec::new();
        StraightLineTransport::new(100.0)
            .transport(&primary(ParticleKind::Electron, 0.05), &tree, &materials, &mut steps)
            .unwrap();
        let last = steps.last().unwrap();
        assert!((last.edep - 0.05).abs() < 1e-12);
        assert!(last.length < 0.3);
    }

    #[test]
    fn test_neutral_deposits_nothing() {
        let (tree, materials) = slab_world();
        let mut steps: Vec<Step> = Vec::new();
        StraightLineTransport::new(100.0)
            .transport(&primary(ParticleKind::Gamma, 1.0), &tree, &materials, &mut steps)
            .unwrap();
        assert!(steps.iter().all(|s| s.edep == 0.0));
    }
}
