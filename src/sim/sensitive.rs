//! Sensitive detectors and their binding to logical volumes.

use std::collections::HashMap;

use anyhow::{Result, bail};
use tracing::debug;

use crate::Point;
use crate::error::DetectorError;
use crate::geom::navigation::Touchable;
use crate::geom::volume::VolumeTree;
use crate::sim::hits::{HitRecord, HitsCollection, HitsOfEvent};
use crate::sim::primary::ParticleKind;

/// One transport step inside a volume, as reported by the transport engine.
#[derive(Debug, Clone)]
pub struct Step {
    pub particle: ParticleKind,
    /// Energy deposited along the step (MeV).
    pub edep: f64,
    /// Step length (mm).
    pub length: f64,
    pub pre_position: Point,
    /// Logical volume of the pre-step point.
    pub logical: usize,
    pub touchable: Touchable,
}

/// Calorimeter-style sensitive detector: one hit per cell plus a total.
///
/// The cell of a step is the copy number found `cell_depth` levels above
/// the sensitive volume in the touchable (1 = the replicated layer that
/// holds the volume).
#[derive(Debug, Clone)]
pub struct CalorimeterSd {
    name: String,
    collection_name: String,
    n_cells: usize,
    cell_depth: usize,
}

impl CalorimeterSd {
    pub fn new(name: &str, collection_name: &str, n_cells: usize) -> Self {
        Self {
            name: name.to_string(),
            collection_name: collection_name.to_string(),
            n_cells,
            cell_depth: 1,
        }
    }

    pub fn with_cell_depth(mut self, depth: usize) -> Self {
        self.cell_depth = depth;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Fresh collection for a new event: `n_cells` empty hits and the total.
    pub fn initialize(&self) -> HitsCollection {
        let mut hc = HitsCollection::new(&self.name, &self.collection_name);
        for _ in 0..=self.n_cells {
            hc.insert(HitRecord::new());
        }
        hc
    }

    /// Adds a step to its cell and to the total. Returns `false` for steps
    /// that carry neither energy nor length.
    pub fn process_hits(&self, step: &Step, hits: &mut HitsCollection) -> Result<bool> {
        let step_length = if step.particle.is_charged() {
            step.length
        } else {
            0.0
        };
        if step.edep == 0.0 && step_length == 0.0 {
            return Ok(false);
        }

        let cell = step.touchable.copy_number(self.cell_depth).unwrap_or(0);
        if cell >= self.n_cells {
            bail!(DetectorError::CellOutOfRange {
                detector: self.name.clone(),
                cell,
                cells: self.n_cells,
            });
        }
        let position = step.pre_position.to_vector();
        let total = hits.entries() - 1;
        for i in [cell, total] {
            let Some(hit) = hits.get_mut(i) else {
                bail!(
                    "Hits collection '{}' has {} entries, expected {}",
                    self.collection_name,
                    hits.entries(),
                    self.n_cells + 1
                );
            };
            hit.add(step.edep, step_length, position);
        }
        Ok(true)
    }
}

/// Handle returned when a detector is bound to a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdHandle {
    pub detector: usize,
    pub collection_id: usize,
}

/// Registry of sensitive detectors for one worker.
///
/// Collection ids are the registration order of the detectors.
#[derive(Debug, Clone, Default)]
pub struct SdManager {
    detectors: Vec<CalorimeterSd>,
    by_logical: HashMap<usize, usize>,
}

impl SdManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sd` and marks the logical volume `logical_name` as sensitive.
    pub fn bind(&mut self, tree: &VolumeTree, logical_name: &str, sd: CalorimeterSd) -> Result<SdHandle> {
        let logical = tree.logical_index(logical_name)?;
        if self.detectors.iter().any(|d| d.name == sd.name) {
            bail!(DetectorError::InvalidConfig(format!(
                "sensitive detector '{}' registered twice",
                sd.name
            )));
        }
        if self
            .detectors
            .iter()
            .any(|d| d.collection_name == sd.collection_name)
        {
            bail!(DetectorError::InvalidConfig(format!(
                "hits collection '{}' registered twice",
                sd.collection_name
            )));
        }
        if let Some(&other) = self.by_logical.get(&logical) {
            bail!(DetectorError::InvalidConfig(format!(
                "'{logical_name}' is already bound to '{}'",
                self.detectors[other].name
            )));
        }
        debug!(
            "Binding {} ({}) to {logical_name}",
            sd.name, sd.collection_name
        );
        self.detectors.push(sd);
        let id = self.detectors.len() - 1;
        self.by_logical.insert(logical, id);
        Ok(SdHandle {
            detector: id,
            collection_id: id,
        })
    }

    pub fn collection_id(&self, name: &str) -> Result<usize> {
        self.detectors
            .iter()
            .position(|d| d.collection_name == name)
            .ok_or_else(|| DetectorError::CollectionNotFound(name.to_string()).into())
    }

    pub fn detectors(&self) -> &[CalorimeterSd] {
        &self.detectors
    }

    pub fn is_sensitive(&self, logical: usize) -> bool {
        self.by_logical.contains_key(&logical)
    }

    /// Creates the event's collections, one per registered detector.
    pub fn begin_event(&self, event_id: usize) -> HitsOfEvent {
        let mut event = HitsOfEvent::new(event_id, self.detectors.len());
        for (id, sd) in self.detectors.iter().enumerate() {
            event.add_collection(id, sd.initialize());
        }
        event
    }

    /// Routes a step to the detector bound to its volume, if any.
    pub fn process_step(&self, step: &Step, event: &mut HitsOfEvent) -> Result<()> {
        let Some(&id) = self.by_logical.get(&step.logical) else {
            return Ok(());
        };
        let sd = &self.detectors[id];
        let Some(hits) = event.get_mut(id) else {
            bail!(DetectorError::CollectionNotFound(sd.collection_name.clone()));
        };
        sd.process_hits(step, hits)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;
    use crate::geom::rotation::RotationMatrix;
    use crate::geom::solid::Solid;
    use crate::geom::volume::Axis;

    /// World > Calorimeter > 2 x Layer > Diode
    fn two_layer_tree() -> VolumeTree {
        let mut tree = VolumeTree::new(true);
        let world = tree
            .add_logical("World", Solid::new_box("World", 20., 20., 20.).unwrap(), "Galactic")
            .unwrap();
        let calor = tree
            .add_logical("Calorimeter", Solid::new_box("Calorimeter", 6., 6., 2.).unwrap(), "Galactic")
            .unwrap();
        let layer = tree
            .add_logical("Layer", Solid::new_box("Layer", 6., 6., 1.).unwrap(), "Galactic")
            .unwrap();
        let diode = tree
            .add_logical("DiodeLV", Solid::new_box("Diode", 5., 5., 0.5).unwrap(), "G4_Si")
            .unwrap();
        tree.place_world("World", world).unwrap();
        tree.place("Calorimeter", calor, world, RotationMatrix::identity(), Vector::zero(), 0)
            .unwrap();
        tree.replicate("Layer", layer, calor, Axis::Z, 2, 2.0).unwrap();
        tree.place("Diode", diode, layer, RotationMatrix::identity(), Vector::new(0., 0., -0.5), 0)
            .unwrap();
        tree
    }

    fn step_at(tree: &VolumeTree, p: Point, particle: ParticleKind, edep: f64, length: f64) -> Step {
        let touchable = tree.locate(p).unwrap();
        Step {
            particle,
            edep,
            length,
            pre_position: p,
            logical: tree.physical(touchable.physical()).logical,
            touchable,
        }
    }

    #[test]
    fn test_cells_and_total() {
        let tree = two_layer_tree();
        let mut sdm = SdManager::new();
        let h = sdm
            .bind(&tree, "DiodeLV", CalorimeterSd::new("DiodeSD", "DiodeHitsCollection", 2))
            .unwrap();
        let mut event = sdm.begin_event(0);
        assert_eq!(event.get(h.collection_id).unwrap().entries(), 3);

        let e = ParticleKind::Electron;
        sdm.process_step(&step_at(&tree, Point::new(0., 0., -1.8), e, 0.1, 0.2), &mut event)
            .unwrap();
        sdm.process_step(&step_at(&tree, Point::new(0., 0., 0.2), e, 0.3, 0.4), &mut event)
            .unwrap();
        // Outside the diode: ignored
        sdm.process_step(&step_at(&tree, Point::new(0., 0., 1.5), e, 5.0, 1.0), &mut event)
            .unwrap();

        let hc = event.get(h.collection_id).unwrap();
        assert!((hc.get(0).unwrap().edep() - 0.1).abs() < 1e-12);
        assert!((hc.get(1).unwrap().edep() - 0.3).abs() < 1e-12);
        let total = hc.last().unwrap();
        assert!((total.edep() - 0.4).abs() < 1e-12);
        assert!((total.track_length() - 0.6).abs() < 1e-12);
        assert!(total.position().is_close(&Vector::new(0., 0., -1.6)));
    }

    #[test]
    fn test_zero_step_and_neutral_length() {
        let tree = two_layer_tree();
        let sd = CalorimeterSd::new("DiodeSD", "DiodeHitsCollection", 2);
        let mut hc = sd.initialize();
        let p = Point::new(0., 0., -1.8);
        assert!(!sd.process_hits(&step_at(&tree, p, ParticleKind::Electron, 0.0, 0.0), &mut hc).unwrap());
        // A photon step with no deposit carries no length either
        assert!(!sd.process_hits(&step_at(&tree, p, ParticleKind::Gamma, 0.0, 0.7), &mut hc).unwrap());
        assert!(sd.process_hits(&step_at(&tree, p, ParticleKind::Gamma, 0.2, 0.7), &mut hc).unwrap());
        let total = hc.last().unwrap();
        assert!((total.edep() - 0.2).abs() < 1e-12);
        assert_eq!(total.track_length(), 0.0);
    }

    #[test]
    fn test_cell_out_of_range() {
        let tree = two_layer_tree();
        let sd = CalorimeterSd::new("DiodeSD", "DiodeHitsCollection", 1);
        let mut hc = sd.initialize();
        let step = step_at(&tree, Point::new(0., 0., 0.2), ParticleKind::Electron, 0.1, 0.1);
        let err = sd.process_hits(&step, &mut hc).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DetectorError>(),
            Some(DetectorError::CellOutOfRange { cell: 1, cells: 1, .. })
        ));
    }

    #[test]
    fn test_bind_errors() {
        let tree = two_layer_tree();
        let mut sdm = SdManager::new();
        let err = sdm
            .bind(&tree, "GapLV", CalorimeterSd::new("GapSD", "GapHitsCollection", 1))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DetectorError>(),
            Some(DetectorError::LogicalVolumeNotFound(_))
        ));
        sdm.bind(&tree, "DiodeLV", CalorimeterSd::new("DiodeSD", "DiodeHitsCollection", 2))
            .unwrap();
        assert!(
            sdm.bind(&tree, "Layer", CalorimeterSd::new("DiodeSD", "Other", 2))
                .is_err()
        );
        assert_eq!(sdm.collection_id("DiodeHitsCollection").unwrap(), 0);
        let err = sdm.collection_id("AnnularHitsCollection").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DetectorError>(),
            Some(DetectorError::CollectionNotFound(_))
        ));
    }
}
