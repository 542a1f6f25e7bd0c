//! Per-event hit records.

use std::fmt;

use crate::Vector;
use crate::units::{Category, best_unit};

/// Energy deposit, track length and position accumulated in one cell of a
/// sensitive detector during one event.
///
/// All three quantities are summed over steps. The position is the sum of
/// the pre-step positions of contributing steps, not their centroid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HitRecord {
    edep: f64,
    track_length: f64,
    position: Vector,
}

impl HitRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, de: f64, dl: f64, dp: Vector) {
        self.edep += de;
        self.track_length += dl;
        self.position += dp;
    }

    /// Energy deposit in MeV.
    pub fn edep(&self) -> f64 {
        self.edep
    }

    /// Track length of charged particles in mm.
    pub fn track_length(&self) -> f64 {
        self.track_length
    }

    pub fn position(&self) -> Vector {
        self.position
    }
}

impl fmt::Display for HitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Edep: {} Track length: {} Position: {:.3} mm",
            best_unit(self.edep, Category::Energy),
            best_unit(self.track_length, Category::Length),
            self.position
        )
    }
}

/// Hits of one sensitive detector for one event, one per cell plus a final
/// record with the totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitsCollection {
    pub detector: String,
    pub name: String,
    hits: Vec<HitRecord>,
}

impl HitsCollection {
    pub fn new(detector: &str, name: &str) -> Self {
        Self {
            detector: detector.to_string(),
            name: name.to_string(),
            hits: Vec::new(),
        }
    }

    pub fn insert(&mut self, hit: HitRecord) -> usize {
        self.hits.push(hit);
        self.hits.len()
    }

    pub fn entries(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&HitRecord> {
        self.hits.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut HitRecord> {
        self.hits.get_mut(i)
    }

    pub fn last(&self) -> Option<&HitRecord> {
        self.hits.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HitRecord> {
        self.hits.iter()
    }
}

/// Hits collections of one event, indexed by collection id.
///
/// Dropped at the end of the event together with all its records.
#[derive(Debug, Clone, Default)]
pub struct HitsOfEvent {
    pub event_id: usize,
    collections: Vec<Option<HitsCollection>>,
}

impl HitsOfEvent {
    pub fn new(event_id: usize, capacity: usize) -> Self {
        Self {
            event_id,
            collections: vec![None; capacity],
        }
    }

    pub fn add_collection(&mut self, id: usize, collection: HitsCollection) {
        if id >= self.collections.len() {
            self.collections.resize(id + 1, None);
        }
        self.collections[id] = Some(collection);
    }

    pub fn get(&self, id: usize) -> Option<&HitsCollection> {
        self.collections.get(id).and_then(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut HitsCollection> {
        self.collections.get_mut(id).and_then(|c| c.as_mut())
    }

    pub fn len(&self) -> usize {
        self.collections.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
