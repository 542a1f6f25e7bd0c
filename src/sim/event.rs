//! End-of-event aggregation: from hits to histogram fills and n-tuple rows.

use anyhow::{Result, bail};
use tracing::info;

use crate::error::DetectorError;
use crate::sim::analysis::AnalysisManager;
use crate::sim::config::{AnalysisConfig, RegionNaming};
use crate::sim::hits::HitsOfEvent;
use crate::sim::sensitive::SdManager;
use crate::units::{Category, best_unit};

pub const DIODE_COLLECTION: &str = "DiodeHitsCollection";
pub const ANNULAR_COLLECTION: &str = "AnnularHitsCollection";

/// Quantities recorded per region and event, in booking order.
const QUANTITIES: [Quantity; 5] = [
    Quantity::Energy,
    Quantity::Length,
    Quantity::X,
    Quantity::Y,
    Quantity::Z,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Energy,
    Length,
    X,
    Y,
    Z,
}

/// A sensitive region read out at the end of every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Stem of the quantity names: `E<label>`, `<label>X`, ...
    pub label: String,
    /// Hits collection the region is read from.
    pub collection: String,
}

impl Region {
    pub fn diode(naming: RegionNaming) -> Self {
        let label = match naming {
            RegionNaming::Diode => "diode",
            RegionNaming::Absorber => "abs",
        };
        Self {
            label: label.to_string(),
            collection: DIODE_COLLECTION.to_string(),
        }
    }

    pub fn annular() -> Self {
        Self {
            label: "annular".to_string(),
            collection: ANNULAR_COLLECTION.to_string(),
        }
    }

    pub fn energy_name(&self) -> String {
        format!("E{}", self.label)
    }

    pub fn length_name(&self) -> String {
        format!("L{}", self.label)
    }

    /// Histogram and column names in booking order.
    pub fn quantity_names(&self) -> [String; 5] {
        QUANTITIES.map(|q| self.name_of(q))
    }

    fn name_of(&self, q: Quantity) -> String {
        match q {
            Quantity::Energy => self.energy_name(),
            Quantity::Length => self.length_name(),
            Quantity::X => format!("{}X", self.label),
            Quantity::Y => format!("{}Y", self.label),
            Quantity::Z => format!("{}Z", self.label),
        }
    }

    fn title_of(&self, q: Quantity) -> String {
        let what = match q {
            Quantity::Energy => "Edep",
            Quantity::Length => "trackL",
            Quantity::X => "X position",
            Quantity::Y => "Y position",
            Quantity::Z => "Z position",
        };
        format!("{what} in {}", self.label)
    }
}

/// Histogram and column ids of one region.
#[derive(Debug, Clone, Copy)]
struct Booked {
    h1: [usize; 5],
    columns: [usize; 5],
}

/// Turns the hits of each event into histogram fills and one n-tuple row.
#[derive(Debug, Clone)]
pub struct EventAggregator {
    regions: Vec<Region>,
    booked: Vec<Booked>,
    collection_ids: Option<Vec<usize>>,
    print_progress: usize,
}

impl EventAggregator {
    pub fn new(regions: Vec<Region>, print_progress: usize) -> Self {
        Self {
            regions,
            booked: Vec::new(),
            collection_ids: None,
            print_progress,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Books five histograms per region, then the n-tuple with one column
    /// per histogram.
    pub fn book(&mut self, analysis: &mut AnalysisManager, config: &AnalysisConfig) -> Result<()> {
        let mut h1 = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let mut ids = [0; 5];
            for (id, q) in ids.iter_mut().zip(QUANTITIES) {
                let (min, max) = match q {
                    Quantity::Energy => (0.0, config.energy_max),
                    Quantity::Length => (0.0, config.length_max),
                    _ => (-config.position_half_range, config.position_half_range),
                };
                *id = analysis.create_h1(&region.name_of(q), &region.title_of(q), config.bins, min, max)?;
            }
            h1.push(ids);
        }

        analysis.create_ntuple(&config.ntuple_name, "Edep and TrackL")?;
        self.booked.clear();
        for (region, h1) in self.regions.iter().zip(h1) {
            let mut columns = [0; 5];
            for (id, q) in columns.iter_mut().zip(QUANTITIES) {
                *id = analysis.create_ntuple_d_column(&region.name_of(q))?;
            }
            self.booked.push(Booked { h1, columns });
        }
        analysis.finish_ntuple()
    }

    /// Histogram ids of the energy and length of every region, for the run
    /// summary.
    pub fn summary_histograms(&self) -> Vec<(usize, Category)> {
        self.booked
            .iter()
            .flat_map(|b| [(b.h1[0], Category::Energy), (b.h1[1], Category::Length)])
            .collect()
    }

    pub fn on_event_end(
        &mut self,
        event: &HitsOfEvent,
        sd: &SdManager,
        analysis: &mut AnalysisManager,
    ) -> Result<()> {
        if self.booked.len() != self.regions.len() {
            bail!(DetectorError::Booking(
                "histograms must be booked before the first event".to_string()
            ));
        }
        let ids = match &self.collection_ids {
            Some(ids) => ids.clone(),
            None => {
                let ids = self
                    .regions
                    .iter()
                    .map(|r| sd.collection_id(&r.collection))
                    .collect::<Result<Vec<_>>>()?;
                self.collection_ids = Some(ids.clone());
                ids
            }
        };

        let mut totals = Vec::with_capacity(self.regions.len());
        for (region, &id) in self.regions.iter().zip(&ids) {
            let Some(hits) = event.get(id) else {
                bail!(DetectorError::CollectionNotFound(region.collection.clone()));
            };
            // The last hit holds the sum over all cells
            let Some(total) = hits.last() else {
                bail!(DetectorError::EmptyCollection(region.collection.clone()));
            };
            totals.push(*total);
        }

        for (booked, total) in self.booked.iter().zip(&totals) {
            let p = total.position();
            let values = [total.edep(), total.track_length(), p.dx, p.dy, p.dz];
            for ((&h1, &column), value) in booked.h1.iter().zip(&booked.columns).zip(values) {
                analysis.fill_h1(h1, value)?;
                analysis.fill_ntuple_d_column(column, value)?;
            }
        }
        analysis.add_ntuple_row()?;

        if self.print_progress > 0 && event.event_id % self.print_progress == 0 {
            info!("---> End of event: {}", event.event_id);
            if let (Some(region), Some(total)) = (self.regions.first(), totals.first()) {
                info!(
                    "   {}: total energy: {}       total track length: {}",
                    region.label,
                    best_unit(total.edep(), Category::Energy),
                    best_unit(total.track_length(), Category::Length)
                );
            }
        }
        Ok(())
    }
}
