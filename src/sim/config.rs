use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;
use crate::sim::primary::ParticleKind;

/// Arrangement of detector modules in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorLayout {
    /// One calorimeter module on the beam axis.
    Single,
    /// Four modules around a square aperture, rotated in 90 degree steps.
    QuadArray,
    /// One module plus an annular silicon detector further downstream.
    Annular,
}

/// Histogram and n-tuple names used for a detector region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionNaming {
    /// `Ediode`, `Ldiode`, `diodeX`...
    Diode,
    /// `Eabs`, `Labs`, `absX`... as written by the first detector versions.
    Absorber,
}

/// Annular detector: silicon ring in an aluminium housing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnularConfig {
    /// Inner radius of the silicon ring (mm).
    pub inner_radius: f64,
    /// Outer radius of the silicon ring (mm).
    pub outer_radius: f64,
    /// Silicon thickness (mm).
    pub thickness: f64,
    /// Housing wall thickness, radial and along the beam (mm).
    pub housing_wall: f64,
    /// Distance from the calorimeter centre to the ring centre along Z (mm).
    pub distance: f64,
    pub housing_material: String,
}

impl Default for AnnularConfig {
    fn default() -> Self {
        Self {
            inner_radius: 4.0,
            outer_radius: 12.0,
            thickness: 0.3,
            housing_wall: 1.0,
            distance: 10.0,
            housing_material: "G4_Al".to_string(),
        }
    }
}

/// Detector dimensions, materials and layout. Lengths in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub layout: DetectorLayout,
    pub layers: usize,
    pub calor_size_x: f64,
    pub calor_size_y: f64,
    pub diode_size_xy: f64,
    pub diode_thickness: f64,
    pub backing_thickness: f64,
    /// Calorimeter centre in the world (single and annular layouts).
    pub calor_position: [f64; 3],
    /// Calorimeter rotation about X, Y, Z in degrees.
    pub calor_rotation_deg: [f64; 3],
    pub world_material: String,
    pub diode_material: String,
    pub backing_material: String,
    /// Half width of the square opening between quad modules.
    pub aperture_half_width: f64,
    /// Mirror alternate quad modules instead of rotating only.
    pub quad_reflect: bool,
    pub annular: AnnularConfig,
    /// World edge as a multiple of the diode size (at least the detector extent).
    pub world_factor: f64,
    /// Uniform magnetic field in tesla. A zero field is not created.
    pub field: [f64; 3],
    pub check_overlaps: bool,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            layout: DetectorLayout::Single,
            layers: 1,
            calor_size_x: 12.7,
            calor_size_y: 14.5,
            diode_size_xy: 10.0,
            diode_thickness: 0.3,
            backing_thickness: 1.41,
            calor_position: [0.0, -0.85, 0.0],
            calor_rotation_deg: [0.0, 0.0, 0.0],
            world_material: "Galactic".to_string(),
            diode_material: "G4_Si".to_string(),
            backing_material: "G4_ALUMINUM_OXIDE".to_string(),
            aperture_half_width: 2.0,
            quad_reflect: false,
            annular: AnnularConfig::default(),
            world_factor: 5.0,
            field: [0.0; 3],
            check_overlaps: true,
        }
    }
}

impl GeometryConfig {
    pub fn layer_thickness(&self) -> f64 {
        self.diode_thickness + self.backing_thickness
    }

    pub fn calor_thickness(&self) -> f64 {
        self.layers as f64 * self.layer_thickness()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GunConfig {
    pub particle: ParticleKind,
    /// Kinetic energy in MeV.
    pub energy: f64,
    /// Start position in mm. `None` starts on the upstream face of the world.
    pub position: Option<[f64; 3]>,
    pub direction: [f64; 3],
    /// Spread the start position uniformly over a square of this half width
    /// in the XY plane (0 disables it).
    pub spread_half_width: f64,
}

impl Default for GunConfig {
    fn default() -> Self {
        Self {
            particle: ParticleKind::Electron,
            energy: 1.0,
            position: None,
            direction: [0.0, 0.0, 1.0],
            spread_half_width: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub events: usize,
    pub threads: usize,
    pub seed: u64,
    /// Print event statistics every N events (0 disables it).
    pub print_progress: usize,
    /// Longest step taken by the straight-line transport (mm).
    pub max_step: f64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            events: 100,
            threads: 1,
            seed: 12345,
            print_progress: 100,
            max_step: 1.0,
        }
    }
}

/// Histogram booking and output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Output file; the extension selects the format.
    pub output: String,
    pub ntuple_name: String,
    pub ntuple_merging: bool,
    pub naming: RegionNaming,
    pub bins: usize,
    /// Upper edge of the energy histograms (MeV).
    pub energy_max: f64,
    /// Upper edge of the track length histograms (mm).
    pub length_max: f64,
    /// Half range of the position histograms (mm).
    pub position_half_range: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output: "B4.csv".to_string(),
            ntuple_name: "B4".to_string(),
            ntuple_merging: true,
            naming: RegionNaming::Diode,
            bins: 1000,
            energy_max: 10.0,
            length_max: 1.0,
            position_half_range: 10.0,
        }
    }
}

/// Complete description of a run, loadable from JSON.
///
/// Missing sections and fields take their default values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub geometry: GeometryConfig,
    pub gun: GunConfig,
    pub run: RunSettings,
    pub analysis: AnalysisConfig,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Checks values that would otherwise fail deep inside geometry building.
    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        let positive = [
            ("calor_size_x", g.calor_size_x),
            ("calor_size_y", g.calor_size_y),
            ("diode_size_xy", g.diode_size_xy),
            ("diode_thickness", g.diode_thickness),
            ("backing_thickness", g.backing_thickness),
            ("world_factor", g.world_factor),
            ("max_step", self.run.max_step),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                bail!(invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if g.layers == 0 {
            bail!(invalid("layers must be at least 1"));
        }
        if g.diode_size_xy > g.calor_size_x.min(g.calor_size_y) {
            bail!(invalid(format!(
                "diode ({} mm) is larger than the calorimeter ({} x {} mm)",
                g.diode_size_xy, g.calor_size_x, g.calor_size_y
            )));
        }
        if g.aperture_half_width < 0.0 {
            bail!(invalid("aperture_half_width must not be negative"));
        }
        let a = &g.annular;
        if g.layout == DetectorLayout::Annular
            && !(a.inner_radius >= 0.0 && a.outer_radius > a.inner_radius && a.thickness > 0.0)
        {
            bail!(invalid(format!(
                "annular detector needs 0 <= inner < outer radius and positive thickness, \
                 got {} / {} / {}",
                a.inner_radius, a.outer_radius, a.thickness
            )));
        }
        if self.gun.energy < 0.0 {
            bail!(invalid("gun energy must not be negative"));
        }
        if self.gun.direction.iter().all(|c| *c == 0.0) {
            bail!(invalid("gun direction must not be zero"));
        }
        if self.run.threads == 0 {
            bail!(invalid("threads must be at least 1"));
        }
        let h = &self.analysis;
        if h.bins == 0 || !(h.energy_max > 0.0 && h.length_max > 0.0 && h.position_half_range > 0.0) {
            bail!(invalid("histograms need bins > 0 and positive ranges"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> DetectorError {
    DetectorError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = RunConfig::new();
        assert_eq!(c.geometry.layers, 1);
        assert!((c.geometry.layer_thickness() - 1.71).abs() < 1e-12);
        assert_eq!(c.analysis.ntuple_name, "B4");
        c.validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let c = RunConfig::from_json_str(
            r#"{ "geometry": { "layout": "annular", "layers": 2 }, "run": { "threads": 4 } }"#,
        )
        .unwrap();
        assert_eq!(c.geometry.layout, DetectorLayout::Annular);
        assert_eq!(c.geometry.layers, 2);
        assert_eq!(c.geometry.calor_size_x, 12.7);
        assert_eq!(c.run.threads, 4);
        assert_eq!(c.run.seed, 12345);
    }

    #[test]
    fn test_invalid_rejected() {
        let err = RunConfig::from_json_str(r#"{ "geometry": { "layers": 0 } }"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DetectorError>(),
            Some(DetectorError::InvalidConfig(_))
        ));
        assert!(RunConfig::from_json_str(r#"{ "geometry": { "diode_size_xy": 20.0 } }"#).is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut c = RunConfig::new();
        c.geometry.layout = DetectorLayout::QuadArray;
        std::fs::write(&path, c.to_json_string().unwrap()).unwrap();
        assert_eq!(RunConfig::from_json_file(&path).unwrap(), c);
    }
}
