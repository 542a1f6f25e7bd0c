//! Detector geometry: a silicon diode on a ceramic backing, replicated in
//! layers inside a calorimeter box, in one of three layouts.
//!
//! ```text
//! World
//! └── Calorimeter (box, one or four copies)
//!     └── Layer (replica along Z)
//!         ├── Diode   (DiodeLV)
//!         └── Backing (BackingLV)
//! └── AnnularHousing (tube, annular layout only)
//!     └── Annular (AnnularLV)
//! ```

use std::f64::consts::FRAC_PI_2;

use anyhow::{Context, Result};
use tracing::info;

use crate::Vector;
use crate::geom::rotation::RotationMatrix;
use crate::geom::solid::Solid;
use crate::geom::volume::{Axis, VolumeTree};
use crate::sim::config::{DetectorLayout, GeometryConfig};
use crate::sim::framework::RunContext;
use crate::sim::materials::{Material, MaterialTable};
use crate::units::DEG;

pub const DIODE_LV: &str = "DiodeLV";
pub const BACKING_LV: &str = "BackingLV";
pub const ANNULAR_LV: &str = "AnnularLV";

/// Room left around the detector when the world is sized from it.
const WORLD_MARGIN: f64 = 1.2;

pub struct DetectorConstruction {
    config: GeometryConfig,
}

impl DetectorConstruction {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Adds the vacuum and resolves every material the layout uses.
    pub fn define_materials(&self, materials: &mut MaterialTable) -> Result<()> {
        materials.add(Material::galactic());
        let c = &self.config;
        let mut names = vec![&c.world_material, &c.diode_material, &c.backing_material];
        if c.layout == DetectorLayout::Annular {
            names.push(&c.annular.housing_material);
        }
        for name in names {
            materials
                .find_or_build(name)
                .context("Cannot retrieve materials already defined")?;
        }
        info!("\n{materials}");
        Ok(())
    }

    /// Defines materials and volumes and returns the volume tree.
    pub fn build(&self, ctx: &mut RunContext) -> Result<VolumeTree> {
        self.define_materials(&mut ctx.materials)?;
        let tree = self.define_volumes()?;
        for lv in tree.logicals() {
            ctx.materials
                .get(&lv.material)
                .with_context(|| format!("Material of volume '{}'", lv.name))?;
        }
        info!("\n{}", self.summary());
        Ok(tree)
    }

    pub fn define_volumes(&self) -> Result<VolumeTree> {
        let c = &self.config;
        let mut tree = VolumeTree::new(c.check_overlaps);

        let world_half = self.world_half_size();
        let world = tree.add_logical(
            "World",
            Solid::new_box("World", world_half, world_half, world_half)?,
            &c.world_material,
        )?;
        tree.set_visible(world, false);
        tree.place_world("World", world)?;

        let calor = self.define_module(&mut tree)?;

        match c.layout {
            DetectorLayout::Single => {
                tree.place(
                    "Calorimeter",
                    calor,
                    world,
                    self.calor_rotation(),
                    Vector::from(c.calor_position),
                    0,
                )?;
            }
            DetectorLayout::QuadArray => {
                for (copy_no, (rotation, translation)) in self.quad_placements().into_iter().enumerate() {
                    tree.place("Calorimeter", calor, world, rotation, translation, copy_no)?;
                }
            }
            DetectorLayout::Annular => {
                tree.place(
                    "Calorimeter",
                    calor,
                    world,
                    self.calor_rotation(),
                    Vector::from(c.calor_position),
                    0,
                )?;
                self.define_annular(&mut tree, world)?;
            }
        }
        Ok(tree)
    }

    /// Calorimeter box with its layers, diodes and backings. Returns the
    /// calorimeter logical volume, not yet placed.
    fn define_module(&self, tree: &mut VolumeTree) -> Result<usize> {
        let c = &self.config;
        let (hx, hy) = (c.calor_size_x / 2.0, c.calor_size_y / 2.0);
        let layer_thickness = c.layer_thickness();

        let calor = tree.add_logical(
            "Calorimeter",
            Solid::new_box("Calorimeter", hx, hy, c.calor_thickness() / 2.0)?,
            &c.world_material,
        )?;
        let layer = tree.add_logical(
            "Layer",
            Solid::new_box("Layer", hx, hy, layer_thickness / 2.0)?,
            &c.world_material,
        )?;
        tree.replicate("Layer", layer, calor, Axis::Z, c.layers, layer_thickness)?;

        let half_diode = c.diode_size_xy / 2.0;
        let diode = tree.add_logical(
            DIODE_LV,
            Solid::new_box("Diode", half_diode, half_diode, c.diode_thickness / 2.0)?,
            &c.diode_material,
        )?;
        // The diode sits off centre by half the calorimeter shift in Y
        tree.place(
            "Diode",
            diode,
            layer,
            RotationMatrix::identity(),
            Vector::new(0.0, -c.calor_position[1] / 2.0, -c.backing_thickness / 2.0),
            0,
        )?;

        let backing = tree.add_logical(
            BACKING_LV,
            Solid::new_box("Backing", hx, hy, c.backing_thickness / 2.0)?,
            &c.backing_material,
        )?;
        tree.place(
            "Backing",
            backing,
            layer,
            RotationMatrix::identity(),
            Vector::new(0.0, 0.0, c.diode_thickness / 2.0),
            0,
        )?;
        Ok(calor)
    }

    fn define_annular(&self, tree: &mut VolumeTree, world: usize) -> Result<()> {
        let c = &self.config;
        let a = &c.annular;
        let housing = tree.add_logical(
            "AnnularHousing",
            Solid::new_tube(
                "AnnularHousing",
                (a.inner_radius - a.housing_wall).max(0.0),
                a.outer_radius + a.housing_wall,
                a.thickness / 2.0 + a.housing_wall,
            )?,
            &a.housing_material,
        )?;
        tree.place(
            "AnnularHousing",
            housing,
            world,
            RotationMatrix::identity(),
            Vector::new(0.0, 0.0, c.calor_position[2] + a.distance),
            0,
        )?;
        let ring = tree.add_logical(
            ANNULAR_LV,
            Solid::new_tube("Annular", a.inner_radius, a.outer_radius, a.thickness / 2.0)?,
            &c.diode_material,
        )?;
        tree.place("Annular", ring, housing, RotationMatrix::identity(), Vector::zero(), 0)?;
        Ok(())
    }

    fn calor_rotation(&self) -> RotationMatrix {
        let [rx, ry, rz] = self.config.calor_rotation_deg;
        RotationMatrix::from_euler_xyz(rx * DEG, ry * DEG, rz * DEG)
    }

    /// Four modules in a pinwheel around the square aperture.
    ///
    /// Module 0 spans `x in [-a, -a + width]`, `y in [a, a + height]`; the
    /// others are the same placement turned by 90, 180 and 270 degrees.
    fn quad_placements(&self) -> Vec<(RotationMatrix, Vector)> {
        let c = &self.config;
        let a = c.aperture_half_width;
        let first = Vector::new(-a + c.calor_size_x / 2.0, a + c.calor_size_y / 2.0, 0.0);
        (0..4)
            .map(|k| {
                let turn = RotationMatrix::about_z(k as f64 * FRAC_PI_2);
                let translation = turn.apply(first);
                let rotation = if c.quad_reflect && k % 2 == 1 {
                    turn.compose(&RotationMatrix::reflect_x())
                } else {
                    turn
                };
                (rotation, translation)
            })
            .collect()
    }

    /// Half edge of the cubic world.
    pub fn world_half_size(&self) -> f64 {
        let c = &self.config;
        let from_diode = c.world_factor * c.diode_size_xy / 2.0;
        let module_reach = {
            let [x, y, z] = c.calor_position;
            let half_diag = (c.calor_size_x.powi(2) + c.calor_size_y.powi(2) + c.calor_thickness().powi(2))
                .sqrt()
                / 2.0;
            x.abs().max(y.abs()).max(z.abs()) + half_diag
        };
        let extent = match c.layout {
            DetectorLayout::Single => module_reach,
            DetectorLayout::QuadArray => {
                (c.aperture_half_width + c.calor_size_x.max(c.calor_size_y)).max(c.calor_thickness())
            }
            DetectorLayout::Annular => {
                let a = &c.annular;
                let ring_z = (c.calor_position[2] + a.distance).abs() + a.thickness / 2.0 + a.housing_wall;
                module_reach.max(ring_z).max(a.outer_radius + a.housing_wall)
            }
        };
        from_diode.max(extent * WORLD_MARGIN)
    }

    /// Human readable description of the layers.
    pub fn summary(&self) -> String {
        let c = &self.config;
        let line = "------------------------------------------------------------";
        let mut s = format!(
            "{line}\n---> The calorimeter is {} layers of: [ {}mm of {} + {}mm of {} ] \n",
            c.layers, c.diode_thickness, c.diode_material, c.backing_thickness, c.backing_material
        );
        match c.layout {
            DetectorLayout::Single => {}
            DetectorLayout::QuadArray => {
                s.push_str(&format!(
                    "---> 4 modules around a {}mm square aperture{}\n",
                    2.0 * c.aperture_half_width,
                    if c.quad_reflect { ", alternate modules mirrored" } else { "" }
                ));
            }
            DetectorLayout::Annular => {
                let a = &c.annular;
                s.push_str(&format!(
                    "---> Annular detector: {}mm of {} from r = {}mm to {}mm in {} housing, {}mm downstream\n",
                    a.thickness, c.diode_material, a.inner_radius, a.outer_radius, a.housing_material, a.distance
                ));
            }
        }
        s.push_str(line);
        s
    }
}
