//! Volume hierarchy: logical volumes (shape + material) and their physical
//! placements inside mother volumes.
//!
//! The tree is an arena. Logical and physical volumes are addressed by their
//! index; a physical volume refers to its logical volume and to the logical
//! volume of its mother. The world is the single physical volume without a
//! mother.

use crate::error::DetectorError;
use crate::geom::SURFACE_TOLERANCE;
use crate::geom::bboxes::BoundingBox;
use crate::geom::rotation::RotationMatrix;
use crate::geom::solid::Solid;
use crate::uid::UID;
use crate::{Point, Vector};
use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    pub fn unit(self) -> Vector {
        match self {
            Self::X => Vector::new(1., 0., 0.),
            Self::Y => Vector::new(0., 1., 0.),
            Self::Z => Vector::new(0., 0., 1.),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalVolume {
    pub name: String,
    pub uid: UID,
    pub solid: Solid,
    /// Material name, resolved against the material table at build time.
    pub material: String,
    pub visible: bool,
    daughters: Vec<usize>,
}

impl LogicalVolume {
    pub fn daughters(&self) -> &[usize] {
        &self.daughters
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// One positioned copy.
    Single {
        rotation: RotationMatrix,
        translation: Vector,
        copy_no: usize,
    },
    /// `count` slices of width `width` filling the mother along `axis`.
    Replica {
        axis: Axis,
        count: usize,
        width: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalVolume {
    pub name: String,
    pub logical: usize,
    /// Logical volume of the mother (`None` for the world).
    pub mother: Option<usize>,
    pub placement: Placement,
}

/// One concrete copy of a physical volume in its mother's frame.
#[derive(Debug, Clone)]
pub struct PlacedCopy {
    pub copy_no: usize,
    pub rotation: RotationMatrix,
    pub translation: Vector,
}

impl PlacedCopy {
    /// Mother-frame point to daughter-frame point.
    pub fn to_local(&self, p: Point) -> Point {
        Point::from_vector(self.rotation.inverse().apply(p - Point::from_vector(self.translation)))
    }
}

impl PhysicalVolume {
    /// All copies this placement stands for.
    pub fn copies(&self) -> Vec<PlacedCopy> {
        match &self.placement {
            Placement::Single {
                rotation,
                translation,
                copy_no,
            } => vec![PlacedCopy {
                copy_no: *copy_no,
                rotation: rotation.clone(),
                translation: *translation,
            }],
            Placement::Replica { axis, count, width } => (0..*count)
                .map(|i| PlacedCopy {
                    copy_no: i,
                    rotation: RotationMatrix::identity(),
                    translation: axis.unit() * replica_offset(i, *count, *width),
                })
                .collect(),
        }
    }

    /// Copy of a replica containing the mother-frame coordinate, or the
    /// single copy of a placement.
    pub fn copy_at(&self, p: Point) -> PlacedCopy {
        match &self.placement {
            Placement::Replica { axis, count, width } => {
                let c = p.to_array()[axis.index()];
                let raw = ((c + width * *count as f64 / 2.0) / width).floor();
                let i = raw.clamp(0.0, (*count - 1) as f64) as usize;
                PlacedCopy {
                    copy_no: i,
                    rotation: RotationMatrix::identity(),
                    translation: axis.unit() * replica_offset(i, *count, *width),
                }
            }
            Placement::Single { .. } => self.copies().remove(0),
        }
    }
}

/// Centre of replica slice `i` relative to the mother centre.
fn replica_offset(i: usize, count: usize, width: f64) -> f64 {
    -width * (count as f64 - 1.0) / 2.0 + i as f64 * width
}

/// Arena of logical and physical volumes rooted at one world volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeTree {
    logicals: Vec<LogicalVolume>,
    physicals: Vec<PhysicalVolume>,
    world: Option<usize>,
    check_overlaps: bool,
}

impl VolumeTree {
    pub fn new(check_overlaps: bool) -> Self {
        Self {
            logicals: Vec::new(),
            physicals: Vec::new(),
            world: None,
            check_overlaps,
        }
    }

    pub fn add_logical(&mut self, name: &str, solid: Solid, material: &str) -> Result<usize> {
        if self.logicals.iter().any(|lv| lv.name == name) {
            bail!(DetectorError::InvalidConfig(format!(
                "logical volume '{name}' defined twice"
            )));
        }
        self.logicals.push(LogicalVolume {
            name: name.to_string(),
            uid: UID::new(),
            solid,
            material: material.to_string(),
            visible: true,
            daughters: Vec::new(),
        });
        Ok(self.logicals.len() - 1)
    }

    pub fn set_visible(&mut self, logical: usize, visible: bool) {
        if let Some(lv) = self.logicals.get_mut(logical) {
            lv.visible = visible;
        }
    }

    /// Places the world volume at the origin. Can only be done once.
    pub fn place_world(&mut self, name: &str, logical: usize) -> Result<usize> {
        ensure!(self.world.is_none(), "World volume already placed");
        ensure!(logical < self.logicals.len(), "Unknown logical volume index {logical}");
        self.physicals.push(PhysicalVolume {
            name: name.to_string(),
            logical,
            mother: None,
            placement: Placement::Single {
                rotation: RotationMatrix::identity(),
                translation: Vector::zero(),
                copy_no: 0,
            },
        });
        let idx = self.physicals.len() - 1;
        self.world = Some(idx);
        Ok(idx)
    }

    /// Places a copy of `logical` inside `mother` with the given transform.
    ///
    /// Runs the overlap check when the tree was created with it enabled.
    pub fn place(
        &mut self,
        name: &str,
        logical: usize,
        mother: usize,
        rotation: RotationMatrix,
        translation: Vector,
        copy_no: usize,
    ) -> Result<usize> {
        self.check_new_daughter(logical, mother)?;
        let pv = PhysicalVolume {
            name: name.to_string(),
            logical,
            mother: Some(mother),
            placement: Placement::Single {
                rotation,
                translation,
                copy_no,
            },
        };
        if self.check_overlaps {
            self.check_placement(&pv, None)?;
        }
        Ok(self.push_daughter(pv))
    }

    /// Slices `mother` into `count` copies of `logical` along `axis`.
    pub fn replicate(
        &mut self,
        name: &str,
        logical: usize,
        mother: usize,
        axis: Axis,
        count: usize,
        width: f64,
    ) -> Result<usize> {
        self.check_new_daughter(logical, mother)?;
        ensure!(count > 0 && width > 0.0, "Replica '{name}' needs count > 0 and width > 0");
        let mother_half = self.logicals[mother].solid.half_extents()[axis.index()];
        ensure!(
            (count as f64 * width - 2.0 * mother_half).abs() < 1e-6,
            "Replica '{name}': {count} x {width} mm does not fill mother of {} mm",
            2.0 * mother_half
        );
        let slice_half = self.logicals[logical].solid.half_extents()[axis.index()];
        ensure!(
            (2.0 * slice_half - width).abs() < 1e-6,
            "Replica '{name}': slice solid is {} mm thick, replica width is {width} mm",
            2.0 * slice_half
        );
        ensure!(
            self.logicals[mother].daughters.is_empty(),
            "Replica '{name}' must be the only daughter of '{}'",
            self.logicals[mother].name
        );
        Ok(self.push_daughter(PhysicalVolume {
            name: name.to_string(),
            logical,
            mother: Some(mother),
            placement: Placement::Replica { axis, count, width },
        }))
    }

    fn check_new_daughter(&self, logical: usize, mother: usize) -> Result<()> {
        ensure!(logical < self.logicals.len(), "Unknown logical volume index {logical}");
        ensure!(mother < self.logicals.len(), "Unknown mother volume index {mother}");
        ensure!(logical != mother, "A volume cannot be placed inside itself");
        if self.logicals[mother]
            .daughters
            .iter()
            .any(|&d| matches!(self.physicals[d].placement, Placement::Replica { .. }))
        {
            bail!(
                "'{}' is filled by a replica and cannot take more daughters",
                self.logicals[mother].name
            );
        }
        Ok(())
    }

    fn push_daughter(&mut self, pv: PhysicalVolume) -> usize {
        let mother = pv.mother;
        self.physicals.push(pv);
        let idx = self.physicals.len() - 1;
        if let Some(m) = mother {
            self.logicals[m].daughters.push(idx);
        }
        idx
    }

    /// Checks one placed volume against its mother and its siblings.
    pub fn check_overlaps_of(&self, physical: usize) -> Result<()> {
        self.check_placement(&self.physicals[physical], Some(physical))
    }

    fn check_placement(&self, pv: &PhysicalVolume, this: Option<usize>) -> Result<()> {
        let Some(mother) = pv.mother else {
            return Ok(());
        };
        let Placement::Single {
            rotation,
            translation,
            ..
        } = &pv.placement
        else {
            return Ok(());
        };
        let solid = &self.logicals[pv.logical].solid;
        let mother_solid = &self.logicals[mother].solid;

        if !fits_inside(solid, rotation, *translation, mother_solid) {
            return Err(DetectorError::Overlap {
                volume: pv.name.clone(),
                other: self.logicals[mother].name.clone(),
            }
            .into());
        }

        for &sibling in &self.logicals[mother].daughters {
            if Some(sibling) == this {
                continue;
            }
            let other = &self.physicals[sibling];
            let Placement::Single {
                rotation: r2,
                translation: t2,
                ..
            } = &other.placement
            else {
                continue;
            };
            let other_solid = &self.logicals[other.logical].solid;
            if placed_solids_overlap(solid, rotation, *translation, other_solid, r2, *t2) {
                return Err(DetectorError::Overlap {
                    volume: pv.name.clone(),
                    other: other.name.clone(),
                }
                .into());
            }
        }
        debug!("Checking overlaps for volume {} ... OK!", pv.name);
        Ok(())
    }

    pub fn world(&self) -> Result<usize> {
        self.world
            .ok_or_else(|| anyhow::anyhow!("World volume has not been placed"))
    }

    pub fn logical(&self, idx: usize) -> &LogicalVolume {
        &self.logicals[idx]
    }

    pub fn physical(&self, idx: usize) -> &PhysicalVolume {
        &self.physicals[idx]
    }

    pub fn logicals(&self) -> &[LogicalVolume] {
        &self.logicals
    }

    pub fn physicals(&self) -> &[PhysicalVolume] {
        &self.physicals
    }

    pub fn logical_index(&self, name: &str) -> Result<usize> {
        self.logicals
            .iter()
            .position(|lv| lv.name == name)
            .ok_or_else(|| DetectorError::LogicalVolumeNotFound(name.to_string()).into())
    }

    /// Logical volume of a physical volume.
    pub fn logical_of(&self, physical: usize) -> &LogicalVolume {
        &self.logicals[self.physicals[physical].logical]
    }

    pub fn overlap_checking(&self) -> bool {
        self.check_overlaps
    }
}

/// Bounding box of a solid after applying `rotation` then `translation`.
pub fn placed_bounding_box(solid: &Solid, rotation: &RotationMatrix, translation: Vector) -> BoundingBox {
    let [hx, hy, hz] = solid.half_extents();
    let mut corners = Vec::with_capacity(8);
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let c = rotation.apply(Vector::new(sx * hx, sy * hy, sz * hz)) + translation;
                corners.push(Point::from_vector(c));
            }
        }
    }
    // Eight corners were pushed, so the box always exists
    BoundingBox::from_points(&corners).unwrap_or_else(|| solid.extent())
}

/// True when the placed tube's axis is parallel to the mother Z axis.
fn axis_parallel_to_z(rotation: &RotationMatrix) -> bool {
    let z = rotation.z_axis();
    z.dx.abs() < 1e-9 && z.dy.abs() < 1e-9
}

fn fits_inside(solid: &Solid, rotation: &RotationMatrix, translation: Vector, mother: &Solid) -> bool {
    let tol = SURFACE_TOLERANCE;
    let bb = placed_bounding_box(solid, rotation, translation);
    match (mother, solid) {
        (
            Solid::Tube {
                rmin: mr0,
                rmax: mr1,
                half_z: mhz,
                ..
            },
            Solid::Tube {
                rmin, rmax, half_z, ..
            },
        ) if axis_parallel_to_z(rotation)
            && translation.dx.abs() < tol
            && translation.dy.abs() < tol =>
        {
            *rmin >= mr0 - tol
                && *rmax <= mr1 + tol
                && translation.dz - half_z >= -mhz - tol
                && translation.dz + half_z <= mhz + tol
        }
        (Solid::Tube { rmin, .. }, _) if *rmin > 0.0 => {
            mother.extent().contains(&bb, tol) && radial_range(&bb, 0.0, 0.0).0 >= rmin - tol
        }
        _ => mother.extent().contains(&bb, tol),
    }
}

/// Minimum and maximum distance from the axis `(cx, cy)` to a bounding box
/// footprint in the XY plane.
fn radial_range(bb: &BoundingBox, cx: f64, cy: f64) -> (f64, f64) {
    let (x0, x1) = (bb.min.x - cx, bb.max.x - cx);
    let (y0, y1) = (bb.min.y - cy, bb.max.y - cy);
    let nx = 0.0_f64.clamp(x0, x1);
    let ny = 0.0_f64.clamp(y0, y1);
    let rmin = (nx * nx + ny * ny).sqrt();
    let fx = x0.abs().max(x1.abs());
    let fy = y0.abs().max(y1.abs());
    let rmax = (fx * fx + fy * fy).sqrt();
    (rmin, rmax)
}

fn placed_solids_overlap(
    a: &Solid,
    ra: &RotationMatrix,
    ta: Vector,
    b: &Solid,
    rb: &RotationMatrix,
    tb: Vector,
) -> bool {
    let tol = SURFACE_TOLERANCE;
    let bb_a = placed_bounding_box(a, ra, ta);
    let bb_b = placed_bounding_box(b, rb, tb);
    if !bb_a.overlaps(&bb_b, tol) {
        return false;
    }
    // A coaxial ring leaves room in its hole and outside its rim
    for (tube, rot, t, other_bb) in [(a, ra, ta, bb_b), (b, rb, tb, bb_a)] {
        if let Solid::Tube { rmin, rmax, .. } = tube
            && axis_parallel_to_z(rot)
        {
            let (near, far) = radial_range(&other_bb, t.dx, t.dy);
            if far <= rmin + tol || near >= rmax - tol {
                return false;
            }
        }
    }
    true
}

impl fmt::Display for VolumeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(world) = self.world else {
            return write!(f, "(no world volume)");
        };
        self.fmt_node(f, world, 0)
    }
}

impl VolumeTree {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, physical: usize, depth: usize) -> fmt::Result {
        let pv = &self.physicals[physical];
        let lv = &self.logicals[pv.logical];
        let indent = "  ".repeat(depth);
        let placement = match &pv.placement {
            Placement::Single {
                rotation,
                translation,
                copy_no,
            } => format!("#{copy_no} at {translation:.3} rot {rotation}"),
            Placement::Replica { axis, count, width } => {
                format!("replica {count} x {width:.3} mm along {axis:?}")
            }
        };
        let hidden = if lv.visible { "" } else { " (invisible)" };
        writeln!(
            f,
            "{indent}{} [{}] {} of {}{hidden} {placement}",
            pv.name, lv.name, lv.solid, lv.material
        )?;
        for &d in &lv.daughters {
            self.fmt_node(f, d, depth + 1)?;
        }
        Ok(())
    }
}
