use crate::geom::SURFACE_TOLERANCE;
use crate::geom::bboxes::BoundingBox;
use crate::{Point, Vector};
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probe offset used to classify the segment just after a surface crossing.
const PROBE: f64 = 1e-7;

/// Point classification relative to a solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inside {
    Inside,
    Surface,
    Outside,
}

/// Shape of a volume in its own local frame (centred at the origin).
///
/// Boxes are given by half-extents, tubes by inner/outer radius and half
/// height along the local Z axis. All lengths in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Solid {
    Box {
        name: String,
        half_x: f64,
        half_y: f64,
        half_z: f64,
    },
    Tube {
        name: String,
        rmin: f64,
        rmax: f64,
        half_z: f64,
    },
}

impl Solid {
    /// Returns a box solid. Dimensions are half lengths.
    pub fn new_box(name: &str, half_x: f64, half_y: f64, half_z: f64) -> Result<Self> {
        ensure!(
            half_x > 0.0 && half_y > 0.0 && half_z > 0.0,
            "Box '{name}' needs positive half lengths, got ({half_x}, {half_y}, {half_z})"
        );
        Ok(Self::Box {
            name: name.to_string(),
            half_x,
            half_y,
            half_z,
        })
    }

    /// Returns a full-circle tube (annulus when `rmin > 0`).
    pub fn new_tube(name: &str, rmin: f64, rmax: f64, half_z: f64) -> Result<Self> {
        ensure!(
            rmin >= 0.0 && rmax > rmin && half_z > 0.0,
            "Tube '{name}' needs 0 <= rmin < rmax and half_z > 0, got ({rmin}, {rmax}, {half_z})"
        );
        Ok(Self::Tube {
            name: name.to_string(),
            rmin,
            rmax,
            half_z,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Box { name, .. } | Self::Tube { name, .. } => name,
        }
    }

    /// Half-extents of the local bounding box.
    pub fn half_extents(&self) -> [f64; 3] {
        match *self {
            Self::Box {
                half_x,
                half_y,
                half_z,
                ..
            } => [half_x, half_y, half_z],
            Self::Tube { rmax, half_z, .. } => [rmax, rmax, half_z],
        }
    }

    pub fn extent(&self) -> BoundingBox {
        BoundingBox::from_center(Point::origin(), self.half_extents())
    }

    /// Full thickness along the local Z axis.
    pub fn thickness(&self) -> f64 {
        2.0 * self.half_extents()[2]
    }

    pub fn volume(&self) -> f64 {
        match *self {
            Self::Box {
                half_x,
                half_y,
                half_z,
                ..
            } => 8.0 * half_x * half_y * half_z,
            Self::Tube {
                rmin, rmax, half_z, ..
            } => std::f64::consts::PI * (rmax * rmax - rmin * rmin) * 2.0 * half_z,
        }
    }

    /// Classifies a local point against the solid with surface tolerance.
    pub fn inside(&self, p: Point) -> Inside {
        let tol = SURFACE_TOLERANCE;
        match *self {
            Self::Box {
                half_x,
                half_y,
                half_z,
                ..
            } => {
                let dist = (p.x.abs() - half_x)
                    .max(p.y.abs() - half_y)
                    .max(p.z.abs() - half_z);
                classify(dist, tol)
            }
            Self::Tube {
                rmin, rmax, half_z, ..
            } => {
                let r = (p.x * p.x + p.y * p.y).sqrt();
                let mut dist = (r - rmax).max(p.z.abs() - half_z);
                if rmin > 0.0 {
                    dist = dist.max(rmin - r);
                }
                classify(dist, tol)
            }
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.inside(p) != Inside::Outside
    }

    /// Distance along `dir` from a local point inside (or on) the solid to
    /// where the ray leaves it.
    pub fn distance_to_out(&self, p: Point, dir: Vector) -> f64 {
        self.surface_crossings(p, dir)
            .into_iter()
            .find(|&t| self.inside(p.advance(dir, t + PROBE)) == Inside::Outside)
            .unwrap_or(0.0)
    }

    /// Distance along `dir` from a local point outside the solid to where the
    /// ray enters it, or `None` if it never does.
    pub fn distance_to_in(&self, p: Point, dir: Vector) -> Option<f64> {
        self.surface_crossings(p, dir)
            .into_iter()
            .find(|&t| self.inside(p.advance(dir, t + PROBE)) == Inside::Inside)
    }

    /// Sorted positive ray parameters where the ray meets a bounding surface.
    fn surface_crossings(&self, p: Point, dir: Vector) -> Vec<f64> {
        let mut ts: Vec<f64> = Vec::with_capacity(6);
        match *self {
            Self::Box {
                half_x,
                half_y,
                half_z,
                ..
            } => {
                let halves = [half_x, half_y, half_z];
                let origin = p.to_array();
                let d = dir.to_array();
                for axis in 0..3 {
                    if d[axis].abs() > f64::EPSILON {
                        ts.push((halves[axis] - origin[axis]) / d[axis]);
                        ts.push((-halves[axis] - origin[axis]) / d[axis]);
                    }
                }
            }
            Self::Tube {
                rmin, rmax, half_z, ..
            } => {
                if dir.dz.abs() > f64::EPSILON {
                    ts.push((half_z - p.z) / dir.dz);
                    ts.push((-half_z - p.z) / dir.dz);
                }
                ts.extend(cylinder_roots(p, dir, rmax));
                if rmin > 0.0 {
                    ts.extend(cylinder_roots(p, dir, rmin));
                }
            }
        }
        ts.retain(|t| *t > -SURFACE_TOLERANCE);
        ts.iter_mut().for_each(|t| *t = t.max(0.0));
        ts.sort_by(f64::total_cmp);
        ts
    }
}

fn classify(dist: f64, tol: f64) -> Inside {
    if dist < -tol {
        Inside::Inside
    } else if dist <= tol {
        Inside::Surface
    } else {
        Inside::Outside
    }
}

/// Intersections of a ray with an infinite cylinder of radius `r` around Z.
fn cylinder_roots(p: Point, dir: Vector, r: f64) -> Vec<f64> {
    let a = dir.dx * dir.dx + dir.dy * dir.dy;
    if a < f64::EPSILON {
        return vec![];
    }
    let b = 2.0 * (p.x * dir.dx + p.y * dir.dy);
    let c = p.x * p.x + p.y * p.y - r * r;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return vec![];
    }
    let sq = disc.sqrt();
    vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
}

impl fmt::Display for Solid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Box {
                name,
                half_x,
                half_y,
                half_z,
            } => write!(
                f,
                "Box {name} [{:.3} x {:.3} x {:.3} mm]",
                2.0 * half_x,
                2.0 * half_y,
                2.0 * half_z
            ),
            Self::Tube {
                name,
                rmin,
                rmax,
                half_z,
            } => write!(
                f,
                "Tube {name} [r {:.3}..{:.3} mm, h {:.3} mm]",
                rmin,
                rmax,
                2.0 * half_z
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diode() -> Solid {
        Solid::new_box("Diode", 5.0, 5.0, 0.15).unwrap()
    }

    #[test]
    fn test_box_inside() {
        let s = diode();
        assert_eq!(s.inside(Point::origin()), Inside::Inside);
        assert_eq!(s.inside(Point::new(5.0, 0., 0.)), Inside::Surface);
        assert_eq!(s.inside(Point::new(0., 0., 0.2)), Inside::Outside);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(Solid::new_box("b", 0.0, 1.0, 1.0).is_err());
        assert!(Solid::new_tube("t", 2.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_box_distances() {
        let s = diode();
        let dz = Vector::new(0., 0., 1.);
        let t_in = s.distance_to_in(Point::new(0., 0., -10.), dz).unwrap();
        assert!((t_in - 9.85).abs() < 1e-9);
        let t_out = s.distance_to_out(Point::new(0., 0., -0.15), dz);
        assert!((t_out - 0.3).abs() < 1e-9);
        // Ray passing beside the box
        assert!(s.distance_to_in(Point::new(6., 0., -10.), dz).is_none());
    }

    #[test]
    fn test_tube_inside() {
        let t = Solid::new_tube("Ring", 3.0, 12.0, 0.15).unwrap();
        assert_eq!(t.inside(Point::origin()), Inside::Outside);
        assert_eq!(t.inside(Point::new(5.0, 0., 0.)), Inside::Inside);
        assert_eq!(t.inside(Point::new(0., 12.0, 0.)), Inside::Surface);
    }

    #[test]
    fn test_tube_distances() {
        let t = Solid::new_tube("Ring", 3.0, 12.0, 0.15).unwrap();
        // Along the axis the ray goes through the hole
        let dz = Vector::new(0., 0., 1.);
        assert!(t.distance_to_in(Point::new(0., 0., -5.), dz).is_none());
        // Radially from the hole into the ring
        let dx = Vector::new(1., 0., 0.);
        let t_in = t.distance_to_in(Point::origin(), dx).unwrap();
        assert!((t_in - 3.0).abs() < 1e-9);
        let t_out = t.distance_to_out(Point::new(3.0, 0., 0.), dx);
        assert!((t_out - 9.0).abs() < 1e-9);
        // Through the ring along Z
        let t_in = t.distance_to_in(Point::new(5.0, 0., -5.), dz).unwrap();
        assert!((t_in - 4.85).abs() < 1e-9);
    }

    #[test]
    fn test_volume() {
        let s = diode();
        assert!((s.volume() - 10.0 * 10.0 * 0.3).abs() < 1e-12);
    }
}
