use crate::geom::point::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Box centred at `center` with the given half-extents.
    pub fn from_center(center: Point, half: [f64; 3]) -> Self {
        Self {
            min: Point::new(center.x - half[0], center.y - half[1], center.z - half[2]),
            max: Point::new(center.x + half[0], center.y + half[1], center.z + half[2]),
        }
    }

    pub fn from_points(pts: &[Point]) -> Option<Self> {
        let first = pts.first()?;
        let mut bb = Self::new(*first, *first);
        for p in &pts[1..] {
            bb.min = Point::new(bb.min.x.min(p.x), bb.min.y.min(p.y), bb.min.z.min(p.z));
            bb.max = Point::new(bb.max.x.max(p.x), bb.max.y.max(p.y), bb.max.z.max(p.z));
        }
        Some(bb)
    }

    /// Checks whether two bounding boxes share a volume thicker than `tol`.
    ///
    /// Boxes that only touch (faces within `tol`) do not overlap.
    pub fn overlaps(&self, other: &Self, tol: f64) -> bool {
        // Boxes don't overlap if separated along any axis
        if self.max.x <= other.min.x + tol || self.min.x >= other.max.x - tol {
            return false;
        }
        if self.max.y <= other.min.y + tol || self.min.y >= other.max.y - tol {
            return false;
        }
        if self.max.z <= other.min.z + tol || self.min.z >= other.max.z - tol {
            return false;
        }
        true
    }

    /// Checks whether `other` lies inside `self` (boundary within `tol` is fine).
    pub fn contains(&self, other: &Self, tol: f64) -> bool {
        other.min.x >= self.min.x - tol
            && other.min.y >= self.min.y - tol
            && other.min.z >= self.min.z - tol
            && other.max.x <= self.max.x + tol
            && other.max.y <= self.max.y + tol
            && other.max.z <= self.max.z + tol
    }

    /// Largest absolute coordinate reached by the box.
    pub fn max_abs_extent(&self) -> f64 {
        [self.min, self.max]
            .iter()
            .flat_map(|p| p.to_array())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}
