pub mod bboxes;
pub mod navigation;
pub mod point;
pub mod rotation;
pub mod solid;
pub mod vector;
pub mod volume;

/// Geometric precision
pub const EPS: f64 = 1e-13;

/// Distance (mm) below which a point is considered to lie on a surface.
pub const SURFACE_TOLERANCE: f64 = 1e-9;

/// Approximate float comparison used across the geometry code.
pub trait IsClose {
    fn is_close(&self, other: f64) -> bool;
}

impl IsClose for f64 {
    fn is_close(&self, other: f64) -> bool {
        (self - other).abs() < EPS.max(1e-9 * self.abs().max(other.abs()))
    }
}
