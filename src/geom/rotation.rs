use crate::Vector;
use crate::geom::IsClose;
use ndarray as nd;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orthogonal 3x3 transform applied to a daughter volume before translation.
///
/// A daughter point `p_d` maps to its mother frame as `R * p_d + t`.
/// The matrix is orthogonal but may carry a reflection (determinant -1),
/// which is how mirrored detector modules are described.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationMatrix {
    m: [[f64; 3]; 3],
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl RotationMatrix {
    pub fn identity() -> Self {
        Self {
            m: [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
        }
    }

    /// Rotation matrix for a unit vector `u` and angle `phi` (radians).
    ///
    /// Uses the Rodrigues form, which is numerically more stable than the
    /// explicit trigonometric expansion:
    /// https://en.wikipedia.org/wiki/Rodrigues%27_rotation_formula
    ///
    /// Returns `None` if `u` is not a unit vector.
    pub fn about_axis(u: &Vector, phi: f64) -> Option<Self> {
        if !u.length().is_close(1.) {
            return None;
        }
        let w: nd::Array2<f64> =
            nd::arr2(&[[0., -u.dz, u.dy], [u.dz, 0., -u.dx], [-u.dy, u.dx, 0.]]);
        let r = nd::Array2::eye(3) + phi.sin() * &w + (2. * (phi / 2.).sin().powi(2)) * w.dot(&w);
        Some(Self::from_array2(&r))
    }

    pub fn about_x(phi: f64) -> Self {
        let (s, c) = phi.sin_cos();
        Self::snapped([[1., 0., 0.], [0., c, -s], [0., s, c]])
    }

    pub fn about_y(phi: f64) -> Self {
        let (s, c) = phi.sin_cos();
        Self::snapped([[c, 0., s], [0., 1., 0.], [-s, 0., c]])
    }

    pub fn about_z(phi: f64) -> Self {
        let (s, c) = phi.sin_cos();
        Self::snapped([[c, -s, 0.], [s, c, 0.], [0., 0., 1.]])
    }

    /// Applies successive rotations about X, then Y, then Z (radians).
    pub fn from_euler_xyz(rx: f64, ry: f64, rz: f64) -> Self {
        Self::about_z(rz)
            .compose(&Self::about_y(ry))
            .compose(&Self::about_x(rx))
    }

    /// Mirror through the YZ plane (x -> -x).
    pub fn reflect_x() -> Self {
        Self {
            m: [[-1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
        }
    }

    /// Matrix product `self * other` (apply `other` first).
    pub fn compose(&self, other: &Self) -> Self {
        let a = self.to_array2();
        let b = other.to_array2();
        Self::from_array2(&a.dot(&b))
    }

    /// Inverse of an orthogonal matrix (its transpose).
    pub fn inverse(&self) -> Self {
        let a = self.to_array2();
        Self::from_array2(&a.t().to_owned())
    }

    pub fn apply(&self, v: Vector) -> Vector {
        let m = &self.m;
        Vector::new(
            m[0][0] * v.dx + m[0][1] * v.dy + m[0][2] * v.dz,
            m[1][0] * v.dx + m[1][1] * v.dy + m[1][2] * v.dz,
            m[2][0] * v.dx + m[2][1] * v.dy + m[2][2] * v.dz,
        )
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    pub fn is_identity(&self) -> bool {
        let id = Self::identity();
        self.m
            .iter()
            .flatten()
            .zip(id.m.iter().flatten())
            .all(|(a, b)| a.is_close(*b))
    }

    pub fn is_reflection(&self) -> bool {
        self.determinant() < 0.0
    }

    /// Image of the local Z axis, used to compare tube axes.
    pub fn z_axis(&self) -> Vector {
        self.apply(Vector::new(0., 0., 1.))
    }

    /// Absolute values of the entries; maps half-extents of a box to the
    /// half-extents of its bounding box after rotation.
    pub fn abs_entries(&self) -> [[f64; 3]; 3] {
        self.m.map(|row| row.map(f64::abs))
    }

    fn to_array2(&self) -> nd::Array2<f64> {
        nd::arr2(&self.m)
    }

    fn from_array2(a: &nd::Array2<f64>) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = a[[i, j]];
            }
        }
        Self::snapped(m)
    }

    // Snap round-off so that quarter turns stay exact
    fn snapped(m: [[f64; 3]; 3]) -> Self {
        let snap = |x: f64| {
            if x.abs() < 1e-15 {
                0.0
            } else if (x.abs() - 1.0).abs() < 1e-15 {
                x.signum()
            } else {
                x
            }
        };
        Self {
            m: m.map(|row| row.map(snap)),
        }
    }
}

impl fmt::Display for RotationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return write!(f, "I");
        }
        let prec = f.precision().unwrap_or(3);
        for (i, row) in self.m.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(
                f,
                "[{:.prec$} {:.prec$} {:.prec$}]",
                row[0],
                row[1],
                row[2],
                prec = prec
            )?;
        }
        Ok(())
    }
}
