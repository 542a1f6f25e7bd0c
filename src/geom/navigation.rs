//! Point location and boundary distances in a [`VolumeTree`].

use crate::geom::rotation::RotationMatrix;
use crate::geom::volume::VolumeTree;
use crate::{Point, Vector};

/// One level of a touchable path.
#[derive(Debug, Clone)]
pub struct Level {
    pub physical: usize,
    pub copy_no: usize,
    /// Local-to-global transform: `global = rotation * local + translation`.
    rotation: RotationMatrix,
    translation: Vector,
}

/// Path of placements from the world down to the volume containing a point.
#[derive(Debug, Clone)]
pub struct Touchable {
    levels: Vec<Level>,
}

impl Touchable {
    /// Number of levels below the world.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Physical volume at the bottom of the path.
    pub fn physical(&self) -> usize {
        self.deepest().physical
    }

    /// Copy number `depth` levels above the bottom (0 = the volume itself).
    pub fn copy_number(&self, depth: usize) -> Option<usize> {
        let n = self.levels.len();
        if depth >= n {
            return None;
        }
        Some(self.levels[n - 1 - depth].copy_no)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn to_local(&self, p: Point) -> Point {
        let l = self.deepest();
        Point::from_vector(l.rotation.inverse().apply(p - Point::from_vector(l.translation)))
    }

    pub fn direction_to_local(&self, d: Vector) -> Vector {
        self.deepest().rotation.inverse().apply(d)
    }

    fn deepest(&self) -> &Level {
        // A touchable always has at least the world level
        &self.levels[self.levels.len() - 1]
    }
}

impl VolumeTree {
    /// Finds the deepest volume containing the global point `p`.
    ///
    /// Returns `None` outside the world.
    pub fn locate(&self, p: Point) -> Option<Touchable> {
        let world = self.world().ok()?;
        let world_lv = self.logical_of(world);
        if !world_lv.solid.contains(p) {
            return None;
        }
        let mut levels = vec![Level {
            physical: world,
            copy_no: 0,
            rotation: RotationMatrix::identity(),
            translation: Vector::zero(),
        }];
        let mut local = p;

        'descend: loop {
            let current = &levels[levels.len() - 1];
            let lv = self.logical_of(current.physical);
            for &d in lv.daughters() {
                let pv = self.physical(d);
                let copy = pv.copy_at(local);
                let p_d = copy.to_local(local);
                if self.logical(pv.logical).solid.contains(p_d) {
                    let rotation = current.rotation.compose(&copy.rotation);
                    let translation = current.rotation.apply(copy.translation) + current.translation;
                    levels.push(Level {
                        physical: d,
                        copy_no: copy.copy_no,
                        rotation,
                        translation,
                    });
                    local = p_d;
                    continue 'descend;
                }
            }
            break;
        }
        Some(Touchable { levels })
    }

    /// Distance from `p` along `dir` to the next boundary: leaving the
    /// current volume or entering one of its daughters.
    pub fn distance_to_boundary(&self, touchable: &Touchable, p: Point, dir: Vector) -> f64 {
        let local = touchable.to_local(p);
        let local_dir = touchable.direction_to_local(dir);
        let lv = self.logical_of(touchable.physical());
        let mut dist = lv.solid.distance_to_out(local, local_dir);
        for &d in lv.daughters() {
            let pv = self.physical(d);
            let solid = &self.logical(pv.logical).solid;
            for copy in pv.copies() {
                let p_d = copy.to_local(local);
                let dir_d = copy.rotation.inverse().apply(local_dir);
                if let Some(t) = solid.distance_to_in(p_d, dir_d) {
                    dist = dist.min(t);
                }
            }
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::solid::Solid;
    use crate::geom::volume::Axis;
    use std::f64::consts::PI;

    /// World > Stack (offset in y, 2 layers along z) > Layer > Diode
    fn stack_tree() -> VolumeTree {
        let mut tree = VolumeTree::new(true);
        let world = tree
            .add_logical("World", Solid::new_box("World", 20., 20., 20.).unwrap(), "Galactic")
            .unwrap();
        let stack = tree
            .add_logical("Stack", Solid::new_box("Stack", 6., 6., 2.).unwrap(), "Galactic")
            .unwrap();
        let layer = tree
            .add_logical("Layer", Solid::new_box("Layer", 6., 6., 1.).unwrap(), "Galactic")
            .unwrap();
        let diode = tree
            .add_logical("Diode", Solid::new_box("Diode", 5., 5., 0.25).unwrap(), "G4_Si")
            .unwrap();
        tree.place_world("World", world).unwrap();
        tree.place("Stack", stack, world, RotationMatrix::identity(), Vector::new(0., 1., 0.), 0)
            .unwrap();
        tree.replicate("Layer", layer, stack, Axis::Z, 2, 2.0).unwrap();
        tree.place("Diode", diode, layer, RotationMatrix::identity(), Vector::new(0., 0., -0.75), 0)
            .unwrap();
        tree
    }

    #[test]
    fn test_locate_in_replica() {
        let tree = stack_tree();
        // Second layer spans z in [0, 2]; its diode spans [0, 0.5]
        let t = tree.locate(Point::new(0., 0., 0.2)).unwrap();
        assert_eq!(tree.logical_of(t.physical()).name, "Diode");
        assert_eq!(t.depth(), 3);
        assert_eq!(t.copy_number(1), Some(1));
        let local = t.to_local(Point::new(0., 0., 0.2));
        assert!(local.is_within(&Point::new(0., -1., -0.05), 1e-12));

        // Backing part of the first layer
        let t = tree.locate(Point::new(0., 0., -0.5)).unwrap();
        assert_eq!(tree.logical_of(t.physical()).name, "Layer");
        assert_eq!(t.copy_number(0), Some(0));

        assert!(tree.locate(Point::new(0., 0., 30.)).is_none());
    }

    #[test]
    fn test_distance_to_boundary() {
        let tree = stack_tree();
        let dz = Vector::new(0., 0., 1.);
        let start = Point::new(0., 0., -15.);
        let t = tree.locate(start).unwrap();
        // World -> enters the stack at z = -2
        let d = tree.distance_to_boundary(&t, start, dz);
        assert!((d - 13.0).abs() < 1e-9);

        // Inside the first diode: leaves at z = -1.5
        let p = Point::new(0., 0., -1.9);
        let t = tree.locate(p).unwrap();
        assert_eq!(tree.logical_of(t.physical()).name, "Diode");
        let d = tree.distance_to_boundary(&t, p, dz);
        assert!((d - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_placement() {
        let mut tree = VolumeTree::new(true);
        let world = tree
            .add_logical("World", Solid::new_box("World", 20., 20., 20.).unwrap(), "Galactic")
            .unwrap();
        let bar = tree
            .add_logical("Bar", Solid::new_box("Bar", 4., 1., 1.).unwrap(), "G4_Si")
            .unwrap();
        tree.place_world("World", world).unwrap();
        tree.place("Bar", bar, world, RotationMatrix::about_z(PI / 2.), Vector::new(5., 0., 0.), 0)
            .unwrap();
        // The long side now runs along Y
        assert!(tree.locate(Point::new(5., 3.5, 0.)).is_some_and(|t| t.depth() == 1));
        assert!(tree.locate(Point::new(8., 0., 0.)).is_some_and(|t| t.depth() == 0));
    }
}
