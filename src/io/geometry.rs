//! Volume tree as JSON.
//!
//! The dump keeps the whole arena (logical volumes with their UIDs, physical
//! placements and the world index), so a tree read back navigates the same
//! way as the one written.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::geom::volume::VolumeTree;

pub fn write_geometry(path: &Path, tree: &VolumeTree) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, tree)
        .with_context(|| format!("Failed to serialize geometry to: {}", path.display()))?;

    Ok(())
}

pub fn read_geometry(path: &Path) -> Result<VolumeTree> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let tree: VolumeTree = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize geometry from: {}", path.display()))?;

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::rotation::RotationMatrix;
    use crate::geom::solid::Solid;
    use crate::{Point, Vector};

    #[test]
    fn test_geometry_round_trip() -> Result<()> {
        let mut tree = VolumeTree::new(true);
        let world = tree.add_logical("World", Solid::new_box("World", 25., 25., 25.)?, "Galactic")?;
        let ring = tree.add_logical("AnnularLV", Solid::new_tube("Annular", 4., 12., 0.15)?, "G4_Si")?;
        tree.place_world("World", world)?;
        tree.place("Annular", ring, world, RotationMatrix::identity(), Vector::new(0., 0., 10.), 0)?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("geometry.json");
        write_geometry(&path, &tree)?;
        let back = read_geometry(&path)?;

        assert_eq!(back.logicals().len(), 2);
        assert_eq!(back.logical(ring).uid, tree.logical(ring).uid);
        let t = back.locate(Point::new(6., 0., 10.)).expect("inside the ring");
        assert_eq!(back.logical_of(t.physical()).name, "AnnularLV");
        Ok(())
    }
}
