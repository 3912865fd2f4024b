use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::Vec3;

use super::{compute_neighbors, NeighborFlags, VoxelBox};
use crate::{
    config::DEFAULT_NEIGHBOR_EPSILON,
    error::{ExportError, Result},
};

/// Quads of a voxel as 1-based offsets into its eight corners, each paired
/// with the neighbour that hides it.
const FACES: [(NeighborFlags, [usize; 4]); 6] = [
    (NeighborFlags::MINUS_X, [1, 5, 7, 3]),
    (NeighborFlags::PLUS_X, [2, 4, 8, 6]),
    (NeighborFlags::MINUS_Y, [1, 2, 6, 5]),
    (NeighborFlags::PLUS_Y, [4, 3, 7, 8]),
    (NeighborFlags::MINUS_Z, [1, 2, 4, 3]),
    (NeighborFlags::PLUS_Z, [5, 6, 8, 7]),
];

/// Quad mesh of the outer shell of a voxel set.
///
/// Every voxel contributes its eight corners; only faces without an
/// equal-size neighbour are kept. Face indices are 1-based, as in OBJ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoxelMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[usize; 4]>,
}

impl VoxelMesh {
    pub fn from_boxes(boxes: &[VoxelBox]) -> Self {
        Self::from_boxes_with_epsilon(boxes, DEFAULT_NEIGHBOR_EPSILON)
    }

    /// # Panics
    /// If the voxels do not all have the same size.
    pub fn from_boxes_with_epsilon(boxes: &[VoxelBox], epsilon: f32) -> Self {
        let neighbors = compute_neighbors(boxes, epsilon);
        let mut mesh = VoxelMesh {
            vertices: Vec::with_capacity(boxes.len() * 8),
            faces: Vec::new(),
        };
        for (i, (voxel, flags)) in boxes.iter().zip(&neighbors).enumerate() {
            mesh.vertices.extend(voxel.corners());
            let base = 8 * i;
            for (hidden_by, quad) in FACES {
                if !flags.contains(hidden_by) {
                    mesh.faces.push(quad.map(|v| base + v));
                }
            }
        }
        mesh
    }

    /// Writes the mesh as Wavefront OBJ text.
    pub fn write_obj<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "# list of vertices")?;
        for v in &self.vertices {
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
        writeln!(writer)?;
        writeln!(writer, "# list of faces")?;
        for [a, b, c, d] in &self.faces {
            writeln!(writer, "f {a} {b} {c} {d}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Builds the shell mesh of `boxes` and writes it to `path` as OBJ.
///
/// # Errors
/// [`ExportError::Create`] when `path` cannot be opened for writing,
/// [`ExportError::Write`] when writing fails afterwards.
///
/// # Panics
/// If the voxels do not all have the same size.
pub fn export_obj(boxes: &[VoxelBox], path: impl AsRef<Path>) -> Result<VoxelMesh> {
    let path = path.as_ref();
    let mesh = VoxelMesh::from_boxes(boxes);
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    mesh.write_obj(BufWriter::new(file))?;
    log::debug!(
        "exported {} voxels to {}: {} vertices, {} faces",
        boxes.len(),
        path.display(),
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(mesh)
}
