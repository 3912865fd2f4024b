use bitflags::bitflags;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::VoxelBox;

bitflags! {
    /// Faces of a voxel covered by an equal-size neighbour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NeighborFlags: u8 {
        const MINUS_X = 0x1;
        const PLUS_X = 0x2;
        const MINUS_Y = 0x4;
        const PLUS_Y = 0x8;
        const MINUS_Z = 0x10;
        const PLUS_Z = 0x20;
    }
}

/// Determines, for every voxel, which of its six faces touch another voxel.
///
/// Two voxels share a face when their centers differ by exactly one edge
/// length along one axis and agree on the other two, within `epsilon`. Every
/// voxel is compared against every other, so the cost is quadratic in the
/// number of voxels. With the `parallel` feature the per-voxel scans run on
/// the rayon pool.
///
/// # Panics
/// If the voxels do not all have the same size.
pub fn compute_neighbors(boxes: &[VoxelBox], epsilon: f32) -> Vec<NeighborFlags> {
    if let Some(first) = boxes.first() {
        assert!(
            boxes.iter().all(|b| b.size == first.size),
            "all voxels must have the same size"
        );
    }

    #[cfg(feature = "parallel")]
    let flags = boxes
        .par_iter()
        .map(|voxel| neighbors_of(voxel, boxes, epsilon))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let flags = boxes
        .iter()
        .map(|voxel| neighbors_of(voxel, boxes, epsilon))
        .collect();
    flags
}

fn neighbors_of(voxel: &VoxelBox, boxes: &[VoxelBox], epsilon: f32) -> NeighborFlags {
    let s = voxel.size;
    let near = |v: f32| v.abs() < epsilon;
    let mut flags = NeighborFlags::empty();
    for other in boxes {
        let d = voxel.center - other.center;
        if near(d.x - s) && near(d.y) && near(d.z) {
            flags |= NeighborFlags::MINUS_X;
        } else if near(d.x + s) && near(d.y) && near(d.z) {
            flags |= NeighborFlags::PLUS_X;
        } else if near(d.x) && near(d.y - s) && near(d.z) {
            flags |= NeighborFlags::MINUS_Y;
        } else if near(d.x) && near(d.y + s) && near(d.z) {
            flags |= NeighborFlags::PLUS_Y;
        } else if near(d.x) && near(d.y) && near(d.z - s) {
            flags |= NeighborFlags::MINUS_Z;
        } else if near(d.x) && near(d.y) && near(d.z + s) {
            flags |= NeighborFlags::PLUS_Z;
        }
    }
    flags
}
