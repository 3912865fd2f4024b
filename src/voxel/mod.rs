//! Face adjacency between equal-size voxels and surface mesh export.
//!
//! The voxel list is produced elsewhere (typically by an occupancy grid);
//! this module only decides which faces are shared and writes the outer
//! shell as a Wavefront OBJ file.

pub mod export;
pub mod neighbors;

pub use export::{export_obj, VoxelMesh};
pub use neighbors::{compute_neighbors, NeighborFlags};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::Aabb;

/// Axis-aligned cube given by its center and edge length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelBox {
    pub center: Vec3,
    pub size: f32,
}

impl VoxelBox {
    pub fn new(center: Vec3, size: f32) -> Self {
        Self { center, size }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_half_extents(self.center, Vec3::splat(self.size * 0.5))
    }

    /// Corners with x varying fastest, then y, then z.
    pub fn corners(&self) -> [Vec3; 8] {
        let h = self.size * 0.5;
        let c = self.center;
        std::array::from_fn(|i| {
            let sign = |bit: usize| if i & bit == 0 { -h } else { h };
            c + Vec3::new(sign(1), sign(2), sign(4))
        })
    }
}
