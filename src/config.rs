//! Configuration defaults for the broad-phase managers and the voxel exporter.

use serde::{Deserialize, Serialize};

use crate::core::Aabb;

/// Default edge length of a spatial-hash cell.
pub const DEFAULT_CELL_SIZE: f32 = 5.0;

/// Number of median-split levels a dynamic tree bulk build performs before it
/// falls back to inserting the remaining objects one by one.
pub const DEFAULT_TREE_INIT_LEVEL: usize = 32;

/// Margin added around each dynamic-tree leaf so small motions do not force a
/// reinsertion.
pub const DEFAULT_FAT_MARGIN: f32 = 0.05;

/// Tolerance used when matching voxel centers against each other.
pub const DEFAULT_NEIGHBOR_EPSILON: f32 = 1e-5;

/// Tolerance used when comparing distance results across strategies.
pub const DISTANCE_DELTA: f32 = 0.01;

/// Number of hash cells a single object may span before the spatial hash
/// logs a tuning warning.
pub const CELL_SPAN_WARNING: usize = 4096;

/// Tuning knobs shared by the manager factory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadPhaseConfig {
    /// Edge length of a spatial-hash cell. Query cost depends on the ratio of
    /// this size to the typical object size and density; it is never adjusted
    /// automatically.
    pub cell_size: f32,
    /// Fixed scene limit for the spatial hash. `None` recomputes the limit from
    /// the registered objects on every setup.
    pub scene_limit: Option<Aabb>,
    pub tree_init_level: usize,
    pub fat_margin: f32,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            scene_limit: None,
            tree_init_level: DEFAULT_TREE_INIT_LEVEL,
            fat_margin: DEFAULT_FAT_MARGIN,
        }
    }
}

impl BroadPhaseConfig {
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_scene_limit(mut self, scene_limit: Aabb) -> Self {
        self.scene_limit = Some(scene_limit);
        self
    }

    pub fn with_tree_init_level(mut self, level: usize) -> Self {
        self.tree_init_level = level;
        self
    }

    pub fn with_fat_margin(mut self, margin: f32) -> Self {
        self.fat_margin = margin;
        self
    }
}
