//! Spatial Proximity – broad-phase collision and distance queries for Rust.
//!
//! Objects are owned by the caller (usually in an [`Arena`]) and registered
//! with one of several interchangeable broad-phase managers. Managers prune
//! candidate pairs with axis-aligned bounding boxes and hand the survivors to
//! caller-supplied callbacks, which run the exact tests. Every strategy
//! reports the same overlapping pairs and the same minimum distance; they
//! differ only in how they index the scene.
//!
//! ```
//! use std::sync::Arc;
//! use spatial_proximity::{
//!     create_manager, Arena, BroadPhaseConfig, BroadPhaseKind, CollisionObject,
//!     CollisionPairs, Shape, Transform, Vec3,
//! };
//!
//! let mut objects: Arena<CollisionObject> = Arena::new();
//! let cube = Arc::new(Shape::cube(1.0));
//! for x in [0.0, 0.5, 4.0] {
//!     let transform = Transform::from_position(Vec3::new(x, 0.0, 0.0));
//!     objects.insert_with(|id| CollisionObject::new(id, cube.clone(), transform));
//! }
//!
//! let mut manager = create_manager(BroadPhaseKind::DynamicTree, &BroadPhaseConfig::default());
//! manager.register_objects(&objects.iter().collect::<Vec<_>>());
//! manager.setup();
//!
//! let mut pairs = CollisionPairs::new(|_, _| true);
//! manager.collide(&mut pairs);
//! assert_eq!(pairs.pairs.len(), 1);
//! ```
//!
//! The [`voxel`] module is independent of the managers: it finds the shared
//! faces of equal-size voxels and exports the outer shell as an OBJ mesh.

pub mod collision;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;
pub mod voxel;

pub use glam::{Quat, Vec3};

pub use collision::{
    create_manager, BroadPhaseKind, BroadPhaseManager, CollisionCallback, CollisionPairs,
    DistanceCallback, ManagerState, MinDistance,
};
pub use config::BroadPhaseConfig;
pub use core::{Aabb, CollisionObject, Proxy, Shape, Transform};
pub use error::ExportError;
pub use utils::allocator::{Arena, EntityId, GenerationalId};
pub use voxel::{export_obj, NeighborFlags, VoxelBox, VoxelMesh};
