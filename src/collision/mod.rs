//! Broad-phase managers: interchangeable spatial indexes over registered
//! objects' AABBs, plus the callbacks that run the exact tests.

pub mod callback;
pub mod dynamic_tree;
pub mod interval_tree;
pub mod manager;
pub mod naive;
pub(crate) mod registry;
pub mod sap;
pub mod spatial_hash;
pub mod ssap;

pub use callback::{CollisionCallback, CollisionPairs, DistanceCallback, MinDistance};
pub use dynamic_tree::{DynamicAabbTreeManager, DynamicTreeArrayManager, DynamicTreeManager};
pub use interval_tree::{IntervalTree, IntervalTreeManager};
pub use manager::{create_manager, BroadPhaseKind, BroadPhaseManager, ManagerState};
pub use naive::NaiveManager;
pub use sap::SapManager;
pub use spatial_hash::{DenseHashTable, HashTable, SparseHashTable, SpatialHashManager};
pub use ssap::SsapManager;
