//! The contract every broad-phase strategy implements.

use serde::{Deserialize, Serialize};

use super::{
    callback::{CollisionCallback, DistanceCallback},
    dynamic_tree::{DynamicTreeArrayManager, DynamicTreeManager},
    interval_tree::IntervalTreeManager,
    naive::NaiveManager,
    sap::SapManager,
    spatial_hash::{DenseHashTable, SparseHashTable, SpatialHashManager},
    ssap::SsapManager,
};
use crate::{
    config::BroadPhaseConfig,
    core::{CollisionObject, Proxy},
    utils::allocator::EntityId,
};

/// Lifecycle of a manager's index.
///
/// Registering or unregistering moves a manager back to `Populated`; only
/// [`BroadPhaseManager::setup`] makes it `Ready`. Querying a `Populated`
/// manager is a contract violation and trips a debug assertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerState {
    #[default]
    Empty,
    Populated,
    Ready,
}

impl ManagerState {
    pub(crate) fn after_setup(object_count: usize) -> Self {
        if object_count == 0 {
            ManagerState::Empty
        } else {
            ManagerState::Ready
        }
    }

    pub(crate) fn assert_queryable(self, name: &str) {
        debug_assert!(
            self != ManagerState::Populated,
            "{name}: setup() must be called after registering or unregistering objects"
        );
    }
}

/// Interchangeable spatial index answering overlap and distance queries.
///
/// All strategies report the same set of overlapping pairs and the same
/// minimum distance for the same registered objects; only the visiting order
/// of candidate pairs differs. Managers are single-threaded and callbacks can
/// not reach back into the manager that invokes them.
pub trait BroadPhaseManager {
    /// Stable strategy label for logs and diagnostics.
    fn name(&self) -> &'static str;

    fn state(&self) -> ManagerState;

    /// Adds an object. Takes effect at the next [`BroadPhaseManager::setup`].
    ///
    /// # Panics
    /// If an object with the same id is already registered.
    fn register_object(&mut self, object: &CollisionObject);

    /// Adds many objects at once, letting the strategy build a better initial
    /// index than repeated single registration would.
    fn register_objects(&mut self, objects: &[&CollisionObject]) {
        for object in objects {
            self.register_object(object);
        }
    }

    /// # Panics
    /// If `id` was never registered or was already unregistered.
    fn unregister_object(&mut self, id: EntityId);

    /// Finalises the index after registrations. Idempotent.
    fn setup(&mut self);

    /// Reflects a changed world AABB of a registered object. The manager stays
    /// queryable; the result matches a rebuild from scratch.
    ///
    /// # Panics
    /// If the object is not registered.
    fn update_object(&mut self, object: &CollisionObject);

    fn update_objects(&mut self, objects: &[&CollisionObject]) {
        for object in objects {
            self.update_object(object);
        }
    }

    /// Removes every object and returns to [`ManagerState::Empty`].
    fn clear(&mut self);

    /// Snapshot of every registered object.
    fn objects(&self) -> Vec<Proxy>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports every registered pair whose AABBs overlap until the callback
    /// asks to stop.
    fn collide(&self, callback: &mut dyn CollisionCallback);

    /// Reports every registered object whose AABB overlaps `query`. An object
    /// registered under the query's own id is skipped. Returns `true` when the
    /// callback stopped the traversal.
    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool;

    fn collide_object(&self, query: &CollisionObject, callback: &mut dyn CollisionCallback) {
        self.collide_proxy(&query.proxy(), callback);
    }

    /// Self-distance: feeds candidate pairs to the callback, skipping those
    /// whose AABB lower bound exceeds its running minimum.
    fn distance(&self, callback: &mut dyn DistanceCallback);

    fn distance_proxy(&self, query: &Proxy, callback: &mut dyn DistanceCallback);

    fn distance_object(&self, query: &CollisionObject, callback: &mut dyn DistanceCallback) {
        self.distance_proxy(&query.proxy(), callback);
    }

    /// Every object of `other` queried against this manager.
    fn collide_manager(&self, other: &dyn BroadPhaseManager, callback: &mut dyn CollisionCallback) {
        for proxy in other.objects() {
            if self.collide_proxy(&proxy, callback) {
                return;
            }
        }
    }

    fn distance_manager(&self, other: &dyn BroadPhaseManager, callback: &mut dyn DistanceCallback) {
        for proxy in other.objects() {
            self.distance_proxy(&proxy, callback);
        }
    }
}

/// Strategy selector for [`create_manager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BroadPhaseKind {
    Naive,
    SimpleSweepAndPrune,
    SweepAndPrune,
    IntervalTree,
    SpatialHash,
    DenseSpatialHash,
    DynamicTree,
    DynamicTreeArray,
}

impl BroadPhaseKind {
    pub const ALL: [BroadPhaseKind; 8] = [
        BroadPhaseKind::Naive,
        BroadPhaseKind::SimpleSweepAndPrune,
        BroadPhaseKind::SweepAndPrune,
        BroadPhaseKind::IntervalTree,
        BroadPhaseKind::SpatialHash,
        BroadPhaseKind::DenseSpatialHash,
        BroadPhaseKind::DynamicTree,
        BroadPhaseKind::DynamicTreeArray,
    ];
}

/// Builds the manager for `kind`, configured from `config`.
pub fn create_manager(kind: BroadPhaseKind, config: &BroadPhaseConfig) -> Box<dyn BroadPhaseManager> {
    log::debug!("creating {kind:?} broad phase");
    match kind {
        BroadPhaseKind::Naive => Box::new(NaiveManager::new()),
        BroadPhaseKind::SimpleSweepAndPrune => Box::new(SsapManager::new()),
        BroadPhaseKind::SweepAndPrune => Box::new(SapManager::new()),
        BroadPhaseKind::IntervalTree => Box::new(IntervalTreeManager::new()),
        BroadPhaseKind::SpatialHash => Box::new(SpatialHashManager::<SparseHashTable>::from_config(config)),
        BroadPhaseKind::DenseSpatialHash => {
            Box::new(SpatialHashManager::<DenseHashTable>::from_config(config))
        }
        BroadPhaseKind::DynamicTree => Box::new(DynamicTreeManager::from_config(config)),
        BroadPhaseKind::DynamicTreeArray => Box::new(DynamicTreeArrayManager::from_config(config)),
    }
}
