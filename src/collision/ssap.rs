use super::{
    callback::{CollisionCallback, DistanceCallback},
    manager::{BroadPhaseManager, ManagerState},
    registry::ProxyRegistry,
};
use crate::{
    core::{aabb::axis_of_max_variance, CollisionObject, Proxy},
    utils::allocator::EntityId,
};

/// Simple sweep-and-prune.
///
/// Keeps no persistent structure: each query picks the axis with the widest
/// spread of centers, sorts the objects by their minimum along it and sweeps.
/// Costs O(n log n) per query regardless of how little the scene moved.
#[derive(Debug, Default)]
pub struct SsapManager {
    registry: ProxyRegistry,
    state: ManagerState,
}

impl SsapManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered proxies sorted by their minimum along the sweep axis.
    fn sorted(&self) -> (usize, Vec<Proxy>) {
        let mut proxies = self.registry.as_slice().to_vec();
        let axis = axis_of_max_variance(proxies.iter().map(|p| &p.aabb));
        proxies.sort_by(|a, b| a.aabb.min[axis].total_cmp(&b.aabb.min[axis]));
        (axis, proxies)
    }
}

impl BroadPhaseManager for SsapManager {
    fn name(&self) -> &'static str {
        "simple_sweep_and_prune"
    }

    fn state(&self) -> ManagerState {
        self.state
    }

    fn register_object(&mut self, object: &CollisionObject) {
        self.registry.insert(object.proxy(), self.name());
        self.state = ManagerState::Populated;
    }

    fn unregister_object(&mut self, id: EntityId) {
        self.registry.remove(id, self.name());
        self.state = ManagerState::Populated;
    }

    fn setup(&mut self) {
        self.state = ManagerState::after_setup(self.registry.len());
    }

    fn update_object(&mut self, object: &CollisionObject) {
        let slot = self.registry.expect_slot(object.id, self.name());
        self.registry.get_mut(slot).aabb = *object.aabb();
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.state = ManagerState::Empty;
    }

    fn objects(&self) -> Vec<Proxy> {
        self.registry.as_slice().to_vec()
    }

    fn len(&self) -> usize {
        self.registry.len()
    }

    fn collide(&self, callback: &mut dyn CollisionCallback) {
        self.state.assert_queryable(self.name());
        let (axis, sorted) = self.sorted();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                if b.aabb.min[axis] > a.aabb.max[axis] {
                    break;
                }
                if a.aabb.overlaps(&b.aabb) && callback.collide(a.id, b.id) {
                    return;
                }
            }
        }
    }

    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool {
        self.state.assert_queryable(self.name());
        let (axis, sorted) = self.sorted();
        for proxy in &sorted {
            if proxy.aabb.min[axis] > query.aabb.max[axis] {
                break;
            }
            if proxy.id != query.id
                && proxy.aabb.overlaps(&query.aabb)
                && callback.collide(query.id, proxy.id)
            {
                return true;
            }
        }
        false
    }

    fn distance(&self, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let (axis, sorted) = self.sorted();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                // Later entries start even further along the axis.
                if b.aabb.min[axis] - a.aabb.max[axis] > callback.min_distance() {
                    break;
                }
                if a.aabb.distance(&b.aabb) <= callback.min_distance() {
                    callback.distance(a.id, b.id);
                }
            }
        }
    }

    fn distance_proxy(&self, query: &Proxy, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let (axis, sorted) = self.sorted();
        for proxy in &sorted {
            if proxy.aabb.min[axis] - query.aabb.max[axis] > callback.min_distance() {
                break;
            }
            if proxy.id != query.id && query.aabb.distance(&proxy.aabb) <= callback.min_distance() {
                callback.distance(query.id, proxy.id);
            }
        }
    }
}
