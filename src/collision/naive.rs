use super::{
    callback::{CollisionCallback, DistanceCallback},
    manager::{BroadPhaseManager, ManagerState},
    registry::ProxyRegistry,
};
use crate::{
    core::{CollisionObject, Proxy},
    utils::allocator::EntityId,
};

/// Brute-force manager without any index.
///
/// Every query scans all pairs. It is the reference the other strategies are
/// checked against.
#[derive(Debug, Default)]
pub struct NaiveManager {
    registry: ProxyRegistry,
    state: ManagerState,
}

impl NaiveManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BroadPhaseManager for NaiveManager {
    fn name(&self) -> &'static str {
        "naive"
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
        let proxies = self.registry.as_slice();
        for (i, a) in proxies.iter().enumerate() {
            for b in &proxies[i + 1..] {
                if a.aabb.overlaps(&b.aabb) && callback.collide(a.id, b.id) {
                    return;
                }
            }
        }
    }

    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool {
        self.state.assert_queryable(self.name());
        for proxy in self.registry.as_slice() {
            if proxy.id == query.id {
                continue;
            }
            if query.aabb.overlaps(&proxy.aabb) && callback.collide(query.id, proxy.id) {
                return true;
            }
        }
        false
    }

    fn distance(&self, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let proxies = self.registry.as_slice();
        for (i, a) in proxies.iter().enumerate() {
            for b in &proxies[i + 1..] {
                if a.aabb.distance(&b.aabb) <= callback.min_distance() {
                    callback.distance(a.id, b.id);
                }
            }
        }
    }

    fn distance_proxy(&self, query: &Proxy, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        for proxy in self.registry.as_slice() {
            if proxy.id == query.id {
                continue;
            }
            if query.aabb.distance(&proxy.aabb) <= callback.min_distance() {
                callback.distance(query.id, proxy.id);
            }
        }
    }
}
