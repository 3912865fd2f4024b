use super::{
    callback::{CollisionCallback, DistanceCallback},
    manager::{BroadPhaseManager, ManagerState},
    registry::ProxyRegistry,
};
use crate::{
    core::{aabb::axis_of_max_variance, CollisionObject, Proxy},
    utils::{allocator::EntityId, logging::PassTimer},
};

const MIN: usize = 0;
const MAX: usize = 1;

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    value: f32,
    slot: usize,
    kind: usize,
}

impl Endpoint {
    /// Sort order along an axis. A minimum sorts before a maximum of equal
    /// value so that touching intervals are seen as overlapping.
    #[inline]
    fn precedes(&self, other: &Endpoint) -> bool {
        self.value < other.value || (self.value == other.value && self.kind < other.kind)
    }
}

/// Sweep-and-prune with persistent endpoint lists.
///
/// Every axis keeps a sorted list of interval endpoints. Updates move only
/// the endpoints of the changed object, bubbling them past the neighbours they
/// crossed, which is close to linear when objects move a little between
/// queries. Queries sweep the axis chosen at setup and confirm candidates
/// with a full AABB test.
#[derive(Debug, Default)]
pub struct SapManager {
    registry: ProxyRegistry,
    endpoints: [Vec<Endpoint>; 3],
    /// Position of each slot's `[min, max]` endpoint in every axis list.
    positions: Vec<[[usize; 2]; 3]>,
    axis: usize,
    dirty: bool,
    state: ManagerState,
}

impl SapManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis the sweeps run along, chosen at the last setup.
    pub fn sweep_axis(&self) -> usize {
        self.axis
    }

    fn rebuild(&mut self) {
        let _timer = PassTimer::new("sweep_and_prune", "rebuild", self.registry.len());
        let proxies = self.registry.as_slice();
        self.axis = axis_of_max_variance(proxies.iter().map(|p| &p.aabb));
        self.positions = vec![[[0; 2]; 3]; proxies.len()];
        for (axis, list) in self.endpoints.iter_mut().enumerate() {
            list.clear();
            for (slot, proxy) in proxies.iter().enumerate() {
                list.push(Endpoint {
                    value: proxy.aabb.min[axis],
                    slot,
                    kind: MIN,
                });
                list.push(Endpoint {
                    value: proxy.aabb.max[axis],
                    slot,
                    kind: MAX,
                });
            }
            list.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.kind.cmp(&b.kind)));
            for (position, endpoint) in list.iter().enumerate() {
                self.positions[endpoint.slot][axis][endpoint.kind] = position;
            }
        }
        self.dirty = false;
        log::debug!(
            "sap: {} objects, sweeping along axis {}",
            proxies.len(),
            self.axis
        );
    }

    /// Moves one endpoint to its sorted position after its value changed.
    fn bubble(&mut self, axis: usize, mut position: usize) {
        let list = &mut self.endpoints[axis];
        let positions = &mut self.positions;
        while position > 0 && list[position].precedes(&list[position - 1]) {
            list.swap(position, position - 1);
            let moved = list[position];
            positions[moved.slot][axis][moved.kind] = position;
            position -= 1;
        }
        while position + 1 < list.len() && list[position + 1].precedes(&list[position]) {
            list.swap(position, position + 1);
            let moved = list[position];
            positions[moved.slot][axis][moved.kind] = position;
            position += 1;
        }
        let settled = list[position];
        positions[settled.slot][axis][settled.kind] = position;
    }

    /// Minimum endpoints along the sweep axis, in sweep order.
    fn sweep_order(&self) -> impl Iterator<Item = &Proxy> + '_ {
        self.endpoints[self.axis]
            .iter()
            .filter(|e| e.kind == MIN)
            .map(|e| self.registry.get(e.slot))
    }
}

impl BroadPhaseManager for SapManager {
    fn name(&self) -> &'static str {
        "sweep_and_prune"
    }

    fn state(&self) -> ManagerState {
        self.state
    }

    fn register_object(&mut self, object: &CollisionObject) {
        self.registry.insert(object.proxy(), self.name());
        self.dirty = true;
        self.state = ManagerState::Populated;
    }

    fn unregister_object(&mut self, id: EntityId) {
        self.registry.remove(id, self.name());
        self.dirty = true;
        self.state = ManagerState::Populated;
    }

    fn setup(&mut self) {
        if self.dirty {
            self.rebuild();
        }
        self.state = ManagerState::after_setup(self.registry.len());
    }

    fn update_object(&mut self, object: &CollisionObject) {
        let slot = self.registry.expect_slot(object.id, self.name());
        let aabb = *object.aabb();
        self.registry.get_mut(slot).aabb = aabb;
        if self.dirty {
            return;
        }
        for axis in 0..3 {
            for (kind, value) in [(MIN, aabb.min[axis]), (MAX, aabb.max[axis])] {
                let position = self.positions[slot][axis][kind];
                self.endpoints[axis][position].value = value;
                self.bubble(axis, position);
            }
        }
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.endpoints.iter_mut().for_each(Vec::clear);
        self.positions.clear();
        self.dirty = false;
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
        let mut active: Vec<usize> = Vec::new();
        for endpoint in &self.endpoints[self.axis] {
            if endpoint.kind == MAX {
                if let Some(i) = active.iter().position(|&slot| slot == endpoint.slot) {
                    active.swap_remove(i);
                }
                continue;
            }
            let entering = self.registry.get(endpoint.slot);
            for &slot in &active {
                let other = self.registry.get(slot);
                if other.aabb.overlaps(&entering.aabb) && callback.collide(other.id, entering.id) {
                    return;
                }
            }
            active.push(endpoint.slot);
        }
    }

    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool {
        self.state.assert_queryable(self.name());
        let list = &self.endpoints[self.axis];
        let upper = query.aabb.max[self.axis];
        let end = list.partition_point(|e| e.value <= upper);
        for endpoint in list[..end].iter().filter(|e| e.kind == MIN) {
            let proxy = self.registry.get(endpoint.slot);
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
        let axis = self.axis;
        let sorted: Vec<&Proxy> = self.sweep_order().collect();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
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
        let axis = self.axis;
        for proxy in self.sweep_order() {
            if proxy.aabb.min[axis] - query.aabb.max[axis] > callback.min_distance() {
                break;
            }
            if proxy.id != query.id && query.aabb.distance(&proxy.aabb) <= callback.min_distance() {
                callback.distance(query.id, proxy.id);
            }
        }
    }
}
