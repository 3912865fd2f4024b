use std::cmp::Ordering;

use super::{
    callback::{CollisionCallback, DistanceCallback},
    manager::{BroadPhaseManager, ManagerState},
    registry::ProxyRegistry,
};
use crate::{
    core::{Aabb, CollisionObject, Proxy},
    utils::allocator::EntityId,
};

#[derive(Debug, Clone)]
struct IntervalNode {
    low: f32,
    high: f32,
    id: EntityId,
    /// Largest `high` in this subtree.
    max_high: f32,
    height: i32,
    left: Option<usize>,
    right: Option<usize>,
}

/// Augmented AVL tree over closed 1-D intervals, ordered by `(low, id)`.
///
/// Nodes live in a vector with a free list; links are indices.
#[derive(Debug, Default, Clone)]
pub struct IntervalTree {
    nodes: Vec<IntervalNode>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl IntervalTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> i32 {
        self.height_of(self.root)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    pub fn insert(&mut self, low: f32, high: f32, id: EntityId) {
        let node = IntervalNode {
            low,
            high,
            id,
            max_high: high,
            height: 1,
            left: None,
            right: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.root = Some(self.insert_at(self.root, index));
        self.len += 1;
    }

    /// Removes the interval stored under `(low, id)`. Returns `false` when no
    /// such interval exists.
    pub fn remove(&mut self, low: f32, id: EntityId) -> bool {
        let mut found = false;
        self.root = self.remove_at(self.root, low, id, &mut found);
        if found {
            self.len -= 1;
        }
        found
    }

    /// Appends the id of every interval intersecting `[low, high]`.
    pub fn query(&self, low: f32, high: f32, out: &mut Vec<EntityId>) {
        self.query_at(self.root, low, high, out);
    }

    fn query_at(&self, node: Option<usize>, low: f32, high: f32, out: &mut Vec<EntityId>) {
        let Some(n) = node else {
            return;
        };
        let current = &self.nodes[n];
        if current.max_high < low {
            return;
        }
        self.query_at(current.left, low, high, out);
        // Everything to the right starts at or after this node.
        if current.low > high {
            return;
        }
        if current.high >= low {
            out.push(current.id);
        }
        self.query_at(current.right, low, high, out);
    }

    fn compare(&self, low: f32, id: EntityId, node: usize) -> Ordering {
        let other = &self.nodes[node];
        low.total_cmp(&other.low).then(id.cmp(&other.id))
    }

    fn insert_at(&mut self, node: Option<usize>, new: usize) -> usize {
        let Some(n) = node else {
            return new;
        };
        let (low, id) = (self.nodes[new].low, self.nodes[new].id);
        if self.compare(low, id, n) == Ordering::Less {
            let left = self.insert_at(self.nodes[n].left, new);
            self.nodes[n].left = Some(left);
        } else {
            let right = self.insert_at(self.nodes[n].right, new);
            self.nodes[n].right = Some(right);
        }
        self.rebalance(n)
    }

    fn remove_at(
        &mut self,
        node: Option<usize>,
        low: f32,
        id: EntityId,
        found: &mut bool,
    ) -> Option<usize> {
        let n = node?;
        match self.compare(low, id, n) {
            Ordering::Less => {
                self.nodes[n].left = self.remove_at(self.nodes[n].left, low, id, found);
            }
            Ordering::Greater => {
                self.nodes[n].right = self.remove_at(self.nodes[n].right, low, id, found);
            }
            Ordering::Equal => {
                *found = true;
                self.free.push(n);
                let (left, right) = (self.nodes[n].left, self.nodes[n].right);
                let Some(right) = right else {
                    return left;
                };
                if left.is_none() {
                    return Some(right);
                }
                let (rest, successor) = self.detach_min(right);
                self.nodes[successor].left = left;
                self.nodes[successor].right = rest;
                return Some(self.rebalance(successor));
            }
        }
        Some(self.rebalance(n))
    }

    /// Unlinks the leftmost node of the subtree at `n`; returns the new
    /// subtree root and the detached node.
    fn detach_min(&mut self, n: usize) -> (Option<usize>, usize) {
        match self.nodes[n].left {
            None => (self.nodes[n].right, n),
            Some(left) => {
                let (rest, min) = self.detach_min(left);
                self.nodes[n].left = rest;
                (Some(self.rebalance(n)), min)
            }
        }
    }

    fn height_of(&self, node: Option<usize>) -> i32 {
        node.map_or(0, |n| self.nodes[n].height)
    }

    fn refresh(&mut self, n: usize) {
        let (left, right) = (self.nodes[n].left, self.nodes[n].right);
        let mut max_high = self.nodes[n].high;
        for child in [left, right].into_iter().flatten() {
            max_high = max_high.max(self.nodes[child].max_high);
        }
        let height = 1 + self.height_of(left).max(self.height_of(right));
        let node = &mut self.nodes[n];
        node.max_high = max_high;
        node.height = height;
    }

    fn rotate_left(&mut self, n: usize) -> usize {
        let Some(pivot) = self.nodes[n].right else {
            return n;
        };
        self.nodes[n].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(n);
        self.refresh(n);
        self.refresh(pivot);
        pivot
    }

    fn rotate_right(&mut self, n: usize) -> usize {
        let Some(pivot) = self.nodes[n].left else {
            return n;
        };
        self.nodes[n].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(n);
        self.refresh(n);
        self.refresh(pivot);
        pivot
    }

    fn balance_factor(&self, n: usize) -> i32 {
        self.height_of(self.nodes[n].left) - self.height_of(self.nodes[n].right)
    }

    fn rebalance(&mut self, n: usize) -> usize {
        self.refresh(n);
        let factor = self.balance_factor(n);
        if factor > 1 {
            if let Some(left) = self.nodes[n].left {
                if self.balance_factor(left) < 0 {
                    let rotated = self.rotate_left(left);
                    self.nodes[n].left = Some(rotated);
                }
            }
            return self.rotate_right(n);
        }
        if factor < -1 {
            if let Some(right) = self.nodes[n].right {
                if self.balance_factor(right) > 0 {
                    let rotated = self.rotate_right(right);
                    self.nodes[n].right = Some(rotated);
                }
            }
            return self.rotate_left(n);
        }
        n
    }
}

/// One interval tree per axis.
///
/// Insertions and removals rebalance the affected tree instead of shifting
/// sorted arrays, so the cost of an update does not depend on how far an
/// object travels through the ordering.
#[derive(Debug, Default)]
pub struct IntervalTreeManager {
    registry: ProxyRegistry,
    trees: [IntervalTree; 3],
    state: ManagerState,
}

impl IntervalTreeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self, axis: usize) -> &IntervalTree {
        &self.trees[axis]
    }

    fn insert_proxy(&mut self, proxy: &Proxy) {
        for (axis, tree) in self.trees.iter_mut().enumerate() {
            tree.insert(proxy.aabb.min[axis], proxy.aabb.max[axis], proxy.id);
        }
    }

    fn remove_proxy(&mut self, proxy: &Proxy) {
        for (axis, tree) in self.trees.iter_mut().enumerate() {
            let removed = tree.remove(proxy.aabb.min[axis], proxy.id);
            debug_assert!(removed, "interval of {:?} missing on axis {axis}", proxy.id);
        }
    }

    fn proxy(&self, id: EntityId) -> &Proxy {
        self.registry.get(self.registry.expect_slot(id, self.name()))
    }

    /// Candidates whose x interval lies within `margin` of `aabb`.
    fn candidates(&self, aabb: &Aabb, margin: f32, out: &mut Vec<EntityId>) {
        out.clear();
        self.trees[0].query(aabb.min.x - margin, aabb.max.x + margin, out);
    }
}

impl BroadPhaseManager for IntervalTreeManager {
    fn name(&self) -> &'static str {
        "interval_tree"
    }

    fn state(&self) -> ManagerState {
        self.state
    }

    fn register_object(&mut self, object: &CollisionObject) {
        let proxy = object.proxy();
        self.registry.insert(proxy, self.name());
        self.insert_proxy(&proxy);
        self.state = ManagerState::Populated;
    }

    fn unregister_object(&mut self, id: EntityId) {
        let removal = self.registry.remove(id, self.name());
        self.remove_proxy(&removal.removed);
        self.state = ManagerState::Populated;
    }

    fn setup(&mut self) {
        log::debug!(
            "interval tree: {} objects, heights {:?}",
            self.registry.len(),
            self.trees.each_ref().map(IntervalTree::height)
        );
        self.state = ManagerState::after_setup(self.registry.len());
    }

    fn update_object(&mut self, object: &CollisionObject) {
        let slot = self.registry.expect_slot(object.id, self.name());
        let previous = *self.registry.get(slot);
        self.remove_proxy(&previous);
        let proxy = object.proxy();
        *self.registry.get_mut(slot) = proxy;
        self.insert_proxy(&proxy);
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.trees.iter_mut().for_each(IntervalTree::clear);
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
        let mut candidates = Vec::new();
        for a in self.registry.as_slice() {
            self.candidates(&a.aabb, 0.0, &mut candidates);
            for &id in &candidates {
                if id <= a.id {
                    continue;
                }
                let b = self.proxy(id);
                if a.aabb.overlaps(&b.aabb) && callback.collide(a.id, b.id) {
                    return;
                }
            }
        }
    }

    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool {
        self.state.assert_queryable(self.name());
        // Verify the shortest of the three per-axis candidate lists.
        let mut best: Option<Vec<EntityId>> = None;
        for (axis, tree) in self.trees.iter().enumerate() {
            let mut hits = Vec::new();
            tree.query(query.aabb.min[axis], query.aabb.max[axis], &mut hits);
            if best.as_ref().map_or(true, |b| hits.len() < b.len()) {
                best = Some(hits);
            }
        }
        for id in best.unwrap_or_default() {
            if id == query.id {
                continue;
            }
            let proxy = self.proxy(id);
            if proxy.aabb.overlaps(&query.aabb) && callback.collide(query.id, id) {
                return true;
            }
        }
        false
    }

    fn distance(&self, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let mut candidates = Vec::new();
        for a in self.registry.as_slice() {
            self.candidates(&a.aabb, callback.min_distance(), &mut candidates);
            for &id in &candidates {
                if id <= a.id {
                    continue;
                }
                let b = self.proxy(id);
                if a.aabb.distance(&b.aabb) <= callback.min_distance() {
                    callback.distance(a.id, b.id);
                }
            }
        }
    }

    fn distance_proxy(&self, query: &Proxy, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let mut candidates = Vec::new();
        self.candidates(&query.aabb, callback.min_distance(), &mut candidates);
        for id in candidates {
            if id == query.id {
                continue;
            }
            if query.aabb.distance(&self.proxy(id).aabb) <= callback.min_distance() {
                callback.distance(query.id, id);
            }
        }
    }
}
