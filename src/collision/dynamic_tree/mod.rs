//! Dynamic AABB tree broad phase in two storage flavours.
//!
//! [`DynamicTreeManager`] keeps its nodes in a generational arena;
//! [`DynamicTreeArrayManager`] keeps them in a flat pool addressed by `u32`
//! indices. Both run the same balancing and traversal code and answer every
//! query identically.

pub mod store;
pub mod tree;

pub use store::{ArenaStore, Node, NodeId, NodeStore, PoolIndex, PoolStore};
pub use tree::DynamicTree;

use super::{
    callback::{CollisionCallback, DistanceCallback},
    manager::{BroadPhaseManager, ManagerState},
    registry::ProxyRegistry,
};
use crate::{
    config::BroadPhaseConfig,
    core::{CollisionObject, Proxy},
    utils::{allocator::EntityId, logging::PassTimer},
};

pub type DynamicTreeManager = DynamicAabbTreeManager<ArenaStore>;
pub type DynamicTreeArrayManager = DynamicAabbTreeManager<PoolStore>;

/// Work item of the paired self traversal.
enum Task<H> {
    /// Pairs inside one subtree.
    Single(H),
    /// Pairs with one leaf under each node.
    Pair(H, H),
}

/// Broad phase over a [`DynamicTree`].
///
/// Registration is deferred: new objects get their leaves at the next setup.
/// When the tree is empty at that point the whole batch is bulk-built with
/// `tree_init_level` median-split levels, otherwise the new objects are
/// inserted one by one.
#[derive(Debug)]
pub struct DynamicAabbTreeManager<S: NodeStore> {
    registry: ProxyRegistry,
    /// Leaf of each registry slot, `None` until the next setup.
    leaves: Vec<Option<S::Handle>>,
    tree: DynamicTree<S>,
    tree_init_level: usize,
    state: ManagerState,
}

impl<S: NodeStore> DynamicAabbTreeManager<S> {
    pub fn new(tree_init_level: usize, fat_margin: f32) -> Self {
        Self {
            registry: ProxyRegistry::new(),
            leaves: Vec::new(),
            tree: DynamicTree::new(fat_margin),
            tree_init_level,
            state: ManagerState::Empty,
        }
    }

    pub fn from_config(config: &BroadPhaseConfig) -> Self {
        Self::new(config.tree_init_level, config.fat_margin)
    }

    pub fn tree(&self) -> &DynamicTree<S> {
        &self.tree
    }

    pub fn tree_init_level(&self) -> usize {
        self.tree_init_level
    }

    /// Checks the tree invariants and that every leaf holds the current box
    /// of its object.
    ///
    /// # Panics
    /// On the first violated invariant.
    pub fn validate(&self) {
        self.tree.validate();
        for (slot, leaf) in self.leaves.iter().enumerate() {
            if let Some(leaf) = *leaf {
                assert_eq!(
                    self.tree.node(leaf).proxy.as_ref(),
                    Some(self.registry.get(slot)),
                    "leaf out of sync with its object"
                );
            }
        }
    }

    fn descend(
        &self,
        stack: &mut Vec<Task<S::Handle>>,
        a: S::Handle,
        b: S::Handle,
    ) {
        let (na, nb) = (self.tree.node(a), self.tree.node(b));
        match (na.children, nb.children) {
            (Some([a0, a1]), None) => {
                stack.push(Task::Pair(a0, b));
                stack.push(Task::Pair(a1, b));
            }
            (None, Some([b0, b1])) => {
                stack.push(Task::Pair(a, b0));
                stack.push(Task::Pair(a, b1));
            }
            (Some([a0, a1]), Some([b0, b1])) => {
                if na.aabb.volume() >= nb.aabb.volume() {
                    stack.push(Task::Pair(a0, b));
                    stack.push(Task::Pair(a1, b));
                } else {
                    stack.push(Task::Pair(a, b0));
                    stack.push(Task::Pair(a, b1));
                }
            }
            (None, None) => {}
        }
    }

    /// Like [`Self::descend`], but pushes the closer of the two new pairs
    /// last so it is examined first.
    fn descend_nearest_first(
        &self,
        stack: &mut Vec<Task<S::Handle>>,
        a: S::Handle,
        b: S::Handle,
    ) {
        let start = stack.len();
        self.descend(stack, a, b);
        if stack.len() - start == 2 {
            let gap = |task: &Task<S::Handle>| match *task {
                Task::Pair(x, y) => self.tree.node(x).aabb.distance(&self.tree.node(y).aabb),
                Task::Single(_) => 0.0,
            };
            if gap(&stack[start + 1]) > gap(&stack[start]) {
                stack.swap(start, start + 1);
            }
        }
    }
}

impl<S: NodeStore> BroadPhaseManager for DynamicAabbTreeManager<S> {
    fn name(&self) -> &'static str {
        S::MANAGER_NAME
    }

    fn state(&self) -> ManagerState {
        self.state
    }

    fn register_object(&mut self, object: &CollisionObject) {
        self.registry.insert(object.proxy(), self.name());
        self.leaves.push(None);
        self.state = ManagerState::Populated;
    }

    fn unregister_object(&mut self, id: EntityId) {
        let removal = self.registry.remove(id, self.name());
        if let Some(leaf) = self.leaves.swap_remove(removal.slot) {
            self.tree.remove(leaf);
        }
        self.state = ManagerState::Populated;
    }

    fn setup(&mut self) {
        let pending: Vec<usize> = (0..self.leaves.len())
            .filter(|&slot| self.leaves[slot].is_none())
            .collect();
        if !pending.is_empty() {
            let _timer = PassTimer::new(S::MANAGER_NAME, "build", pending.len());
            let proxies: Vec<Proxy> = pending.iter().map(|&s| *self.registry.get(s)).collect();
            let handles = self.tree.build(&proxies, self.tree_init_level);
            for (slot, handle) in pending.iter().zip(handles) {
                self.leaves[*slot] = Some(handle);
            }
            log::debug!(
                "{}: {} objects ({} new), height {}",
                self.name(),
                self.registry.len(),
                pending.len(),
                self.tree.height()
            );
        }
        self.state = ManagerState::after_setup(self.registry.len());
    }

    fn update_object(&mut self, object: &CollisionObject) {
        let slot = self.registry.expect_slot(object.id, self.name());
        let aabb = *object.aabb();
        self.registry.get_mut(slot).aabb = aabb;
        if let Some(leaf) = self.leaves[slot] {
            self.tree.update(leaf, aabb);
        }
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.leaves.clear();
        self.tree.clear();
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
        let Some(root) = self.tree.root() else {
            return;
        };
        let mut stack = vec![Task::Single(root)];
        while let Some(task) = stack.pop() {
            match task {
                Task::Single(n) => {
                    if let Some([a, b]) = self.tree.node(n).children {
                        stack.push(Task::Single(a));
                        stack.push(Task::Single(b));
                        stack.push(Task::Pair(a, b));
                    }
                }
                Task::Pair(a, b) => {
                    let (na, nb) = (self.tree.node(a), self.tree.node(b));
                    if !na.aabb.overlaps(&nb.aabb) {
                        continue;
                    }
                    if let (Some(pa), Some(pb)) = (na.proxy, nb.proxy) {
                        if pa.aabb.overlaps(&pb.aabb) && callback.collide(pa.id, pb.id) {
                            return;
                        }
                        continue;
                    }
                    self.descend(&mut stack, a, b);
                }
            }
        }
    }

    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool {
        self.state.assert_queryable(self.name());
        let mut stack: Vec<S::Handle> = self.tree.root().into_iter().collect();
        while let Some(handle) = stack.pop() {
            let node = self.tree.node(handle);
            if !node.aabb.overlaps(&query.aabb) {
                continue;
            }
            match (node.children, node.proxy) {
                (Some([a, b]), _) => {
                    stack.push(a);
                    stack.push(b);
                }
                (None, Some(proxy)) => {
                    if proxy.id != query.id
                        && proxy.aabb.overlaps(&query.aabb)
                        && callback.collide(query.id, proxy.id)
                    {
                        return true;
                    }
                }
                (None, None) => {}
            }
        }
        false
    }

    fn distance(&self, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let Some(root) = self.tree.root() else {
            return;
        };
        let mut stack = vec![Task::Single(root)];
        while let Some(task) = stack.pop() {
            match task {
                Task::Single(n) => {
                    if let Some([a, b]) = self.tree.node(n).children {
                        stack.push(Task::Single(a));
                        stack.push(Task::Single(b));
                        stack.push(Task::Pair(a, b));
                    }
                }
                Task::Pair(a, b) => {
                    let (na, nb) = (self.tree.node(a), self.tree.node(b));
                    if na.aabb.distance(&nb.aabb) > callback.min_distance() {
                        continue;
                    }
                    if let (Some(pa), Some(pb)) = (na.proxy, nb.proxy) {
                        if pa.aabb.distance(&pb.aabb) <= callback.min_distance() {
                            callback.distance(pa.id, pb.id);
                        }
                        continue;
                    }
                    self.descend_nearest_first(&mut stack, a, b);
                }
            }
        }
    }

    fn distance_proxy(&self, query: &Proxy, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        let mut stack: Vec<(S::Handle, f32)> = self
            .tree
            .root()
            .map(|root| (root, self.tree.node(root).aabb.distance(&query.aabb)))
            .into_iter()
            .collect();
        while let Some((handle, bound)) = stack.pop() {
            if bound > callback.min_distance() {
                continue;
            }
            let node = self.tree.node(handle);
            match (node.children, node.proxy) {
                (Some([a, b]), _) => {
                    let da = self.tree.node(a).aabb.distance(&query.aabb);
                    let db = self.tree.node(b).aabb.distance(&query.aabb);
                    if da <= db {
                        stack.push((b, db));
                        stack.push((a, da));
                    } else {
                        stack.push((a, da));
                        stack.push((b, db));
                    }
                }
                (None, Some(proxy)) => {
                    if proxy.id != query.id
                        && proxy.aabb.distance(&query.aabb) <= callback.min_distance()
                    {
                        callback.distance(query.id, proxy.id);
                    }
                }
                (None, None) => {}
            }
        }
    }
}
