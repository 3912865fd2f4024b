//! Node storage for the dynamic tree.
//!
//! The tree links nodes through handles only, so the same balancing code runs
//! on a generational arena (checked handles) and on a flat pool of `u32`
//! indices with an intrusive free list.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::{
    core::{Aabb, Proxy},
    utils::allocator::{Arena, ArenaKey, GenerationalId},
};

/// A tree node. Leaves carry the proxy they index and have no children;
/// internal nodes carry exactly two children and no proxy.
#[derive(Debug, Clone)]
pub struct Node<H> {
    /// Fattened box for leaves, union of the children for internal nodes.
    pub aabb: Aabb,
    pub parent: Option<H>,
    pub children: Option<[H; 2]>,
    /// Zero for leaves.
    pub height: u32,
    pub proxy: Option<Proxy>,
}

impl<H> Node<H> {
    pub fn leaf(proxy: Proxy, fat: Aabb) -> Self {
        Self {
            aabb: fat,
            parent: None,
            children: None,
            height: 0,
            proxy: Some(proxy),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

pub trait NodeStore: Default + Debug {
    type Handle: Copy + Eq + Hash + Debug;

    /// Label of the manager built on this store.
    const MANAGER_NAME: &'static str;

    fn alloc(&mut self, node: Node<Self::Handle>) -> Self::Handle;

    /// Releases a node. Returns `None` when the handle was already free.
    fn free(&mut self, handle: Self::Handle) -> Option<Node<Self::Handle>>;

    /// # Panics
    /// If `handle` does not refer to a live node.
    fn get(&self, handle: Self::Handle) -> &Node<Self::Handle>;

    /// # Panics
    /// If `handle` does not refer to a live node.
    fn get_mut(&mut self, handle: Self::Handle) -> &mut Node<Self::Handle>;

    fn clear(&mut self);

    /// Number of live nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle into an [`ArenaStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub GenerationalId);

impl ArenaKey for NodeId {
    fn from_raw(raw: GenerationalId) -> Self {
        Self(raw)
    }

    fn raw(self) -> GenerationalId {
        self.0
    }
}

/// Nodes in a generational arena. A handle to a freed node is detected on
/// access instead of aliasing whatever reuses the slot.
#[derive(Debug, Default)]
pub struct ArenaStore {
    nodes: Arena<Node<NodeId>, NodeId>,
}

impl NodeStore for ArenaStore {
    type Handle = NodeId;

    const MANAGER_NAME: &'static str = "dynamic_aabb_tree";

    fn alloc(&mut self, node: Node<NodeId>) -> NodeId {
        self.nodes.insert(node)
    }

    fn free(&mut self, handle: NodeId) -> Option<Node<NodeId>> {
        self.nodes.remove(handle)
    }

    fn get(&self, handle: NodeId) -> &Node<NodeId> {
        match self.nodes.get(handle) {
            Some(node) => node,
            None => panic!("stale dynamic tree node {handle:?}"),
        }
    }

    fn get_mut(&mut self, handle: NodeId) -> &mut Node<NodeId> {
        match self.nodes.get_mut(handle) {
            Some(node) => node,
            None => panic!("stale dynamic tree node {handle:?}"),
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Index into a [`PoolStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolIndex(pub u32);

#[derive(Debug, Clone)]
enum PoolEntry {
    Occupied(Node<PoolIndex>),
    Vacant { next: Option<u32> },
}

/// Nodes in one contiguous vector. Freed entries form a singly linked free
/// list threaded through the vacant slots and are reused before the vector
/// grows.
#[derive(Debug, Default)]
pub struct PoolStore {
    entries: Vec<PoolEntry>,
    free_head: Option<u32>,
    len: usize,
}

impl PoolStore {
    /// Number of entries ever allocated, live or vacant.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}

impl NodeStore for PoolStore {
    type Handle = PoolIndex;

    const MANAGER_NAME: &'static str = "dynamic_aabb_tree_array";

    fn alloc(&mut self, node: Node<PoolIndex>) -> PoolIndex {
        self.len += 1;
        if let Some(index) = self.free_head {
            if let PoolEntry::Vacant { next } = self.entries[index as usize] {
                self.free_head = next;
            }
            self.entries[index as usize] = PoolEntry::Occupied(node);
            return PoolIndex(index);
        }
        assert!(
            self.entries.len() < u32::MAX as usize,
            "dynamic tree node pool exhausted"
        );
        self.entries.push(PoolEntry::Occupied(node));
        PoolIndex((self.entries.len() - 1) as u32)
    }

    fn free(&mut self, handle: PoolIndex) -> Option<Node<PoolIndex>> {
        let slot = self.entries.get_mut(handle.0 as usize)?;
        let vacant = PoolEntry::Vacant {
            next: self.free_head,
        };
        match std::mem::replace(slot, vacant) {
            PoolEntry::Occupied(node) => {
                self.free_head = Some(handle.0);
                self.len -= 1;
                Some(node)
            }
            previous => {
                *slot = previous;
                None
            }
        }
    }

    fn get(&self, handle: PoolIndex) -> &Node<PoolIndex> {
        match self.entries.get(handle.0 as usize) {
            Some(PoolEntry::Occupied(node)) => node,
            _ => panic!("vacant dynamic tree node {handle:?}"),
        }
    }

    fn get_mut(&mut self, handle: PoolIndex) -> &mut Node<PoolIndex> {
        match self.entries.get_mut(handle.0 as usize) {
            Some(PoolEntry::Occupied(node)) => node,
            _ => panic!("vacant dynamic tree node {handle:?}"),
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.free_head = None;
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::utils::allocator::EntityId;

    fn leaf<H>(i: u32) -> Node<H> {
        let aabb = Aabb::from_center_half_extents(Vec3::splat(i as f32), Vec3::splat(0.5));
        Node::leaf(Proxy::new(EntityId::from_index(i), aabb), aabb)
    }

    #[test]
    fn pool_reuses_freed_entries() {
        let mut pool = PoolStore::default();
        let a = pool.alloc(leaf(0));
        let b = pool.alloc(leaf(1));
        let c = pool.alloc(leaf(2));
        assert!(pool.free(b).is_some());
        assert!(pool.free(b).is_none());
        assert!(pool.free(a).is_some());

        // Last freed is handed out first.
        assert_eq!(pool.alloc(leaf(3)), a);
        assert_eq!(pool.alloc(leaf(4)), b);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get(c).proxy.map(|p| p.id), Some(EntityId::from_index(2)));
    }

    #[test]
    #[should_panic(expected = "stale dynamic tree node")]
    fn arena_detects_stale_handles() {
        let mut arena = ArenaStore::default();
        let a = arena.alloc(leaf(0));
        arena.free(a);
        arena.alloc(leaf(1));
        arena.get(a);
    }
}
