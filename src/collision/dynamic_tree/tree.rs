use super::store::{Node, NodeStore};
use crate::core::{Aabb, Proxy};

/// Self-balancing AABB hierarchy over the nodes of a [`NodeStore`].
///
/// Leaves store a box fattened by `margin` around the object's exact box, so
/// an object that moves less than the margin is updated without touching the
/// structure. Internal boxes are the exact union of their children. Heights
/// are kept on every node and rotations restore balance on the way up after
/// each insertion and removal.
#[derive(Debug)]
pub struct DynamicTree<S: NodeStore> {
    store: S,
    root: Option<S::Handle>,
    margin: f32,
    leaf_count: usize,
}

impl<S: NodeStore> DynamicTree<S> {
    pub fn new(margin: f32) -> Self {
        Self {
            store: S::default(),
            root: None,
            margin,
            leaf_count: 0,
        }
    }

    pub fn root(&self) -> Option<S::Handle> {
        self.root
    }

    pub fn node(&self, handle: S::Handle) -> &Node<S::Handle> {
        self.store.get(handle)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn height(&self) -> u32 {
        self.root.map_or(0, |root| self.node(root).height)
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.root = None;
        self.leaf_count = 0;
    }

    /// Adds a leaf for `proxy` and returns its handle.
    pub fn insert(&mut self, proxy: Proxy) -> S::Handle {
        let leaf = self.alloc_leaf(proxy);
        self.insert_leaf(leaf);
        leaf
    }

    /// Builds leaves for `proxies`. An empty tree is built top-down: `levels`
    /// levels of median splits along the longest axis, then each remaining
    /// partition is built by incremental insertion. A non-empty tree receives
    /// the proxies one by one. Handles are returned in input order.
    pub fn build(&mut self, proxies: &[Proxy], levels: usize) -> Vec<S::Handle> {
        let leaves: Vec<_> = proxies.iter().map(|&p| self.alloc_leaf(p)).collect();
        if self.root.is_none() {
            self.root = self.build_top_down(leaves.clone(), levels);
        } else {
            for &leaf in &leaves {
                self.insert_leaf(leaf);
            }
        }
        leaves
    }

    /// Removes a leaf and returns the proxy it held.
    pub fn remove(&mut self, leaf: S::Handle) -> Option<Proxy> {
        self.detach(leaf);
        let node = self.store.free(leaf)?;
        self.leaf_count -= 1;
        node.proxy
    }

    /// Records a new exact box for a leaf. The leaf is only reinserted when
    /// the box escapes its fattened volume; returns whether that happened.
    pub fn update(&mut self, leaf: S::Handle, aabb: Aabb) -> bool {
        let node = self.store.get_mut(leaf);
        if let Some(proxy) = node.proxy.as_mut() {
            proxy.aabb = aabb;
        }
        if node.aabb.contains(&aabb) {
            return false;
        }
        self.detach(leaf);
        self.store.get_mut(leaf).aabb = aabb.expanded(self.margin);
        self.insert_leaf(leaf);
        true
    }

    /// Checks parent links, heights, leaf count and that every node's box
    /// contains its children's boxes (and every leaf's box its exact box).
    ///
    /// # Panics
    /// On the first violated invariant.
    pub fn validate(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.leaf_count, 0, "empty tree reports leaves");
            assert!(self.store.is_empty(), "empty tree holds nodes");
            return;
        };
        assert!(self.node(root).parent.is_none(), "root has a parent");
        let mut leaves = 0;
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let node = self.node(handle);
            match node.children {
                Some(children) => {
                    for child in children {
                        let child_node = self.node(child);
                        assert_eq!(child_node.parent, Some(handle), "broken parent link");
                        assert!(
                            node.aabb.contains(&child_node.aabb),
                            "node box does not contain its child"
                        );
                        stack.push(child);
                    }
                    let expected = 1 + self
                        .node(children[0])
                        .height
                        .max(self.node(children[1]).height);
                    assert_eq!(node.height, expected, "stale height");
                }
                None => {
                    leaves += 1;
                    assert_eq!(node.height, 0, "leaf with non-zero height");
                    let Some(proxy) = node.proxy else {
                        panic!("leaf without proxy");
                    };
                    assert!(
                        node.aabb.contains(&proxy.aabb),
                        "leaf box does not contain the object box"
                    );
                }
            }
        }
        assert_eq!(leaves, self.leaf_count, "leaf count mismatch");
        assert_eq!(self.store.len(), 2 * leaves - 1, "unreachable nodes");
    }

    fn node_mut(&mut self, handle: S::Handle) -> &mut Node<S::Handle> {
        self.store.get_mut(handle)
    }

    fn alloc_leaf(&mut self, proxy: Proxy) -> S::Handle {
        self.leaf_count += 1;
        let fat = proxy.aabb.expanded(self.margin);
        self.store.alloc(Node::leaf(proxy, fat))
    }

    fn join(&mut self, left: S::Handle, right: S::Handle) -> S::Handle {
        let (l, r) = (self.node(left), self.node(right));
        let aabb = l.aabb.merge(&r.aabb);
        let height = 1 + l.height.max(r.height);
        let parent = self.store.alloc(Node {
            aabb,
            parent: None,
            children: Some([left, right]),
            height,
            proxy: None,
        });
        self.node_mut(left).parent = Some(parent);
        self.node_mut(right).parent = Some(parent);
        parent
    }

    fn build_top_down(&mut self, mut leaves: Vec<S::Handle>, levels: usize) -> Option<S::Handle> {
        if leaves.len() <= 1 {
            return leaves.pop();
        }
        if levels == 0 {
            // Build this partition as a detached subtree.
            let outer = self.root.take();
            for leaf in leaves {
                self.insert_leaf(leaf);
            }
            return std::mem::replace(&mut self.root, outer);
        }
        let bound = leaves
            .iter()
            .fold(Aabb::empty(), |b, &leaf| b.merge(&self.node(leaf).aabb));
        let size = bound.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };
        let mid = leaves.len() / 2;
        let store = &self.store;
        leaves.select_nth_unstable_by(mid, |&a, &b| {
            let ca = store.get(a).aabb.center()[axis];
            let cb = store.get(b).aabb.center()[axis];
            ca.total_cmp(&cb)
        });
        let upper = leaves.split_off(mid);
        let left = self.build_top_down(leaves, levels - 1);
        let right = self.build_top_down(upper, levels - 1);
        match (left, right) {
            (Some(l), Some(r)) => Some(self.join(l, r)),
            (one, None) | (None, one) => one,
        }
    }

    fn insert_leaf(&mut self, leaf: S::Handle) {
        let Some(root) = self.root else {
            self.node_mut(leaf).parent = None;
            self.root = Some(leaf);
            return;
        };

        // Descend towards the child whose center is closest in L1 distance.
        let center = self.node(leaf).aabb.center();
        let mut sibling = root;
        while let Some([a, b]) = self.node(sibling).children {
            let da = (self.node(a).aabb.center() - center).abs().element_sum();
            let db = (self.node(b).aabb.center() - center).abs().element_sum();
            sibling = if da <= db { a } else { b };
        }

        let old_parent = self.node(sibling).parent;
        let parent = self.join(sibling, leaf);
        self.node_mut(parent).parent = old_parent;
        match old_parent {
            Some(p) => self.replace_child(p, sibling, parent),
            None => self.root = Some(parent),
        }
        self.refit(Some(parent));
    }

    /// Unlinks a leaf from the structure without freeing it. Its parent is
    /// freed and the sibling takes the parent's place.
    fn detach(&mut self, leaf: S::Handle) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let Some(parent) = self.node(leaf).parent else {
            return;
        };
        let Some([a, b]) = self.node(parent).children else {
            return;
        };
        let sibling = if a == leaf { b } else { a };
        let grandparent = self.node(parent).parent;
        self.store.free(parent);
        self.node_mut(sibling).parent = grandparent;
        self.node_mut(leaf).parent = None;
        match grandparent {
            Some(g) => {
                self.replace_child(g, parent, sibling);
                self.refit(Some(g));
            }
            None => self.root = Some(sibling),
        }
    }

    fn replace_child(&mut self, parent: S::Handle, old: S::Handle, new: S::Handle) {
        if let Some(children) = self.node_mut(parent).children.as_mut() {
            for child in children.iter_mut().filter(|c| **c == old) {
                *child = new;
            }
        }
    }

    /// Rebalances and refreshes boxes and heights from `start` up to the root.
    fn refit(&mut self, start: Option<S::Handle>) {
        let mut current = start;
        while let Some(handle) = current {
            let handle = self.balance(handle);
            if let Some([a, b]) = self.node(handle).children {
                let aabb = self.node(a).aabb.merge(&self.node(b).aabb);
                let height = 1 + self.node(a).height.max(self.node(b).height);
                let node = self.node_mut(handle);
                node.aabb = aabb;
                node.height = height;
            }
            current = self.node(handle).parent;
        }
    }

    /// Rotates the taller grandchild up when the children of `a` differ in
    /// height by more than one. Returns the node now at `a`'s position.
    fn balance(&mut self, a: S::Handle) -> S::Handle {
        let node = self.node(a);
        let Some([b, c]) = node.children else {
            return a;
        };
        if node.height < 2 {
            return a;
        }
        let skew = self.node(c).height as i64 - self.node(b).height as i64;
        if skew > 1 {
            self.rotate(a, 1)
        } else if skew < -1 {
            self.rotate(a, 0)
        } else {
            a
        }
    }

    /// Promotes child `side` of `a` into `a`'s place. The promoted node keeps
    /// its taller child and hands the shorter one down to `a`.
    fn rotate(&mut self, a: S::Handle, side: usize) -> S::Handle {
        let Some(mut a_children) = self.node(a).children else {
            return a;
        };
        let promoted = a_children[side];
        let kept = a_children[1 - side];
        let Some([f, g]) = self.node(promoted).children else {
            return a;
        };
        let (tall, short) = if self.node(f).height > self.node(g).height {
            (f, g)
        } else {
            (g, f)
        };

        let grandparent = self.node(a).parent;
        self.node_mut(promoted).parent = grandparent;
        self.node_mut(a).parent = Some(promoted);
        match grandparent {
            Some(p) => self.replace_child(p, a, promoted),
            None => self.root = Some(promoted),
        }

        a_children[side] = short;
        self.node_mut(a).children = Some(a_children);
        self.node_mut(short).parent = Some(a);
        self.node_mut(promoted).children = Some([a, tall]);

        let a_aabb = self.node(kept).aabb.merge(&self.node(short).aabb);
        let a_height = 1 + self.node(kept).height.max(self.node(short).height);
        let a_node = self.node_mut(a);
        a_node.aabb = a_aabb;
        a_node.height = a_height;

        let p_aabb = a_aabb.merge(&self.node(tall).aabb);
        let p_height = 1 + a_height.max(self.node(tall).height);
        let p_node = self.node_mut(promoted);
        p_node.aabb = p_aabb;
        p_node.height = p_height;
        promoted
    }
}
