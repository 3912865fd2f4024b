//! Caller-supplied handlers invoked by managers for every candidate pair.
//!
//! Managers only prune with bounding boxes. Whatever exact test the caller
//! wants (the narrow phase) runs inside these callbacks, which also own the
//! query result: the confirmed pairs for overlap queries and the running
//! minimum for distance queries.

use crate::utils::allocator::EntityId;

/// Handler for overlap queries.
///
/// Invoked once per candidate pair whose AABBs overlap. Returning `true`
/// stops the traversal; this is the only cancellation mechanism a query has.
/// For single-object queries the query object's id is always passed first.
pub trait CollisionCallback {
    fn collide(&mut self, a: EntityId, b: EntityId) -> bool;
}

impl<F> CollisionCallback for F
where
    F: FnMut(EntityId, EntityId) -> bool,
{
    fn collide(&mut self, a: EntityId, b: EntityId) -> bool {
        self(a, b)
    }
}

/// Handler for distance queries.
///
/// Managers call [`DistanceCallback::distance`] for candidates and read
/// [`DistanceCallback::min_distance`] to skip every candidate whose AABB lower
/// bound already exceeds the running minimum.
pub trait DistanceCallback {
    fn distance(&mut self, a: EntityId, b: EntityId);

    fn min_distance(&self) -> f32;
}

/// Collects pairs confirmed by a narrow-phase predicate.
pub struct CollisionPairs<N> {
    narrow_phase: N,
    max_pairs: Option<usize>,
    pub pairs: Vec<(EntityId, EntityId)>,
}

impl<N> CollisionPairs<N>
where
    N: FnMut(EntityId, EntityId) -> bool,
{
    pub fn new(narrow_phase: N) -> Self {
        Self {
            narrow_phase,
            max_pairs: None,
            pairs: Vec::new(),
        }
    }

    /// Stops the traversal as soon as `max_pairs` pairs are confirmed. A limit
    /// of one turns the query into an existence check.
    pub fn with_max_pairs(mut self, max_pairs: usize) -> Self {
        self.max_pairs = Some(max_pairs);
        self
    }

    pub fn is_colliding(&self) -> bool {
        !self.pairs.is_empty()
    }

    /// Confirmed pairs with each pair ordered by id and the list sorted, so
    /// results from different strategies can be compared directly.
    pub fn sorted_pairs(&self) -> Vec<(EntityId, EntityId)> {
        let mut pairs: Vec<_> = self
            .pairs
            .iter()
            .map(|&(a, b)| if a <= b { (a, b) } else { (b, a) })
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }
}

impl<N> CollisionCallback for CollisionPairs<N>
where
    N: FnMut(EntityId, EntityId) -> bool,
{
    fn collide(&mut self, a: EntityId, b: EntityId) -> bool {
        if (self.narrow_phase)(a, b) {
            self.pairs.push((a, b));
        }
        self.max_pairs
            .map(|limit| self.pairs.len() >= limit)
            .unwrap_or(false)
    }
}

/// Keeps the smallest distance reported by a narrow-phase distance function.
pub struct MinDistance<N> {
    narrow_phase: N,
    min_distance: f32,
    closest: Option<(EntityId, EntityId)>,
    pub evaluations: usize,
}

impl<N> MinDistance<N>
where
    N: FnMut(EntityId, EntityId) -> f32,
{
    pub fn new(narrow_phase: N) -> Self {
        Self {
            narrow_phase,
            min_distance: f32::INFINITY,
            closest: None,
            evaluations: 0,
        }
    }

    /// The pair that produced the current minimum.
    pub fn closest_pair(&self) -> Option<(EntityId, EntityId)> {
        self.closest
    }

    pub fn reset(&mut self) {
        self.min_distance = f32::INFINITY;
        self.closest = None;
        self.evaluations = 0;
    }
}

impl<N> DistanceCallback for MinDistance<N>
where
    N: FnMut(EntityId, EntityId) -> f32,
{
    fn distance(&mut self, a: EntityId, b: EntityId) {
        self.evaluations += 1;
        let d = (self.narrow_phase)(a, b);
        if d < self.min_distance {
            self.min_distance = d;
            self.closest = Some((a, b));
        }
    }

    fn min_distance(&self) -> f32 {
        self.min_distance
    }
}
