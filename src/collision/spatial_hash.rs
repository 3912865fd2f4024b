//! Uniform-grid spatial hashing.
//!
//! Space inside the scene limit is cut into cubic cells of `cell_size`. Each
//! object is stored in every cell its AABB spans; queries visit the cells the
//! query box spans. A pair sharing several cells is only reported from the
//! first shared cell (the minimum corner of the two cell ranges' intersection),
//! so no per-query visitation set is needed.
//!
//! Query cost depends on the ratio of cell size to object size and density.
//! Cells much smaller than the objects make every object span many cells;
//! cells much larger than the objects put many objects in each bucket. The
//! manager reports an object spanning an unusual number of cells in the log
//! but never adjusts the cell size itself.

use std::collections::HashMap;
use std::fmt::Debug;

use glam::{IVec3, Vec3};

use super::{
    callback::{CollisionCallback, DistanceCallback},
    manager::{BroadPhaseManager, ManagerState},
    registry::ProxyRegistry,
};
use crate::{
    config::{BroadPhaseConfig, CELL_SPAN_WARNING},
    core::{Aabb, CollisionObject, Proxy},
    utils::{allocator::EntityId, logging::PassTimer},
};

pub type CellKey = IVec3;

/// Storage backend mapping cells to the registry slots they contain.
pub trait HashTable: Default + Debug {
    /// Empties the table and sizes it for about `expected_entries` entries.
    fn reset(&mut self, expected_entries: usize);

    fn insert(&mut self, key: CellKey, slot: usize);

    fn remove(&mut self, key: CellKey, slot: usize);

    fn bucket(&self, key: CellKey) -> impl Iterator<Item = usize> + '_;

    /// Number of non-empty buckets, for diagnostics.
    fn occupied(&self) -> usize;
}

/// `HashMap` keyed by cell. Only cells that hold objects use memory.
#[derive(Debug, Default, Clone)]
pub struct SparseHashTable {
    cells: HashMap<CellKey, Vec<usize>>,
}

impl HashTable for SparseHashTable {
    fn reset(&mut self, expected_entries: usize) {
        self.cells.clear();
        self.cells.reserve(expected_entries);
    }

    fn insert(&mut self, key: CellKey, slot: usize) {
        self.cells.entry(key).or_default().push(slot);
    }

    fn remove(&mut self, key: CellKey, slot: usize) {
        if let Some(slots) = self.cells.get_mut(&key) {
            if let Some(i) = slots.iter().position(|&s| s == slot) {
                slots.swap_remove(i);
            }
            if slots.is_empty() {
                self.cells.remove(&key);
            }
        }
    }

    fn bucket(&self, key: CellKey) -> impl Iterator<Item = usize> + '_ {
        self.cells.get(&key).into_iter().flatten().copied()
    }

    fn occupied(&self) -> usize {
        self.cells.len()
    }
}

const MIN_DENSE_BUCKETS: usize = 64;

/// Fixed vector of buckets addressed by a hash of the cell coordinates.
///
/// Distinct cells can share a bucket, so entries keep their cell key and
/// lookups filter on it. The bucket count is chosen at every reset.
#[derive(Debug, Default, Clone)]
pub struct DenseHashTable {
    buckets: Vec<Vec<(CellKey, usize)>>,
    mask: usize,
}

impl DenseHashTable {
    fn index(&self, key: CellKey) -> usize {
        let h = (key.x as u32).wrapping_mul(73_856_093)
            ^ (key.y as u32).wrapping_mul(19_349_663)
            ^ (key.z as u32).wrapping_mul(83_492_791);
        h as usize & self.mask
    }
}

impl HashTable for DenseHashTable {
    fn reset(&mut self, expected_entries: usize) {
        let count = (expected_entries * 2)
            .next_power_of_two()
            .max(MIN_DENSE_BUCKETS);
        self.buckets.clear();
        self.buckets.resize_with(count, Vec::new);
        self.mask = count - 1;
    }

    fn insert(&mut self, key: CellKey, slot: usize) {
        if self.buckets.is_empty() {
            self.reset(0);
        }
        let index = self.index(key);
        self.buckets[index].push((key, slot));
    }

    fn remove(&mut self, key: CellKey, slot: usize) {
        let index = self.index(key);
        if let Some(bucket) = self.buckets.get_mut(index) {
            if let Some(i) = bucket.iter().position(|&entry| entry == (key, slot)) {
                bucket.swap_remove(i);
            }
        }
    }

    fn bucket(&self, key: CellKey) -> impl Iterator<Item = usize> + '_ {
        self.buckets
            .get(self.index(key))
            .into_iter()
            .flatten()
            .filter(move |(k, _)| *k == key)
            .map(|&(_, slot)| slot)
    }

    fn occupied(&self) -> usize {
        self.buckets.iter().filter(|b| !b.is_empty()).count()
    }
}

/// Inclusive box of cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min: IVec3,
    max: IVec3,
}

impl CellRange {
    fn cells(self) -> impl Iterator<Item = CellKey> {
        let (min, max) = (self.min, self.max);
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y).flat_map(move |y| (min.z..=max.z).map(move |z| IVec3::new(x, y, z)))
        })
    }

    /// Number of cells covered, saturating for huge ranges.
    fn count(self) -> usize {
        let axis = |min: i32, max: i32| (i64::from(max) - i64::from(min) + 1).max(0) as usize;
        axis(self.min.x, self.max.x)
            .saturating_mul(axis(self.min.y, self.max.y))
            .saturating_mul(axis(self.min.z, self.max.z))
    }

    /// The one cell from which a pair spanning both ranges is reported.
    fn first_shared(self, other: CellRange) -> CellKey {
        self.min.max(other.min)
    }
}

/// Spatial hashing broad phase, generic over its table backend.
#[derive(Debug)]
pub struct SpatialHashManager<T: HashTable = SparseHashTable> {
    registry: ProxyRegistry,
    table: T,
    /// Cell range of each slot stored in the table; `None` for objects not
    /// fully inside the scene, which live in `outliers` instead.
    placement: Vec<Option<CellRange>>,
    outliers: Vec<usize>,
    cell_size: f32,
    scene_limit: Option<Aabb>,
    scene: Aabb,
    dims: IVec3,
    dirty: bool,
    state: ManagerState,
}

impl SpatialHashManager {
    /// Union of the objects' AABBs, the usual input for a fixed scene limit
    /// or for picking a cell size.
    pub fn compute_bound(objects: &[&CollisionObject]) -> Aabb {
        objects
            .iter()
            .fold(Aabb::empty(), |bound, object| bound.merge(object.aabb()))
    }
}

impl<T: HashTable> SpatialHashManager<T> {
    /// `scene_limit` fixes the hashed region; with `None` it is recomputed
    /// from the registered objects on every setup.
    pub fn new(cell_size: f32, scene_limit: Option<Aabb>) -> Self {
        assert!(
            cell_size > 0.0 && cell_size.is_finite(),
            "spatial hash cell size must be positive and finite, got {cell_size}"
        );
        Self {
            registry: ProxyRegistry::new(),
            table: T::default(),
            placement: Vec::new(),
            outliers: Vec::new(),
            cell_size,
            scene_limit,
            scene: Aabb::new(Vec3::ZERO, Vec3::ZERO),
            dims: IVec3::ONE,
            dirty: false,
            state: ManagerState::Empty,
        }
    }

    pub fn from_config(config: &BroadPhaseConfig) -> Self {
        Self::new(config.cell_size, config.scene_limit)
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Region covered by the grid since the last setup.
    pub fn scene(&self) -> Aabb {
        self.scene
    }

    /// Number of registered objects that are not fully inside the scene and
    /// are checked against every query exhaustively.
    pub fn outlier_count(&self) -> usize {
        self.outliers.len()
    }

    fn cell_of(&self, point: Vec3) -> IVec3 {
        ((point - self.scene.min) / self.cell_size)
            .floor()
            .as_ivec3()
            .clamp(IVec3::ZERO, self.dims - IVec3::ONE)
    }

    fn cell_range(&self, aabb: &Aabb) -> CellRange {
        CellRange {
            min: self.cell_of(aabb.min),
            max: self.cell_of(aabb.max),
        }
    }

    fn place(&mut self, slot: usize) {
        let proxy = *self.registry.get(slot);
        if !self.scene.contains(&proxy.aabb) {
            self.placement[slot] = None;
            self.outliers.push(slot);
            return;
        }
        let range = self.cell_range(&proxy.aabb);
        let span = range.count();
        if span > CELL_SPAN_WARNING {
            log::warn!(
                "spatial hash: object {:?} spans {span} cells; cell size {} is small for it",
                proxy.id,
                self.cell_size
            );
        }
        for cell in range.cells() {
            self.table.insert(cell, slot);
        }
        self.placement[slot] = Some(range);
    }

    fn displace(&mut self, slot: usize) {
        match self.placement[slot].take() {
            Some(range) => {
                for cell in range.cells() {
                    self.table.remove(cell, slot);
                }
            }
            None => self.outliers.retain(|&s| s != slot),
        }
    }

    fn rebuild(&mut self) {
        let _timer = PassTimer::new("spatial_hash", "rebuild", self.registry.len());
        self.scene = match self.scene_limit {
            Some(limit) => limit,
            None if self.registry.len() == 0 => Aabb::new(Vec3::ZERO, Vec3::ZERO),
            None => self
                .registry
                .as_slice()
                .iter()
                .fold(Aabb::empty(), |bound, proxy| bound.merge(&proxy.aabb)),
        };
        self.dims = (self.scene.size() / self.cell_size)
            .ceil()
            .as_ivec3()
            .max(IVec3::ONE);
        self.table.reset(self.registry.len());
        self.outliers.clear();
        self.placement = vec![None; self.registry.len()];
        for slot in 0..self.registry.len() {
            self.place(slot);
        }
        self.dirty = false;
        log::debug!(
            "spatial hash: {} objects, {} outside the scene, grid {} cells, {} buckets in use",
            self.registry.len(),
            self.outliers.len(),
            self.dims,
            self.table.occupied()
        );
    }

    /// Skip rule shared by the exhaustive outlier loops: each pair involving
    /// an outlier is visited once, from the outlier with the lower slot.
    fn skip_for_outlier(&self, outlier: usize, other: usize) -> bool {
        other == outlier || (self.placement[other].is_none() && other < outlier)
    }

    /// Grid part of a distance query. Candidates at or below `after` are
    /// skipped so that a self query reports each pair once.
    fn distance_grid(
        &self,
        query: &Proxy,
        after: Option<usize>,
        callback: &mut dyn DistanceCallback,
    ) {
        let mut radius = if callback.min_distance().is_finite() {
            callback.min_distance()
        } else {
            self.cell_size
        };
        let mut searched = f32::NEG_INFINITY;
        loop {
            let search = query.aabb.expanded(radius);
            let range = self.cell_range(&search);
            for cell in range.cells() {
                for slot in self.table.bucket(cell) {
                    if after.is_some_and(|a| slot <= a) {
                        continue;
                    }
                    let Some(placed) = self.placement[slot] else {
                        continue;
                    };
                    if range.first_shared(placed) != cell {
                        continue;
                    }
                    let other = self.registry.get(slot);
                    if other.id == query.id {
                        continue;
                    }
                    let bound = query.aabb.distance(&other.aabb);
                    // Candidates within the previous radius were already offered.
                    if bound <= searched {
                        continue;
                    }
                    if bound <= callback.min_distance() {
                        callback.distance(query.id, other.id);
                    }
                }
            }
            if callback.min_distance() <= radius || search.contains(&self.scene) {
                return;
            }
            searched = radius;
            radius = if callback.min_distance().is_finite() {
                callback.min_distance()
            } else {
                radius * 2.0
            };
        }
    }
}

impl<T: HashTable> BroadPhaseManager for SpatialHashManager<T> {
    fn name(&self) -> &'static str {
        "spatial_hash"
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
        self.registry.get_mut(slot).aabb = *object.aabb();
        if self.dirty {
            return;
        }
        self.displace(slot);
        self.place(slot);
    }

    fn clear(&mut self) {
        self.registry.clear();
        self.table.reset(0);
        self.placement.clear();
        self.outliers.clear();
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
        for (slot, a) in self.registry.as_slice().iter().enumerate() {
            match self.placement[slot] {
                Some(range) => {
                    for cell in range.cells() {
                        for other in self.table.bucket(cell) {
                            if other <= slot {
                                continue;
                            }
                            let Some(placed) = self.placement[other] else {
                                continue;
                            };
                            if range.first_shared(placed) != cell {
                                continue;
                            }
                            let b = self.registry.get(other);
                            if a.aabb.overlaps(&b.aabb) && callback.collide(a.id, b.id) {
                                return;
                            }
                        }
                    }
                }
                None => {
                    for (other, b) in self.registry.as_slice().iter().enumerate() {
                        if self.skip_for_outlier(slot, other) {
                            continue;
                        }
                        if a.aabb.overlaps(&b.aabb) && callback.collide(a.id, b.id) {
                            return;
                        }
                    }
                }
            }
        }
    }

    fn collide_proxy(&self, query: &Proxy, callback: &mut dyn CollisionCallback) -> bool {
        self.state.assert_queryable(self.name());
        let range = self.cell_range(&query.aabb);
        for cell in range.cells() {
            for slot in self.table.bucket(cell) {
                let Some(placed) = self.placement[slot] else {
                    continue;
                };
                if range.first_shared(placed) != cell {
                    continue;
                }
                let other = self.registry.get(slot);
                if other.id != query.id
                    && other.aabb.overlaps(&query.aabb)
                    && callback.collide(query.id, other.id)
                {
                    return true;
                }
            }
        }
        for &slot in &self.outliers {
            let other = self.registry.get(slot);
            if other.id != query.id
                && other.aabb.overlaps(&query.aabb)
                && callback.collide(query.id, other.id)
            {
                return true;
            }
        }
        false
    }

    fn distance(&self, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        for (slot, a) in self.registry.as_slice().iter().enumerate() {
            if self.placement[slot].is_some() {
                self.distance_grid(a, Some(slot), callback);
                continue;
            }
            for (other, b) in self.registry.as_slice().iter().enumerate() {
                if self.skip_for_outlier(slot, other) {
                    continue;
                }
                if a.aabb.distance(&b.aabb) <= callback.min_distance() {
                    callback.distance(a.id, b.id);
                }
            }
        }
    }

    fn distance_proxy(&self, query: &Proxy, callback: &mut dyn DistanceCallback) {
        self.state.assert_queryable(self.name());
        for &slot in &self.outliers {
            let other = self.registry.get(slot);
            if other.id != query.id && query.aabb.distance(&other.aabb) <= callback.min_distance() {
                callback.distance(query.id, other.id);
            }
        }
        if !self.registry.as_slice().is_empty() {
            self.distance_grid(query, None, callback);
        }
    }
}
