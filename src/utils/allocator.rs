use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::marker::PhantomData;

/// Unique identifier with generation tracking to prevent stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Key types handed out by an [`Arena`].
pub trait ArenaKey: Copy {
    fn from_raw(raw: GenerationalId) -> Self;
    fn raw(self) -> GenerationalId;
}

impl ArenaKey for GenerationalId {
    fn from_raw(raw: GenerationalId) -> Self {
        raw
    }

    fn raw(self) -> GenerationalId {
        self
    }
}

/// Identifier of a caller-owned collision object.
///
/// Managers refer to registered objects through this id only; they never own
/// or borrow the object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId(pub GenerationalId);

impl EntityId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self(GenerationalId::new(index, generation))
    }

    pub fn from_index(index: u32) -> Self {
        Self::new(index as usize, 0)
    }

    pub fn index(&self) -> usize {
        self.0.index
    }

    pub fn generation(&self) -> u32 {
        self.0.generation
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self(GenerationalId::new(usize::MAX, 0))
    }
}

impl ArenaKey for EntityId {
    fn from_raw(raw: GenerationalId) -> Self {
        Self(raw)
    }

    fn raw(self) -> GenerationalId {
        self.0
    }
}

/// Generational arena that hands out stable IDs while preventing use-after-free.
pub struct Arena<T, K: ArenaKey = EntityId> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    len: usize,
    _key: PhantomData<K>,
}

impl<T, K: ArenaKey> Default for Arena<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug, K: ArenaKey> std::fmt::Debug for Arena<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("capacity", &self.items.len())
            .finish()
    }
}

impl<T, K: ArenaKey> Arena<T, K> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    pub fn insert(&mut self, item: T) -> K {
        self.insert_with(|_| item)
    }

    /// Inserts the value produced by `build`, which receives the key the value
    /// will be stored under. Useful for items that record their own id.
    pub fn insert_with(&mut self, build: impl FnOnce(K) -> T) -> K {
        self.len += 1;
        if let Some(index) = self.free_list.pop_front() {
            let key = K::from_raw(GenerationalId::new(index, self.generations[index]));
            self.items[index] = Some(build(key));
            return key;
        }

        let index = self.items.len();
        let key = K::from_raw(GenerationalId::new(index, 0));
        self.items.push(Some(build(key)));
        self.generations.push(0);
        key
    }

    pub fn get(&self, id: K) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.raw().index).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: K) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.raw().index).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn remove(&mut self, id: K) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let index = id.raw().index;
        let taken = self.items.get_mut(index).and_then(|slot| slot.take());
        if taken.is_some() {
            self.generations[index] = self.generations[index].wrapping_add(1);
            self.free_list.push_back(index);
            self.len -= 1;
        }
        taken
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.items.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.generations[index] = self.generations[index].wrapping_add(1);
                self.free_list.push_back(index);
            }
        }
        self.len = 0;
    }

    pub fn iter(&self) -> ArenaIter<'_, T> {
        ArenaIter {
            inner: self.items.iter(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = K> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|_| K::from_raw(GenerationalId::new(index, self.generations[index])))
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, id: K) -> bool {
        self.get(id).is_some()
    }

    fn is_valid(&self, id: K) -> bool {
        let raw = id.raw();
        self.generations
            .get(raw.index)
            .copied()
            .map(|gen| gen == raw.generation)
            .unwrap_or(false)
    }
}

pub struct ArenaIter<'a, T> {
    inner: std::slice::Iter<'a, Option<T>>,
}

impl<'a, T> Iterator for ArenaIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.inner.by_ref() {
            if let Some(item) = slot.as_ref() {
                return Some(item);
            }
        }
        None
    }
}
