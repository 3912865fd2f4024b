use std::collections::HashMap;

use crate::{core::Proxy, utils::allocator::EntityId};

/// Dense list of registered proxies with an id → slot lookup.
///
/// Slots are compact: removing a proxy moves the last one into the freed
/// slot, exactly like `Vec::swap_remove`, so per-slot side tables stay aligned
/// by calling `swap_remove` with the reported slot.
#[derive(Debug, Default, Clone)]
pub(crate) struct ProxyRegistry {
    proxies: Vec<Proxy>,
    slots: HashMap<EntityId, usize>,
}

/// Outcome of [`ProxyRegistry::remove`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Removal {
    pub removed: Proxy,
    pub slot: usize,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, proxy: Proxy, owner: &str) -> usize {
        let slot = self.proxies.len();
        let previous = self.slots.insert(proxy.id, slot);
        assert!(
            previous.is_none(),
            "{owner}: object {:?} is already registered",
            proxy.id
        );
        self.proxies.push(proxy);
        slot
    }

    pub fn remove(&mut self, id: EntityId, owner: &str) -> Removal {
        let slot = match self.slots.remove(&id) {
            Some(slot) => slot,
            None => panic!("{owner}: object {id:?} is not registered"),
        };
        let removed = self.proxies.swap_remove(slot);
        if let Some(moved) = self.proxies.get(slot) {
            self.slots.insert(moved.id, slot);
        }
        Removal { removed, slot }
    }

    pub fn slot(&self, id: EntityId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn expect_slot(&self, id: EntityId, owner: &str) -> usize {
        match self.slot(id) {
            Some(slot) => slot,
            None => panic!("{owner}: object {id:?} is not registered"),
        }
    }

    pub fn get(&self, slot: usize) -> &Proxy {
        &self.proxies[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Proxy {
        &mut self.proxies[slot]
    }

    pub fn as_slice(&self) -> &[Proxy] {
        &self.proxies
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn clear(&mut self) {
        self.proxies.clear();
        self.slots.clear();
    }
}
