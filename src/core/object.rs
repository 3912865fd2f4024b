use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{aabb::Aabb, shape::Shape, types::Transform};
use crate::utils::allocator::EntityId;

/// A shape placed in the world.
///
/// The shape is shared and immutable; the pose belongs to the object and the
/// world-space AABB is recomputed every time the pose changes. Objects are
/// created, stored and destroyed by the caller. Broad-phase managers keep only
/// the object's [`EntityId`] and a snapshot of its AABB.
#[derive(Debug, Clone)]
pub struct CollisionObject {
    pub id: EntityId,
    shape: Arc<Shape>,
    transform: Transform,
    aabb: Aabb,
}

impl CollisionObject {
    pub fn new(id: EntityId, shape: Arc<Shape>, transform: Transform) -> Self {
        let aabb = shape.world_aabb(&transform);
        Self {
            id,
            shape,
            transform,
            aabb,
        }
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.aabb = self.shape.world_aabb(&transform);
    }

    pub fn translate(&mut self, offset: glam::Vec3) {
        let mut transform = self.transform;
        transform.position += offset;
        self.set_transform(transform);
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Snapshot handed to broad-phase managers.
    pub fn proxy(&self) -> Proxy {
        Proxy {
            id: self.id,
            aabb: self.aabb,
        }
    }
}

/// What a manager knows about a registered object: its id and the AABB it had
/// the last time it was registered or updated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proxy {
    pub id: EntityId,
    pub aabb: Aabb,
}

impl Proxy {
    pub fn new(id: EntityId, aabb: Aabb) -> Self {
        Self { id, aabb }
    }
}
