//! Core types: bounding boxes, poses, shapes, and the objects managers index.

pub mod aabb;
pub mod object;
pub mod shape;
pub mod types;

pub use aabb::Aabb;
pub use object::{CollisionObject, Proxy};
pub use shape::Shape;
pub use types::Transform;
