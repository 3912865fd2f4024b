use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{aabb::Aabb, types::Transform};

/// Geometry an object is made of.
///
/// Shapes are immutable once built and shared between objects through
/// `Arc<Shape>`. The broad phase only ever asks a shape for its bounds; exact
/// intersection and distance tests belong to the caller's narrow phase.
/// Capsules, cylinders and cones are aligned with the local Y axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    Capsule { radius: f32, half_height: f32 },
    Cylinder { radius: f32, half_height: f32 },
    Cone { radius: f32, half_height: f32 },
    ConvexHull { vertices: Vec<Vec3> },
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::Cuboid { half_extents }
    }

    /// Axis-aligned cube with edge length `size`.
    pub fn cube(size: f32) -> Self {
        Self::Cuboid {
            half_extents: Vec3::splat(size * 0.5),
        }
    }

    pub fn capsule(radius: f32, height: f32) -> Self {
        Self::Capsule {
            radius,
            half_height: height * 0.5,
        }
    }

    pub fn cylinder(radius: f32, height: f32) -> Self {
        Self::Cylinder {
            radius,
            half_height: height * 0.5,
        }
    }

    pub fn cone(radius: f32, height: f32) -> Self {
        Self::Cone {
            radius,
            half_height: height * 0.5,
        }
    }

    pub fn convex_hull(vertices: Vec<Vec3>) -> Self {
        Self::ConvexHull { vertices }
    }

    /// Bounds in the shape's own frame.
    pub fn local_aabb(&self) -> Aabb {
        match self {
            Shape::Sphere { radius } => Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(*radius)),
            Shape::Cuboid { half_extents } => Aabb::from_center_half_extents(Vec3::ZERO, *half_extents),
            Shape::Capsule {
                radius,
                half_height,
            } => Aabb::from_center_half_extents(
                Vec3::ZERO,
                Vec3::new(*radius, half_height + radius, *radius),
            ),
            Shape::Cylinder {
                radius,
                half_height,
            }
            | Shape::Cone {
                radius,
                half_height,
            } => Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(*radius, *half_height, *radius)),
            Shape::ConvexHull { vertices } => Aabb::from_points(vertices),
        }
    }

    /// Bounds of the shape placed at `transform`.
    ///
    /// Spheres are rotation invariant and hulls are bounded from their
    /// transformed vertices; everything else rotates its local box, which is
    /// conservative but never tighter than the true bounds.
    pub fn world_aabb(&self, transform: &Transform) -> Aabb {
        match self {
            Shape::Sphere { radius } => {
                Aabb::from_center_half_extents(transform.position, Vec3::splat(*radius))
            }
            Shape::ConvexHull { vertices } => {
                let mut bounds = Aabb::empty();
                for v in vertices {
                    bounds.extend(transform.transform_point(*v));
                }
                bounds
            }
            _ => {
                let local = self.local_aabb();
                let rotation = transform.rotation_matrix();
                let abs = glam::Mat3::from_cols(
                    rotation.x_axis.abs(),
                    rotation.y_axis.abs(),
                    rotation.z_axis.abs(),
                );
                let center = transform.transform_point(local.center());
                Aabb::from_center_half_extents(center, abs * local.half_extents())
            }
        }
    }
}
