//! Scene generators and a reference narrow phase shared by the integration
//! tests. Shapes are spheres and axis-aligned cuboids so exact distances are
//! cheap to compute.

#![allow(dead_code)]

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_proximity::{
    Aabb, Arena, BroadPhaseManager, CollisionObject, CollisionPairs, EntityId, MinDistance, Shape,
    Transform, Vec3,
};

pub struct Scene {
    pub objects: Arena<CollisionObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
        }
    }

    pub fn add(&mut self, shape: Shape, position: Vec3) -> EntityId {
        let shape = Arc::new(shape);
        self.objects.insert_with(|id| {
            CollisionObject::new(id, shape, Transform::from_position(position))
        })
    }

    pub fn refs(&self) -> Vec<&CollisionObject> {
        self.objects.iter().collect()
    }

    pub fn get(&self, id: EntityId) -> &CollisionObject {
        self.objects.get(id).expect("object exists")
    }

    pub fn bounds(&self) -> Aabb {
        self.objects
            .iter()
            .fold(Aabb::empty(), |acc, o| acc.merge(o.aabb()))
    }

    /// Exact distance between two objects, zero when they overlap.
    pub fn distance(&self, a: EntityId, b: EntityId) -> f32 {
        shape_distance(self.get(a), self.get(b))
    }

    pub fn overlaps(&self, a: EntityId, b: EntityId) -> bool {
        self.distance(a, b) <= 0.0
    }

    /// Every overlapping pair, found by brute force without any manager.
    pub fn brute_force_pairs(&self) -> Vec<(EntityId, EntityId)> {
        let objects = self.refs();
        let mut pairs = Vec::new();
        for (i, a) in objects.iter().enumerate() {
            for b in &objects[i + 1..] {
                if a.aabb().overlaps(b.aabb()) {
                    pairs.push(if a.id <= b.id { (a.id, b.id) } else { (b.id, a.id) });
                }
            }
        }
        pairs.sort();
        pairs
    }

    pub fn brute_force_min_distance(&self) -> f32 {
        let objects = self.refs();
        let mut min = f32::INFINITY;
        for (i, a) in objects.iter().enumerate() {
            for b in &objects[i + 1..] {
                min = min.min(shape_distance(a, b));
            }
        }
        min
    }
}

fn shape_distance(a: &CollisionObject, b: &CollisionObject) -> f32 {
    let pa = a.transform().position;
    let pb = b.transform().position;
    match (a.shape().as_ref(), b.shape().as_ref()) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            (pa.distance(pb) - ra - rb).max(0.0)
        }
        (Shape::Sphere { radius }, _) => point_box_distance(pa, b.aabb(), *radius),
        (_, Shape::Sphere { radius }) => point_box_distance(pb, a.aabb(), *radius),
        _ => a.aabb().distance(b.aabb()),
    }
}

fn point_box_distance(point: Vec3, aabb: &Aabb, radius: f32) -> f32 {
    let closest = point.clamp(aabb.min, aabb.max);
    (point.distance(closest) - radius).max(0.0)
}

/// Objects on a lattice filling `[-scale, scale]^3`, one per cell, each
/// strictly inside its cell so no two objects touch.
pub fn separated_scene(scale: f32, count: usize, seed: u64) -> Scene {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_edge = (count as f32).cbrt().ceil() as usize;
    let step = scale * 2.0 / n_edge as f32;
    let margin = step * 0.05;
    let single = step - 2.0 * margin;

    let mut scene = Scene::new();
    'outer: for x in 0..n_edge {
        for y in 0..n_edge {
            for z in 0..n_edge {
                if scene.objects.len() == count {
                    break 'outer;
                }
                let center = Vec3::new(x as f32, y as f32, z as f32) * step
                    + Vec3::splat(margin + 0.5 * single - scale);
                let size = single * rng.gen_range(0.5..1.0);
                let shape = if rng.gen_bool(0.5) {
                    Shape::sphere(size * 0.5)
                } else {
                    Shape::cuboid(Vec3::new(
                        size * 0.5,
                        size * rng.gen_range(0.25..0.5),
                        size * rng.gen_range(0.25..0.5),
                    ))
                };
                scene.add(shape, center);
            }
        }
    }
    scene
}

/// Equal-size cubes, one per lattice cell with a random offset inside it, so
/// the placement is random but no two cubes touch.
pub fn uniform_box_scene(scale: f32, count: usize, seed: u64) -> Scene {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_edge = (count as f32).cbrt().ceil() as usize;
    let step = scale * 2.0 / n_edge as f32;
    let size = step * 0.6;
    let slack = (step - size) * 0.5 - step * 0.05;

    let mut scene = Scene::new();
    for i in 0..count {
        let cell = Vec3::new(
            (i % n_edge) as f32,
            ((i / n_edge) % n_edge) as f32,
            (i / (n_edge * n_edge)) as f32,
        );
        let jitter = random_point(&mut rng, slack);
        let center = (cell + Vec3::splat(0.5)) * step - Vec3::splat(scale) + jitter;
        scene.add(Shape::cube(size), center);
    }
    scene
}

/// Randomly placed objects in `[-scale, scale]^3`; many of them overlap.
pub fn random_scene(scale: f32, count: usize, max_size: f32, seed: u64) -> Scene {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scene = Scene::new();
    for _ in 0..count {
        scene.add(random_shape(&mut rng, max_size), random_point(&mut rng, scale));
    }
    scene
}

pub fn random_point(rng: &mut StdRng, scale: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-scale..scale),
        rng.gen_range(-scale..scale),
        rng.gen_range(-scale..scale),
    )
}

pub fn random_shape(rng: &mut StdRng, max_size: f32) -> Shape {
    if rng.gen_bool(0.5) {
        Shape::sphere(rng.gen_range(0.1..max_size * 0.5))
    } else {
        Shape::cuboid(Vec3::new(
            rng.gen_range(0.1..max_size * 0.5),
            rng.gen_range(0.1..max_size * 0.5),
            rng.gen_range(0.1..max_size * 0.5),
        ))
    }
}

/// Pairs reported by `manager`, normalised for comparison.
pub fn collide_all(manager: &dyn BroadPhaseManager) -> Vec<(EntityId, EntityId)> {
    let mut pairs = CollisionPairs::new(|_, _| true);
    manager.collide(&mut pairs);
    pairs.sorted_pairs()
}

/// Minimum self distance reported by `manager` with the exact narrow phase.
pub fn self_distance(manager: &dyn BroadPhaseManager, scene: &Scene) -> f32 {
    let mut callback = MinDistance::new(|a, b| scene.distance(a, b));
    manager.distance(&mut callback);
    spatial_proximity::DistanceCallback::min_distance(&callback)
}
