use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box. `min <= max` holds componentwise for every box
/// built from real geometry; [`Aabb::empty`] is the only inverted box and acts
/// as the identity for [`Aabb::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(
            min.cmple(max).all(),
            "aabb min {min} must not exceed max {max}"
        );
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn volume(&self) -> f32 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Inclusive overlap test: boxes that only touch are reported as overlapping.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grows the box by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Lower bound on the distance between anything enclosed by `self` and
    /// anything enclosed by `other`. Zero when the boxes overlap.
    #[inline]
    pub fn distance(&self, other: &Aabb) -> f32 {
        let gap = (other.min - self.max).max(self.min - other.max).max(Vec3::ZERO);
        gap.length()
    }

    /// Size of the separating gap along one axis, zero when the projections overlap.
    #[inline]
    pub fn axis_gap(&self, other: &Aabb, axis: usize) -> f32 {
        (other.min[axis] - self.max[axis])
            .max(self.min[axis] - other.max[axis])
            .max(0.0)
    }
}

/// Index of the axis along which the centers of `boxes` are spread the most.
pub fn axis_of_max_variance<'a>(boxes: impl Iterator<Item = &'a Aabb>) -> usize {
    let mut count = 0.0f32;
    let mut sum = Vec3::ZERO;
    let mut sum_sq = Vec3::ZERO;
    for aabb in boxes {
        let c = aabb.center();
        count += 1.0;
        sum += c;
        sum_sq += c * c;
    }
    if count < 2.0 {
        return 0;
    }
    let mean = sum / count;
    let variance = sum_sq / count - mean * mean;
    if variance.x >= variance.y && variance.x >= variance.z {
        0
    } else if variance.y >= variance.z {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::from_center_half_extents(Vec3::new(x, y, z), Vec3::splat(0.5))
    }

    #[test]
    fn overlap_is_symmetric() {
        let boxes = [
            unit_at(0.0, 0.0, 0.0),
            unit_at(0.9, 0.0, 0.0),
            unit_at(1.0, 0.0, 0.0),
            unit_at(1.1, 0.0, 0.0),
            unit_at(0.5, 0.5, 3.0),
        ];
        for a in &boxes {
            for b in &boxes {
                assert_eq!(a.overlaps(b), b.overlaps(a));
            }
        }
    }

    #[test]
    fn touching_boxes_overlap() {
        assert!(unit_at(0.0, 0.0, 0.0).overlaps(&unit_at(1.0, 0.0, 0.0)));
        assert!(!unit_at(0.0, 0.0, 0.0).overlaps(&unit_at(1.01, 0.0, 0.0)));
    }

    #[test]
    fn distance_is_zero_when_overlapping_and_euclidean_otherwise() {
        let a = unit_at(0.0, 0.0, 0.0);
        assert_eq!(a.distance(&unit_at(0.5, 0.5, 0.0)), 0.0);
        assert!((a.distance(&unit_at(3.0, 0.0, 0.0)) - 2.0).abs() < 1e-6);
        assert!((a.distance(&unit_at(4.0, 5.0, 0.0)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn merge_contains_both_inputs() {
        let a = unit_at(0.0, 0.0, 0.0);
        let b = unit_at(3.0, -2.0, 1.0);
        let merged = a.merge(&b);
        assert!(merged.contains(&a));
        assert!(merged.contains(&b));
        assert_eq!(Aabb::empty().merge(&a), a);
    }

    #[test]
    fn variance_axis_follows_the_spread() {
        let boxes: Vec<Aabb> = (0..8).map(|i| unit_at(0.0, 0.0, i as f32 * 3.0)).collect();
        assert_eq!(axis_of_max_variance(boxes.iter()), 2);
    }
}
