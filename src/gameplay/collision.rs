use bevy::prelude::*;

/// Axis-aligned box in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Bounds of a quad such as the output of [`rotated_rect_corners`].
    pub fn from_corners(corners: [Vec2; 4]) -> Self {
        let [first, rest @ ..] = corners;
        let (min, max) = rest
            .iter()
            .fold((first, first), |(min, max), corner| (min.min(*corner), max.max(*corner)));
        Self { min, max }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Strict overlap: boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

/// Corners of a `half_extents` rectangle rotated by `angle_rad` around `center`.
pub fn rotated_rect_corners(center: Vec2, half_extents: Vec2, angle_rad: f32) -> [Vec2; 4] {
    let rotation = Mat2::from_angle(angle_rad);
    [
        Vec2::new(-half_extents.x, -half_extents.y),
        Vec2::new(half_extents.x, -half_extents.y),
        Vec2::new(half_extents.x, half_extents.y),
        Vec2::new(-half_extents.x, half_extents.y),
    ]
    .map(|local| center + rotation * local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn touching_boxes_do_not_intersect() {
        let left = Aabb::from_center_half_extents(Vec2::ZERO, Vec2::splat(1.0));
        let right = Aabb::from_center_half_extents(Vec2::new(2.0, 0.0), Vec2::splat(1.0));
        assert!(!left.intersects(&right));

        let overlapping = Aabb::from_center_half_extents(Vec2::new(1.9, 0.5), Vec2::splat(1.0));
        assert!(left.intersects(&overlapping));
        assert!(overlapping.intersects(&left));
    }

    #[test]
    fn from_corners_wraps_every_corner() {
        let corners = [
            Vec2::new(3.0, -1.0),
            Vec2::new(-2.0, 4.0),
            Vec2::new(0.5, 0.5),
            Vec2::new(1.0, 2.0),
        ];
        let aabb = Aabb::from_corners(corners);
        assert_eq!(aabb.min, Vec2::new(-2.0, -1.0));
        assert_eq!(aabb.max, Vec2::new(3.0, 4.0));
        assert!(corners
            .iter()
            .all(|point| aabb.min.cmple(*point).all() && point.cmple(aabb.max).all()));
    }

    #[test]
    fn quarter_turn_swaps_rect_extents() {
        let corners = rotated_rect_corners(Vec2::new(10.0, 5.0), Vec2::new(20.0, 30.0), FRAC_PI_2);
        let aabb = Aabb::from_corners(corners);
        let size = aabb.size();
        assert!((size.x - 60.0).abs() < 1e-3);
        assert!((size.y - 40.0).abs() < 1e-3);
        assert!((aabb.center() - Vec2::new(10.0, 5.0)).length() < 1e-3);
    }
}
