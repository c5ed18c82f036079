//! View-frustum culling of quad bounds in planet space.

use glam::{DVec3, DVec4, Mat4};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    #[must_use]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size along each axis.
    #[must_use]
    pub fn extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Squared distance from `point` to the closest point of the box. Zero
    /// inside.
    #[must_use]
    pub fn distance_sqr(&self, point: DVec3) -> f64 {
        let closest = point.clamp(self.min, self.max);
        (point - closest).length_squared()
    }
}

/// Result of testing a box against the frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intersection {
    Inside,
    Intersecting,
    Outside,
}

/// The six planes of a view frustum, normals pointing inward.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    const LEFT: usize = 0;
    const RIGHT: usize = 1;
    const BOTTOM: usize = 2;
    const TOP: usize = 3;
    const NEAR: usize = 4;
    const FAR: usize = 5;

    /// Extract planes from a view-projection matrix with a `[0, 1]` depth
    /// range (as produced by `Mat4::perspective_rh`).
    #[must_use]
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let m = view_proj.as_dmat4();
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);

        let mut planes = [DVec4::ZERO; 6];
        planes[Self::LEFT] = r3 + r0;
        planes[Self::RIGHT] = r3 - r0;
        planes[Self::BOTTOM] = r3 + r1;
        planes[Self::TOP] = r3 - r1;
        planes[Self::NEAR] = r2;
        planes[Self::FAR] = r3 - r2;

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Classify `aabb`. Every plane is pushed outward by `extra_range`, so
    /// boxes that far outside still count as intersecting.
    #[must_use]
    pub fn classify(&self, aabb: &Aabb, extra_range: f64) -> Intersection {
        let mut result = Intersection::Inside;
        for plane in &self.planes {
            let normal = plane.truncate();
            let d = plane.w + extra_range;

            // p-vertex: the corner furthest along the normal.
            let p = DVec3::select(normal.cmpge(DVec3::ZERO), aabb.max, aabb.min);
            if normal.dot(p) + d < 0.0 {
                return Intersection::Outside;
            }
            let n = DVec3::select(normal.cmpge(DVec3::ZERO), aabb.min, aabb.max);
            if normal.dot(n) + d < 0.0 {
                result = Intersection::Intersecting;
            }
        }
        result
    }

    /// Whether any part of `aabb` may be visible.
    #[must_use]
    pub fn is_visible(&self, aabb: &Aabb, extra_range: f64) -> bool {
        self.classify(aabb, extra_range) != Intersection::Outside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const EPSILON: f64 = 1e-9;

    /// Camera at the origin looking down -Z, 90° vertical field of view.
    fn test_frustum() -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 1000.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    fn cube_at(center: DVec3, half: f64) -> Aabb {
        Aabb::new(center - DVec3::splat(half), center + DVec3::splat(half))
    }

    #[test]
    fn test_box_in_front_is_inside() {
        let f = test_frustum();
        assert_eq!(
            f.classify(&cube_at(DVec3::new(0.0, 0.0, -10.0), 1.0), 0.0),
            Intersection::Inside
        );
    }

    #[test]
    fn test_box_behind_camera_is_outside() {
        let f = test_frustum();
        assert_eq!(
            f.classify(&cube_at(DVec3::new(0.0, 0.0, 10.0), 1.0), 0.0),
            Intersection::Outside
        );
    }

    #[test]
    fn test_box_beyond_far_plane_is_outside() {
        let f = test_frustum();
        assert!(!f.is_visible(&cube_at(DVec3::new(0.0, 0.0, -2000.0), 1.0), 0.0));
    }

    #[test]
    fn test_box_on_side_plane_is_intersecting() {
        let f = test_frustum();
        // The left plane passes through x = z at 45°.
        assert_eq!(
            f.classify(&cube_at(DVec3::new(-10.0, 0.0, -10.0), 1.0), 0.0),
            Intersection::Intersecting
        );
    }

    #[test]
    fn test_extra_range_keeps_box_just_behind_camera() {
        let f = test_frustum();
        let behind = Aabb::new(DVec3::new(-0.5, -0.5, 0.5), DVec3::new(0.5, 0.5, 1.0));
        assert!(!f.is_visible(&behind, 0.0));
        assert!(f.is_visible(&behind, 1.0), "extra range should widen the near plane");
    }

    #[test]
    fn test_aabb_distance_sqr() {
        let b = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert!(b.distance_sqr(DVec3::splat(0.5)).abs() < EPSILON);
        assert!((b.distance_sqr(DVec3::new(3.0, 0.5, 0.5)) - 4.0).abs() < EPSILON);
        assert!((b.distance_sqr(DVec3::new(2.0, 2.0, 0.5)) - 2.0).abs() < EPSILON);
        assert_eq!(b.center(), DVec3::splat(0.5));
        assert_eq!(b.extents(), DVec3::splat(0.5));
    }
}
