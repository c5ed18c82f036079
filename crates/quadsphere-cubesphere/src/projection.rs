//! Cube-to-sphere projection methods.
//!
//! All methods are functions of the cube point alone, so two patches that
//! share an edge project it to the same sphere points.

use std::f64::consts::FRAC_PI_4;

use glam::DVec3;

/// Selects which cube-to-sphere projection method to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ProjectionMethod {
    /// Normalize the cube point. Cells near face corners are smaller.
    #[default]
    Normalize,
    /// Everitt/Mathworld analytic projection: better area uniformity.
    Everitt,
    /// Tangent-warp projection: `tan(c * π/4)` per coordinate, then normalize.
    TangentWarp,
}

/// Analytic cube-to-sphere using the Everitt/Mathworld mapping.
///
/// ```text
/// sx = x * sqrt(1 - y²/2 - z²/2 + y²z²/3)
/// sy = y * sqrt(1 - x²/2 - z²/2 + x²z²/3)
/// sz = z * sqrt(1 - x²/2 - y²/2 + x²y²/3)
/// ```
#[inline]
#[must_use]
pub fn cube_to_sphere_everitt(cube_point: DVec3) -> DVec3 {
    let x2 = cube_point.x * cube_point.x;
    let y2 = cube_point.y * cube_point.y;
    let z2 = cube_point.z * cube_point.z;

    DVec3::new(
        cube_point.x * (1.0 - y2 / 2.0 - z2 / 2.0 + y2 * z2 / 3.0).sqrt(),
        cube_point.y * (1.0 - x2 / 2.0 - z2 / 2.0 + x2 * z2 / 3.0).sqrt(),
        cube_point.z * (1.0 - x2 / 2.0 - y2 / 2.0 + x2 * y2 / 3.0).sqrt(),
    )
}

/// Project a point on the `[-1, 1]` cube onto the unit sphere.
#[inline]
#[must_use]
pub fn project(cube_point: DVec3, method: ProjectionMethod) -> DVec3 {
    match method {
        ProjectionMethod::Normalize => cube_point.normalize(),
        // Renormalize to absorb rounding; the mapping is already unit length.
        ProjectionMethod::Everitt => cube_to_sphere_everitt(cube_point).normalize(),
        ProjectionMethod::TangentWarp => {
            // tan(±π/4) = ±1 keeps the face axis on the cube.
            let warp = |c: f64| (c * FRAC_PI_4).tan();
            DVec3::new(warp(cube_point.x), warp(cube_point.y), warp(cube_point.z)).normalize()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RootFace;

    const EPSILON: f64 = 1e-10;
    const METHODS: [ProjectionMethod; 3] = [
        ProjectionMethod::Normalize,
        ProjectionMethod::Everitt,
        ProjectionMethod::TangentWarp,
    ];

    #[test]
    fn test_face_center_maps_to_normal() {
        for face in RootFace::ALL {
            for method in METHODS {
                let p = project(face.normal(), method);
                assert!(
                    (p - face.normal()).length() < EPSILON,
                    "{method:?}: face center of {face:?} did not map to normal: got {p:?}"
                );
            }
        }
    }

    #[test]
    fn test_output_is_unit_length() {
        for method in METHODS {
            for point in [
                DVec3::new(1.0, 0.3, -0.7),
                DVec3::new(-0.2, -1.0, 0.9),
                DVec3::new(1.0, 1.0, 1.0),
            ] {
                let p = project(point, method);
                assert!((p.length() - 1.0).abs() < EPSILON, "{method:?} {point:?}");
            }
        }
    }

    #[test]
    fn test_everitt_differs_from_normalize_off_center() {
        let point = DVec3::new(1.0, 0.5, 0.5);
        let a = project(point, ProjectionMethod::Normalize);
        let b = project(point, ProjectionMethod::Everitt);
        assert!((a - b).length() > 1e-4);
    }

    #[test]
    fn test_shared_edge_point_is_consistent_across_faces() {
        // (1, 1, z) lies on both +X and +Y; the projection sees one point.
        let edge = DVec3::new(1.0, 1.0, 0.25);
        for method in METHODS {
            let p = project(edge, method);
            assert!((p.x - p.y).abs() < EPSILON, "{method:?} broke edge symmetry");
        }
    }
}
