//! The square of the unit cube covered by one quad.

use glam::DVec3;

use crate::{QuadPath, RootFace};

/// A quad's patch of the `[-1, 1]` cube: center plus half-width, oriented
/// by its root face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadPatch {
    pub root: RootFace,
    /// Patch center on the cube surface.
    pub center: DVec3,
    /// Half the patch width. 1 for a root, halved per level.
    pub scale: f64,
}

impl QuadPatch {
    /// The whole face of a root.
    #[must_use]
    pub fn root(face: RootFace) -> Self {
        Self {
            root: face,
            center: face.normal(),
            scale: 1.0,
        }
    }

    /// Walk the path digits down from the root patch.
    #[must_use]
    pub fn from_path(path: &QuadPath) -> Self {
        path.digits()
            .fold(Self::root(path.root_face()), |patch, q| patch.child(q))
    }

    /// Patch of child `quadrant`: bit 0 picks the right half, bit 1 the lower half.
    #[must_use]
    pub fn child(&self, quadrant: u8) -> Self {
        let half = self.scale * 0.5;
        let along_right = if quadrant & 1 == 0 { -half } else { half };
        let along_up = if quadrant & 2 == 0 { half } else { -half };
        Self {
            root: self.root,
            center: self.center + self.right() * along_right + self.up() * along_up,
            scale: half,
        }
    }

    #[must_use]
    pub fn right(&self) -> DVec3 {
        self.root.right()
    }

    #[must_use]
    pub fn up(&self) -> DVec3 {
        self.root.up()
    }

    #[must_use]
    pub fn normal(&self) -> DVec3 {
        self.root.normal()
    }

    /// Point at patch-local `(u, v)`, both in `[-1, 1]` with `v` pointing up.
    #[must_use]
    pub fn cube_point(&self, u: f64, v: f64) -> DVec3 {
        self.center + (self.right() * u + self.up() * v) * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_root_patch_covers_face() {
        let patch = QuadPatch::root(RootFace::Back);
        assert_eq!(patch.center, DVec3::NEG_Z);
        assert_eq!(patch.scale, 1.0);
        let corner = patch.cube_point(1.0, 1.0);
        assert!((corner - DVec3::new(1.0, 1.0, -1.0)).length() < EPSILON);
    }

    #[test]
    fn test_children_tile_parent() {
        let parent = QuadPatch::root(RootFace::Forward);
        let children: Vec<QuadPatch> = (0..4).map(|q| parent.child(q)).collect();
        for child in &children {
            assert_eq!(child.scale, 0.5);
            assert!((child.center.z - 1.0).abs() < EPSILON, "child left the face");
        }
        // 0 is top-left: left along right(), up along up().
        let tl = children[0].center - parent.center;
        assert!(tl.dot(parent.right()) < 0.0 && tl.dot(parent.up()) > 0.0);
        let br = children[3].center - parent.center;
        assert!(br.dot(parent.right()) > 0.0 && br.dot(parent.up()) < 0.0);
        let sum: DVec3 = children.iter().map(|c| c.center).sum();
        assert!((sum / 4.0 - parent.center).length() < EPSILON);
    }

    #[test]
    fn test_from_path_matches_child_chain() {
        let path = QuadPath::parse("12301").unwrap();
        let chained = QuadPatch::root(RootFace::Left).child(3).child(0).child(1);
        let patch = QuadPatch::from_path(&path);
        assert!((patch.center - chained.center).length() < EPSILON);
        assert_eq!(patch.scale, 0.125);
    }
}
