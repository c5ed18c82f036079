//! Cube-sphere addressing: root faces of the unfolded cube, quad path strings,
//! seam-aware neighbor paths, and cube-to-sphere projection.

mod cube_face;
mod neighbor;
mod patch;
mod projection;
mod quad_path;

pub use cube_face::{FaceSide, QuadPlane, RootFace};
pub use neighbor::{Direction, neighbor_path, neighbor_paths};
pub use patch::QuadPatch;
pub use projection::{ProjectionMethod, cube_to_sphere_everitt, project};
pub use quad_path::{PathError, QuadPath};
