use glam::{DVec3, Mat4, Quat};

/// Camera state handed to the LOD manager each tick, in planet-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewer {
    pub position: DVec3,
    pub rotation: Quat,
    /// Needed for frustum culling when quads behind the camera are not
    /// computed. Without it every quad passing the sphere test is visible.
    pub view_projection: Option<Mat4>,
}

impl Viewer {
    #[must_use]
    pub fn at(position: DVec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            view_projection: None,
        }
    }

    #[must_use]
    pub fn with_view_projection(mut self, rotation: Quat, view_projection: Mat4) -> Self {
        self.rotation = rotation;
        self.view_projection = Some(view_projection);
        self
    }
}
