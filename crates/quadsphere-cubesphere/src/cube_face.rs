//! The six root faces and where they sit on the unfolded cube cross.

use glam::DVec3;

/// Axis a cube face is perpendicular to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuadPlane {
    X,
    Y,
    Z,
}

/// Which of the two faces on an axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceSide {
    /// Face whose outward normal points along the positive axis.
    Front,
    /// Face whose outward normal points along the negative axis.
    Back,
}

/// One of the six root quads.
///
/// The roots are laid out as a cross on a 4×4 grid, which is itself a
/// two-level quadtree: the two path characters of a root are its quadrant in
/// that grid, coarse digit first.
///
/// ```text
///        col 0  col 1  col 2  col 3
/// row 0          01
/// row 1   02     03     12     13
/// row 2          21
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RootFace {
    /// +Y, top of the cross.
    Up = 0,
    /// −Y, bottom of the cross.
    Down = 1,
    /// +Z, center of the cross.
    Forward = 2,
    /// −Z, right end of the band.
    Back = 3,
    /// +X, left end of the band.
    Right = 4,
    /// −X, between forward and back.
    Left = 5,
}

impl RootFace {
    /// All six roots in creation order.
    pub const ALL: [RootFace; 6] = [
        RootFace::Up,
        RootFace::Down,
        RootFace::Forward,
        RootFace::Back,
        RootFace::Right,
        RootFace::Left,
    ];

    /// The two-character path selector of this root.
    #[must_use]
    pub fn selector(self) -> &'static str {
        match self {
            RootFace::Up => "01",
            RootFace::Down => "21",
            RootFace::Forward => "03",
            RootFace::Back => "13",
            RootFace::Right => "02",
            RootFace::Left => "12",
        }
    }

    /// Look up a root from its selector.
    #[must_use]
    pub fn from_selector(selector: &str) -> Option<RootFace> {
        RootFace::ALL
            .into_iter()
            .find(|face| face.selector() == selector)
    }

    #[must_use]
    pub fn plane(self) -> QuadPlane {
        match self {
            RootFace::Up | RootFace::Down => QuadPlane::Y,
            RootFace::Forward | RootFace::Back => QuadPlane::Z,
            RootFace::Right | RootFace::Left => QuadPlane::X,
        }
    }

    #[must_use]
    pub fn side(self) -> FaceSide {
        match self {
            RootFace::Up | RootFace::Forward | RootFace::Right => FaceSide::Front,
            RootFace::Down | RootFace::Back | RootFace::Left => FaceSide::Back,
        }
    }

    /// Outward-pointing unit normal. Also the center of the root patch on the cube.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            RootFace::Up => DVec3::Y,
            RootFace::Down => DVec3::NEG_Y,
            RootFace::Forward => DVec3::Z,
            RootFace::Back => DVec3::NEG_Z,
            RootFace::Right => DVec3::X,
            RootFace::Left => DVec3::NEG_X,
        }
    }

    /// Direction of increasing grid column ("right" on the cross).
    #[must_use]
    pub fn right(self) -> DVec3 {
        match self {
            RootFace::Up | RootFace::Down | RootFace::Forward => DVec3::NEG_X,
            RootFace::Back => DVec3::X,
            RootFace::Right => DVec3::Z,
            RootFace::Left => DVec3::NEG_Z,
        }
    }

    /// Direction of decreasing grid row ("up" on the cross).
    #[must_use]
    pub fn up(self) -> DVec3 {
        match self {
            RootFace::Up => DVec3::NEG_Z,
            RootFace::Down => DVec3::Z,
            RootFace::Forward | RootFace::Back | RootFace::Right | RootFace::Left => DVec3::Y,
        }
    }
}
