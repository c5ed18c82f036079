//! Same-depth neighbor paths, including across cube-face seams.
//!
//! Inside a root face a neighbor is found by walking the path backwards:
//! each digit is flipped toward the requested direction, and the walk stops
//! at the first digit that did not leave its parent quadrant. When every
//! digit leaves (the quad lies on the root's outer edge), the root selector
//! changes. Where the unfolded cross has an empty slot in that direction the
//! cube folds the edge onto another face, whose quadrant numbering is
//! rotated or mirrored; the seam table holds the digit substitution for each
//! such fold.

use crate::{QuadPath, RootFace};

/// Edge directions of a quad, in neighbor-array order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Right = 0,
    Left = 1,
    Down = 2,
    Up = 3,
}

impl Direction {
    /// All four directions in neighbor-array order.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Down,
        Direction::Up,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Right => Direction::Left,
            Direction::Left => Direction::Right,
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
        }
    }
}

/// What the walk does after rewriting a digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// The neighbor shares the parent; earlier digits are untouched.
    Stop,
    /// The neighbor is in the parent's neighbor; keep walking.
    Carry,
}

use Step::{Carry, Stop};

/// `TRANSITION[direction][digit]`.
const TRANSITION: [[(u8, Step); 4]; 4] = [
    // right
    [(1, Stop), (0, Carry), (3, Stop), (2, Carry)],
    // left
    [(1, Carry), (0, Stop), (3, Carry), (2, Stop)],
    // down
    [(2, Stop), (3, Stop), (0, Carry), (1, Carry)],
    // up
    [(2, Carry), (3, Carry), (0, Stop), (1, Stop)],
];

/// Digits that lie on the inner side of a quadrant for each direction. A
/// path free of them touches the outer edge of its root face.
const INTERIOR_DIGITS: [[u8; 2]; 4] = [[0, 2], [1, 3], [0, 1], [2, 3]];

/// A fold of the cube where the cross has no face in that direction.
struct Seam {
    from: RootFace,
    direction: Direction,
    to: RootFace,
    /// `(old, new)` digit pairs. Only the two edge digits can occur.
    substitute: [(u8, u8); 2],
}

const SEAMS: [Seam; 12] = [
    Seam { from: RootFace::Up, direction: Direction::Right, to: RootFace::Left, substitute: [(1, 1), (3, 0)] },
    Seam { from: RootFace::Up, direction: Direction::Left, to: RootFace::Right, substitute: [(0, 0), (2, 1)] },
    Seam { from: RootFace::Up, direction: Direction::Up, to: RootFace::Back, substitute: [(0, 1), (1, 0)] },
    Seam { from: RootFace::Down, direction: Direction::Right, to: RootFace::Left, substitute: [(1, 2), (3, 3)] },
    Seam { from: RootFace::Down, direction: Direction::Left, to: RootFace::Right, substitute: [(0, 3), (2, 2)] },
    Seam { from: RootFace::Down, direction: Direction::Down, to: RootFace::Back, substitute: [(2, 3), (3, 2)] },
    Seam { from: RootFace::Right, direction: Direction::Down, to: RootFace::Down, substitute: [(2, 2), (3, 0)] },
    Seam { from: RootFace::Right, direction: Direction::Up, to: RootFace::Up, substitute: [(0, 0), (1, 2)] },
    Seam { from: RootFace::Left, direction: Direction::Down, to: RootFace::Down, substitute: [(2, 1), (3, 3)] },
    Seam { from: RootFace::Left, direction: Direction::Up, to: RootFace::Up, substitute: [(0, 3), (1, 1)] },
    Seam { from: RootFace::Back, direction: Direction::Down, to: RootFace::Down, substitute: [(2, 3), (3, 2)] },
    Seam { from: RootFace::Back, direction: Direction::Up, to: RootFace::Up, substitute: [(0, 1), (1, 0)] },
];

/// Root reached by walking off `face` inside the cross grid, for the
/// directions that have a face there. The band wraps around horizontally.
fn grid_step(face: RootFace, direction: Direction) -> Option<RootFace> {
    match (face, direction) {
        (RootFace::Right, Direction::Right) => Some(RootFace::Forward),
        (RootFace::Forward, Direction::Right) => Some(RootFace::Left),
        (RootFace::Left, Direction::Right) => Some(RootFace::Back),
        (RootFace::Back, Direction::Right) => Some(RootFace::Right),
        (RootFace::Forward, Direction::Left) => Some(RootFace::Right),
        (RootFace::Left, Direction::Left) => Some(RootFace::Forward),
        (RootFace::Back, Direction::Left) => Some(RootFace::Left),
        (RootFace::Right, Direction::Left) => Some(RootFace::Back),
        (RootFace::Up, Direction::Down) => Some(RootFace::Forward),
        (RootFace::Forward, Direction::Down) => Some(RootFace::Down),
        (RootFace::Forward, Direction::Up) => Some(RootFace::Up),
        (RootFace::Down, Direction::Up) => Some(RootFace::Forward),
        _ => None,
    }
}

fn on_root_edge(path: &QuadPath, direction: Direction) -> bool {
    let interior = INTERIOR_DIGITS[direction.index()];
    path.digits().all(|d| !interior.contains(&d))
}

/// Path of the same-depth quad adjacent to `path` in `direction`.
///
/// The returned quad may not exist when the neighbor region is coarser;
/// callers fall back to trimming trailing digits.
#[must_use]
pub fn neighbor_path(path: &QuadPath, direction: Direction) -> QuadPath {
    let row = &TRANSITION[direction.index()];

    if on_root_edge(path, direction) {
        let from = path.root_face();
        if let Some(seam) = SEAMS
            .iter()
            .find(|s| s.from == from && s.direction == direction)
        {
            let digits = path.digits().map(|d| {
                seam.substitute
                    .iter()
                    .find(|(old, _)| *old == d)
                    .map_or(d, |(_, new)| *new)
            });
            return QuadPath::from_digits(seam.to, digits);
        }
        if let Some(to) = grid_step(from, direction) {
            // Every digit carries, so each one flips.
            return QuadPath::from_digits(to, path.digits().map(|d| row[d as usize].0));
        }
    }

    let mut digits: Vec<u8> = path.digits().collect();
    for digit in digits.iter_mut().rev() {
        let (new_digit, step) = row[*digit as usize];
        *digit = new_digit;
        if step == Stop {
            break;
        }
    }
    QuadPath::from_digits(path.root_face(), digits)
}

/// Neighbor paths in `Direction::ALL` order.
#[must_use]
pub fn neighbor_paths(path: &QuadPath) -> [QuadPath; 4] {
    Direction::ALL.map(|direction| neighbor_path(path, direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuadPatch;
    use glam::DVec3;

    const EPSILON: f64 = 1e-9;

    fn path(s: &str) -> QuadPath {
        QuadPath::parse(s).unwrap()
    }

    fn all_paths(depth: usize) -> Vec<QuadPath> {
        let mut paths: Vec<QuadPath> = RootFace::ALL.into_iter().map(QuadPath::root).collect();
        for _ in 0..depth {
            paths = paths
                .iter()
                .flat_map(|p| (0..4).map(move |q| p.child(q)))
                .collect();
        }
        paths
    }

    #[test]
    fn test_same_parent_neighbors() {
        assert_eq!(neighbor_path(&path("030"), Direction::Right).as_str(), "031");
        assert_eq!(neighbor_path(&path("031"), Direction::Left).as_str(), "030");
        assert_eq!(neighbor_path(&path("030"), Direction::Down).as_str(), "032");
        assert_eq!(neighbor_path(&path("033"), Direction::Up).as_str(), "031");
    }

    #[test]
    fn test_carry_into_parent_neighbor() {
        // Right of the top-right child of quadrant 0 is the top-left child of quadrant 1.
        assert_eq!(neighbor_path(&path("0301"), Direction::Right).as_str(), "0310");
        assert_eq!(neighbor_path(&path("0313"), Direction::Down).as_str(), "0331");
    }

    #[test]
    fn test_grid_crossing_flips_digits() {
        assert_eq!(neighbor_path(&path("0323"), Direction::Down).as_str(), "2101");
        assert_eq!(neighbor_path(&path("2101"), Direction::Up).as_str(), "0323");
    }

    #[test]
    fn test_band_wraps_around() {
        assert_eq!(neighbor_path(&path("13"), Direction::Right).as_str(), "02");
        assert_eq!(neighbor_path(&path("02"), Direction::Left).as_str(), "13");
        assert_eq!(neighbor_path(&path("131"), Direction::Right).as_str(), "020");
    }

    #[test]
    fn test_seam_back_face_up_lands_on_top_face() {
        assert_eq!(neighbor_path(&path("13"), Direction::Up).as_str(), "01");
        // Digits are mirrored across this fold, not copied.
        assert_eq!(neighbor_path(&path("130"), Direction::Up).as_str(), "011");
        assert_eq!(neighbor_path(&path("1301"), Direction::Up).as_str(), "0110");
        assert_eq!(neighbor_path(&path("011"), Direction::Up).as_str(), "130");
    }

    #[test]
    fn test_seam_keeps_full_suffix() {
        let result = neighbor_path(&path("13232"), Direction::Down);
        assert_eq!(result.as_str(), "21323");
        assert_eq!(result.level(), 3);
    }

    #[test]
    fn test_interior_quads_never_change_root() {
        for p in all_paths(3) {
            for direction in Direction::ALL {
                let n = neighbor_path(&p, direction);
                assert_eq!(n.level(), p.level());
                if !on_root_edge(&p, direction) {
                    assert_eq!(n.root_face(), p.root_face(), "{p} {direction:?}");
                }
            }
        }
    }

    #[test]
    fn test_neighbor_symmetry_all_faces() {
        for p in all_paths(4) {
            for direction in Direction::ALL {
                let n = neighbor_path(&p, direction);
                let back: Vec<QuadPath> = Direction::ALL
                    .iter()
                    .map(|d| neighbor_path(&n, *d))
                    .collect();
                assert!(
                    back.contains(&p),
                    "{n} (the {direction:?} neighbor of {p}) does not point back"
                );
                if n.root_face() == p.root_face() {
                    assert_eq!(
                        neighbor_path(&n, direction.opposite()),
                        p,
                        "same-face neighbors must be mutual in opposite directions"
                    );
                }
            }
        }
    }

    #[test]
    fn test_neighbors_share_an_edge_geometrically() {
        for p in all_paths(3) {
            let patch = QuadPatch::from_path(&p);
            for direction in Direction::ALL {
                let n = QuadPatch::from_path(&neighbor_path(&p, direction));
                let step = match direction {
                    Direction::Right => patch.right(),
                    Direction::Left => -patch.right(),
                    Direction::Down => -patch.up(),
                    Direction::Up => patch.up(),
                };
                let edge_midpoint = patch.center + step * patch.scale;
                let shared = [
                    n.center + n.right() * n.scale,
                    n.center - n.right() * n.scale,
                    n.center + n.up() * n.scale,
                    n.center - n.up() * n.scale,
                ]
                .iter()
                .any(|m: &DVec3| (*m - edge_midpoint).length() < EPSILON);
                assert!(shared, "{p} and its {direction:?} neighbor do not share an edge");
            }
        }
    }

    #[test]
    fn test_neighbor_paths_order() {
        let paths = neighbor_paths(&path("030"));
        assert_eq!(paths[Direction::Right.index()].as_str(), "031");
        assert_eq!(paths[Direction::Down.index()].as_str(), "032");
    }
}
