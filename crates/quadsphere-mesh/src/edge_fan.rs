//! Index lists that stitch a quad to coarser neighbors.
//!
//! Along an edge whose neighbor is one level coarser, every odd vertex is
//! folded onto the even vertex before it, so the edge follows the
//! neighbor's vertices exactly. Triangles that collapse to zero area are
//! dropped. All sixteen edge combinations are built once and shared.

use std::fmt;
use std::sync::LazyLock;

use quadsphere_cubesphere::Direction;

use crate::template::{GRID_SIZE, grid_index};

/// Which edges border a neighbor one level coarser, in `right, left, down, up` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EdgeConfiguration {
    pub right: bool,
    pub left: bool,
    pub down: bool,
    pub up: bool,
}

impl EdgeConfiguration {
    /// No fanned edges.
    pub const NONE: Self = Self::new(false, false, false, false);
    /// Every edge fanned.
    pub const ALL: Self = Self::new(true, true, true, true);

    #[must_use]
    pub const fn new(right: bool, left: bool, down: bool, up: bool) -> Self {
        Self {
            right,
            left,
            down,
            up,
        }
    }

    #[must_use]
    pub fn get(self, direction: Direction) -> bool {
        match direction {
            Direction::Right => self.right,
            Direction::Left => self.left,
            Direction::Down => self.down,
            Direction::Up => self.up,
        }
    }

    pub fn set(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Right => self.right = value,
            Direction::Left => self.left = value,
            Direction::Down => self.down = value,
            Direction::Up => self.up = value,
        }
    }

    /// Variant index in `0..16`; right is the high bit.
    #[must_use]
    pub fn bits(self) -> usize {
        (usize::from(self.right) << 3)
            | (usize::from(self.left) << 2)
            | (usize::from(self.down) << 1)
            | usize::from(self.up)
    }

    #[must_use]
    pub fn from_bits(bits: usize) -> Self {
        Self::new(bits & 8 != 0, bits & 4 != 0, bits & 2 != 0, bits & 1 != 0)
    }
}

impl fmt::Display for EdgeConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in [self.right, self.left, self.down, self.up] {
            f.write_str(if flag { "1" } else { "0" })?;
        }
        Ok(())
    }
}

static VARIANTS: LazyLock<[Vec<u32>; 16]> =
    LazyLock::new(|| std::array::from_fn(|bits| build_variant(EdgeConfiguration::from_bits(bits))));

/// Triangle indices into the render grid for `edges`.
#[must_use]
pub fn index_variant(edges: EdgeConfiguration) -> &'static [u32] {
    &VARIANTS[edges.bits()]
}

fn build_variant(edges: EdgeConfiguration) -> Vec<u32> {
    let last = GRID_SIZE - 1;
    let fold = |mut col: usize, mut row: usize| {
        if edges.right && col == last && row % 2 == 1 {
            row -= 1;
        }
        if edges.left && col == 0 && row % 2 == 1 {
            row -= 1;
        }
        if edges.up && row == 0 && col % 2 == 1 {
            col -= 1;
        }
        if edges.down && row == last && col % 2 == 1 {
            col -= 1;
        }
        (col, row)
    };

    let mut indices = Vec::with_capacity(last * last * 6);
    for col in 0..last {
        for row in 0..last {
            let a = fold(col, row);
            let b = fold(col + 1, row);
            let c = fold(col, row + 1);
            let d = fold(col + 1, row + 1);
            for [p, q, r] in [[a, b, c], [b, d, c]] {
                if doubled_area(p, q, r) == 0 {
                    continue;
                }
                indices.extend([p, q, r].map(|(x, y)| grid_index(x, y) as u32));
            }
        }
    }
    indices
}

/// Twice the signed area of a triangle in grid coordinates.
fn doubled_area(p: (usize, usize), q: (usize, usize), r: (usize, usize)) -> i64 {
    let (px, py) = (p.0 as i64, p.1 as i64);
    (q.0 as i64 - px) * (r.1 as i64 - py) - (r.0 as i64 - px) * (q.1 as i64 - py)
}
