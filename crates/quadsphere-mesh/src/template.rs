//! The flat patch every quad mesh is displaced from.
//!
//! The first [`GRID_VERTICES`] entries form the 33×33 render grid, stored
//! column-major (`col * 33 + row`). They are followed by a one-vertex ring
//! around it that turns the grid into 35×35. The ring is displaced too but
//! only feeds normal calculation, so border normals match across quads.

use std::sync::LazyLock;

/// Vertices per grid side.
pub const GRID_SIZE: usize = 33;
/// Vertices in the render grid.
pub const GRID_VERTICES: usize = GRID_SIZE * GRID_SIZE;
/// Vertices per side of the grid plus ring.
pub const EXTENDED_SIZE: usize = GRID_SIZE + 2;
/// Render grid plus ring.
pub const EXTENDED_VERTICES: usize = EXTENDED_SIZE * EXTENDED_SIZE;

const STEP: f64 = 2.0 / (GRID_SIZE - 1) as f64;

/// Index of a render grid vertex.
#[inline]
#[must_use]
pub const fn grid_index(col: usize, row: usize) -> usize {
    col * GRID_SIZE + row
}

pub struct PlaneTemplate {
    /// Patch-local `(u, v)` per vertex, grid first then ring.
    pub coords: Vec<[f64; 2]>,
    /// Triangles over the extended grid, for normals only.
    pub extended_triangles: Vec<u32>,
}

static TEMPLATE: LazyLock<PlaneTemplate> = LazyLock::new(PlaneTemplate::build);

/// The shared template.
#[must_use]
pub fn plane_template() -> &'static PlaneTemplate {
    &TEMPLATE
}

impl PlaneTemplate {
    fn build() -> Self {
        // Extended coordinates run from -1 to 33 inclusive.
        let ext = |c: isize, r: isize| [-1.0 + c as f64 * STEP, 1.0 - r as f64 * STEP];
        let last = GRID_SIZE as isize;
        let on_ring = |c: isize, r: isize| c == -1 || r == -1 || c == last || r == last;

        let mut coords = Vec::with_capacity(EXTENDED_VERTICES);
        for col in 0..GRID_SIZE as isize {
            for row in 0..GRID_SIZE as isize {
                coords.push(ext(col, row));
            }
        }

        let mut slot = vec![0u32; EXTENDED_VERTICES];
        let ext_slot = |c: isize, r: isize| ((c + 1) as usize) * EXTENDED_SIZE + (r + 1) as usize;
        for col in -1..=last {
            for row in -1..=last {
                slot[ext_slot(col, row)] = if on_ring(col, row) {
                    coords.push(ext(col, row));
                    (coords.len() - 1) as u32
                } else {
                    grid_index(col as usize, row as usize) as u32
                };
            }
        }

        let mut extended_triangles = Vec::with_capacity((EXTENDED_SIZE - 1).pow(2) * 6);
        for col in -1..last {
            for row in -1..last {
                let a = slot[ext_slot(col, row)];
                let b = slot[ext_slot(col + 1, row)];
                let c = slot[ext_slot(col, row + 1)];
                let d = slot[ext_slot(col + 1, row + 1)];
                extended_triangles.extend_from_slice(&[a, b, c, b, d, c]);
            }
        }

        Self {
            coords,
            extended_triangles,
        }
    }
}
