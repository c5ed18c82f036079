//! Equirectangular heightmaps stored as raw 8 or 16-bit samples.
//!
//! The raw layout is row-major. 16-bit maps are stored as two planes of
//! `width * height` bytes: all low bytes first, then all high bytes.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::path::Path;

use glam::DVec3;

use crate::TerrainError;
use crate::curve::cubic_interpolation;

/// Sample width of a raw heightmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    fn max_value(self) -> f32 {
        match self {
            BitDepth::Eight => f32::from(u8::MAX),
            BitDepth::Sixteen => f32::from(u16::MAX),
        }
    }
}

/// How `Heightmap::sample` filters between pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// 4×4 Catmull-Rom.
    #[default]
    Bicubic,
    Bilinear,
    Nearest,
}

#[derive(Clone, Debug)]
enum Samples {
    Eight(Vec<u8>),
    Sixteen(Vec<u16>),
}

/// An equirectangular height grid with normalized `[0, 1]` samples.
#[derive(Clone, Debug)]
pub struct Heightmap {
    width: usize,
    height: usize,
    interpolation: Interpolation,
    samples: Samples,
    scale_x: f64,
    scale_y: f64,
}

impl Heightmap {
    /// A zero-filled map.
    #[must_use]
    pub fn new(width: usize, height: usize, bit_depth: BitDepth, interpolation: Interpolation) -> Self {
        let len = width * height;
        let samples = match bit_depth {
            BitDepth::Eight => Samples::Eight(vec![0; len]),
            BitDepth::Sixteen => Samples::Sixteen(vec![0; len]),
        };
        Self::with_samples(width, height, interpolation, samples)
    }

    fn with_samples(width: usize, height: usize, interpolation: Interpolation, samples: Samples) -> Self {
        Self {
            width,
            height,
            interpolation,
            samples,
            scale_x: width.saturating_sub(1) as f64 / TAU,
            scale_y: height.saturating_sub(1) as f64 / PI,
        }
    }

    /// Decode raw bytes. The length must match the resolution exactly.
    pub fn from_bytes(
        width: usize,
        height: usize,
        bit_depth: BitDepth,
        interpolation: Interpolation,
        bytes: &[u8],
    ) -> Result<Self, TerrainError> {
        let len = width * height;
        let expected = match bit_depth {
            BitDepth::Eight => len,
            BitDepth::Sixteen => len * 2,
        };
        if bytes.len() != expected || len == 0 {
            return Err(TerrainError::ResolutionMismatch {
                expected,
                actual: bytes.len(),
                width,
                height,
                bit_depth: bit_depth.bits(),
            });
        }

        let samples = match bit_depth {
            BitDepth::Eight => Samples::Eight(bytes.to_vec()),
            BitDepth::Sixteen => {
                let (low, high) = bytes.split_at(len);
                Samples::Sixteen(
                    low.iter()
                        .zip(high)
                        .map(|(lo, hi)| (u16::from(*hi) << 8) + u16::from(*lo))
                        .collect(),
                )
            }
        };
        Ok(Self::with_samples(width, height, interpolation, samples))
    }

    /// Read a raw heightmap file.
    pub fn load(
        path: &Path,
        width: usize,
        height: usize,
        bit_depth: BitDepth,
        interpolation: Interpolation,
    ) -> Result<Self, TerrainError> {
        let bytes = std::fs::read(path).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::from_bytes(width, height, bit_depth, interpolation, &bytes)?;
        tracing::info!(
            "Loaded {}x{} {}-bit heightmap from {}",
            width,
            height,
            bit_depth.bits(),
            path.display()
        );
        Ok(map)
    }

    /// Load an 8-bit map from the red channel of an image file.
    pub fn from_image(path: &Path, interpolation: Interpolation) -> Result<Self, TerrainError> {
        let image = image::open(path)
            .map_err(|source| TerrainError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = (image.width() as usize, image.height() as usize);
        let red = image.pixels().map(|p| p.0[0]).collect();
        Ok(Self::with_samples(width, height, interpolation, Samples::Eight(red)))
    }

    /// Encode back into the raw layout accepted by [`Heightmap::from_bytes`].
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.samples {
            Samples::Eight(bytes) => bytes.clone(),
            Samples::Sixteen(values) => {
                let mut out: Vec<u8> = values.iter().map(|v| (v & 0xFF) as u8).collect();
                out.extend(values.iter().map(|v| (v >> 8) as u8));
                out
            }
        }
    }

    /// Write the raw layout to disk.
    pub fn save_raw(&self, path: &Path) -> Result<(), TerrainError> {
        std::fs::write(path, self.to_bytes()).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        match self.samples {
            Samples::Eight(_) => BitDepth::Eight,
            Samples::Sixteen(_) => BitDepth::Sixteen,
        }
    }

    #[must_use]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    fn raw(&self, x: usize, y: usize) -> f32 {
        let i = y * self.width + x;
        match &self.samples {
            Samples::Eight(bytes) => f32::from(bytes[i]),
            Samples::Sixteen(values) => f32::from(values[i]),
        }
    }

    /// Normalized value at `(x, y)`, or `None` outside the map.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height)
            .then(|| self.raw(x, y) / self.bit_depth().max_value())
    }

    /// Store a normalized value. Returns `false` outside the map.
    pub fn set_pixel(&mut self, x: usize, y: usize, value: f32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = y * self.width + x;
        let value = value.clamp(0.0, 1.0);
        match &mut self.samples {
            Samples::Eight(bytes) => bytes[i] = (value * f32::from(u8::MAX)).round() as u8,
            Samples::Sixteen(values) => values[i] = (value * f32::from(u16::MAX)).round() as u16,
        }
        true
    }

    /// Normalized height under the unit direction `dir`.
    ///
    /// +Y maps to the last row and longitude 0 sits at `-Z`. Coordinates
    /// past the last index wrap around.
    #[must_use]
    pub fn sample(&self, dir: DVec3) -> f32 {
        let max_x = self.width.saturating_sub(1) as f64;
        let max_y = self.height.saturating_sub(1) as f64;

        let mut lat = (PI - dir.y.clamp(-1.0, 1.0).acos()) * self.scale_y;
        let mut lon = dir.z.atan2(dir.x) + FRAC_PI_2;
        if lon < 0.0 {
            lon += TAU;
        }
        lon *= self.scale_x;

        if lat > max_y {
            lat -= max_y;
        }
        if lon > max_x {
            lon -= max_x;
        }

        let value = match self.interpolation {
            Interpolation::Bicubic => self.bicubic(lon, lat),
            Interpolation::Bilinear => self.bilinear(lon, lat),
            Interpolation::Nearest => self.raw(
                self.wrap_x(lon.round() as i64),
                self.wrap_y(lat.round() as i64),
            ),
        };
        value / self.bit_depth().max_value()
    }

    fn wrap_x(&self, x: i64) -> usize {
        x.rem_euclid(self.width as i64) as usize
    }

    fn wrap_y(&self, y: i64) -> usize {
        y.rem_euclid(self.height as i64) as usize
    }

    fn bilinear(&self, lon: f64, lat: f64) -> f32 {
        let x1 = self.wrap_x(lon.floor() as i64);
        let x2 = self.wrap_x(lon.ceil() as i64);
        let y1 = self.wrap_y(lat.floor() as i64);
        let y2 = self.wrap_y(lat.ceil() as i64);
        let fx = (lon - lon.floor()) as f32;
        let fy = (lat - lat.floor()) as f32;

        let top = lerp(self.raw(x1, y1), self.raw(x2, y1), fx);
        let bottom = lerp(self.raw(x1, y2), self.raw(x2, y2), fx);
        lerp(top, bottom, fy)
    }

    fn bicubic(&self, lon: f64, lat: f64) -> f32 {
        let x2 = lon.floor() as i64;
        let x3 = lon.ceil() as i64;
        let y2 = lat.floor() as i64;
        let y3 = lat.ceil() as i64;
        let xs = [x2 - 1, x2, x3, x3 + 1].map(|x| self.wrap_x(x));
        let ys = [y2 - 1, y2, y3, y3 + 1].map(|y| self.wrap_y(y));
        let fx = (lon - x2 as f64) as f32;
        let fy = (lat - y2 as f64) as f32;

        let rows = ys.map(|y| {
            cubic_interpolation(
                self.raw(xs[0], y),
                self.raw(xs[1], y),
                self.raw(xs[2], y),
                self.raw(xs[3], y),
                fx,
            )
        });
        cubic_interpolation(rows[0], rows[1], rows[2], rows[3], fy)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
