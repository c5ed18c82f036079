//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of texture weight slots a vertex carries (four color channels plus a uv2 pair).
pub const TEXTURE_SLOTS: usize = 6;

/// Top-level configuration for one planet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Shape, LOD and culling settings.
    pub planet: PlanetConfig,
    /// Elevation source settings.
    pub terrain: TerrainConfig,
    /// Biome/texture blending settings.
    pub texturing: TextureConfig,
    /// Mesh build threading.
    pub mesh: MeshConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// How quads behind the camera are treated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LodModeBehindCam {
    /// Quads outside the view frustum are culled and combine.
    NotComputed,
    /// Quads behind the camera are still refined and rendered.
    #[default]
    ComputeRender,
}

/// UV layout written into generated meshes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum UvMode {
    /// Tiling continued across subdivision levels using the quad path.
    Cube,
    /// Per-quad `[0, 1]` tiling scaled by depth.
    Quad,
    /// Drop the face axis from the rotated patch vertex.
    #[default]
    Legacy,
    /// Like `Legacy`, but the patch center is included before dropping the axis.
    LegacyContinuous,
}

impl UvMode {
    /// Whether UVs are taken from the projected cube vertex.
    pub fn is_legacy(self) -> bool {
        matches!(self, UvMode::Legacy | UvMode::LegacyContinuous)
    }
}

/// Which elevation function drives displacement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HeightMode {
    /// Equirectangular heightmap lookup.
    Heightmap,
    /// Procedural noise graph.
    Noise,
    /// Heightmap plus noise graph.
    Hybrid,
    /// A single constant height everywhere.
    #[default]
    Const,
}

/// Cube-to-sphere mapping applied to patch vertices.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Plain normalization of the cube point.
    #[default]
    Normalize,
    /// Everitt analytic mapping.
    Everitt,
    /// `tan(x * π/4)` warp before normalizing.
    TangentWarp,
}

/// Planet shape, LOD and culling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Planet radius in world units.
    pub radius: f32,
    /// Split distance per subdivision level. Its length is the maximum depth.
    pub detail_distances: Vec<f32>,
    /// Gate splitting on the mean squared deviation of a quad's heights.
    pub calculate_msds: bool,
    /// Minimum MSD per level required to split when `calculate_msds` is set.
    pub detail_msds: Vec<f32>,
    /// Whether render proxies at each level carry a collider. One longer than `detail_distances`.
    pub generate_colliders: Vec<bool>,
    /// Treatment of quads outside the view frustum.
    pub lod_mode_behind_camera: LodModeBehindCam,
    /// Extra distance added to each frustum plane before culling.
    pub behind_camera_extra_range: f32,
    /// UV layout.
    pub uv_type: UvMode,
    /// UV scale for `UvMode::Cube`.
    pub uv_scale: f32,
    /// Multiplier on the visibility sphere radius.
    pub vis_sphere_radius_mod: f32,
    /// Recompute every quad's distance synchronously instead of time slicing.
    pub update_all_quads: bool,
    /// Quads whose distance is recomputed per tick while time slicing.
    pub max_quads_to_update: usize,
    /// Camera travel that triggers a distance recompute.
    pub recompute_quad_distances_threshold: f32,
    /// Quads allowed in the splitting state at once.
    pub quads_splitting_simultaneously: usize,
    /// Cube-to-sphere mapping.
    pub projection: ProjectionKind,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: 10_000.0,
            detail_distances: vec![50_000.0, 25_000.0, 12_500.0, 6_250.0, 3_125.0],
            calculate_msds: false,
            detail_msds: vec![0.0; 5],
            generate_colliders: vec![false, false, false, false, false, true],
            lod_mode_behind_camera: LodModeBehindCam::ComputeRender,
            behind_camera_extra_range: 0.0,
            uv_type: UvMode::Legacy,
            uv_scale: 1.0,
            vis_sphere_radius_mod: 1.0,
            update_all_quads: false,
            max_quads_to_update: 250,
            recompute_quad_distances_threshold: 10.0,
            quads_splitting_simultaneously: 2,
            projection: ProjectionKind::Normalize,
        }
    }
}

/// Elevation source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Elevation function.
    pub mode: HeightMode,
    /// Maximum terrain height as a fraction of the radius.
    pub height_scale: f32,
    /// Raw heightmap file for `Heightmap` and `Hybrid` modes.
    pub heightmap_path: Option<PathBuf>,
    /// Heightmap width in pixels.
    pub heightmap_width: usize,
    /// Heightmap height in pixels.
    pub heightmap_height: usize,
    /// Heightmap stores two byte planes (low, high) instead of one.
    pub heightmap_16bit: bool,
    /// Bicubic instead of bilinear heightmap filtering.
    pub use_bicubic: bool,
    /// RON noise graph for `Noise` and `Hybrid` modes.
    pub noise_graph_path: Option<PathBuf>,
    /// Divisor used by the blended hybrid formula.
    pub hybrid_noise_div: f32,
    /// Height returned in `Const` mode.
    pub constant_height: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            mode: HeightMode::Const,
            height_scale: 0.02,
            heightmap_path: None,
            heightmap_width: 8192,
            heightmap_height: 4096,
            heightmap_16bit: false,
            use_bicubic: true,
            noise_graph_path: None,
            hybrid_noise_div: 50.0,
            constant_height: 0.0,
        }
    }
}

/// Biome/texture blend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    /// Ascending height breakpoints in `[0, 1]`.
    pub texture_heights: Vec<f32>,
    /// Texture slot for each breakpoint.
    pub texture_ids: Vec<u8>,
    /// Replace weights on steep vertices with `slope_texture`.
    pub use_slope_texture: bool,
    /// Slope in degrees above which the slope texture is used.
    pub slope_angle: f32,
    /// Texture slot used on steep slopes.
    pub slope_texture: u8,
    /// Classify by a biome map instead of by height.
    pub use_biome_map: bool,
    /// Image whose red channel is the biome map.
    pub biome_map_path: Option<PathBuf>,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            texture_heights: vec![0.0, 0.01, 0.02, 0.75, 1.0],
            texture_ids: vec![0, 1, 2, 3, 4, 5],
            use_slope_texture: false,
            slope_angle: 60.0,
            slope_texture: 5,
            use_biome_map: false,
            biome_map_path: None,
        }
    }
}

/// Mesh build threading configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeshConfig {
    /// Worker threads building meshes. 0 builds inline on the calling thread.
    pub worker_threads: usize,
    /// Maximum mesh jobs queued or running at once.
    pub max_in_flight: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get().saturating_sub(1).max(1),
            max_in_flight: 64,
        }
    }
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Log a quad count summary every this many ticks (0 disables).
    pub stats_interval_ticks: u32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval_ticks: 0,
        }
    }
}

/// Default per-user config directory.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quadsphere"))
}

// --- Validation ---

impl Config {
    /// Reject configurations the LOD manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let planet = &self.planet;
        if planet.radius.is_nan() || planet.radius <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "radius must be positive, got {}",
                planet.radius
            )));
        }
        if self.terrain.height_scale.is_nan() || self.terrain.height_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "height_scale must be positive, got {}",
                self.terrain.height_scale
            )));
        }
        if planet.detail_distances.len() > u8::MAX as usize - 2 {
            return Err(ConfigError::Invalid(format!(
                "too many detail levels: {}",
                planet.detail_distances.len()
            )));
        }
        if planet.generate_colliders.len() < planet.detail_distances.len() + 1 {
            return Err(ConfigError::Invalid(format!(
                "generate_colliders needs {} entries (one more than detail_distances), got {}",
                planet.detail_distances.len() + 1,
                planet.generate_colliders.len()
            )));
        }
        if planet.calculate_msds && planet.detail_msds.len() != planet.detail_distances.len() {
            return Err(ConfigError::Invalid(format!(
                "detail_msds has {} entries but detail_distances has {}",
                planet.detail_msds.len(),
                planet.detail_distances.len()
            )));
        }
        if planet.quads_splitting_simultaneously == 0 {
            return Err(ConfigError::Invalid(
                "quads_splitting_simultaneously must be at least 1".to_string(),
            ));
        }
        if planet.max_quads_to_update == 0 {
            return Err(ConfigError::Invalid(
                "max_quads_to_update must be at least 1".to_string(),
            ));
        }

        if matches!(self.terrain.mode, HeightMode::Heightmap | HeightMode::Hybrid)
            && self.terrain.heightmap_path.is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "{:?} mode needs heightmap_path",
                self.terrain.mode
            )));
        }

        let tex = &self.texturing;
        if tex.use_biome_map && tex.biome_map_path.is_none() {
            return Err(ConfigError::Invalid(
                "use_biome_map is set but biome_map_path is missing".to_string(),
            ));
        }
        if tex.texture_heights.is_empty() {
            return Err(ConfigError::Invalid("texture_heights is empty".to_string()));
        }
        if tex.texture_ids.len() < tex.texture_heights.len() {
            return Err(ConfigError::Invalid(format!(
                "texture_ids has {} entries, need at least {}",
                tex.texture_ids.len(),
                tex.texture_heights.len()
            )));
        }
        if tex
            .texture_heights
            .iter()
            .any(|h| !(0.0..=1.0).contains(h))
            || tex.texture_heights.windows(2).any(|w| w[1] < w[0])
        {
            return Err(ConfigError::Invalid(
                "texture_heights must be ascending and within [0, 1]".to_string(),
            ));
        }
        if let Some(id) = tex
            .texture_ids
            .iter()
            .chain(std::iter::once(&tex.slope_texture))
            .find(|id| **id as usize >= TEXTURE_SLOTS)
        {
            return Err(ConfigError::Invalid(format!(
                "texture id {id} out of range (max {})",
                TEXTURE_SLOTS - 1
            )));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("planet.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `planet.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("planet.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("planet.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
