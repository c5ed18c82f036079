//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, HeightMode, UvMode};

/// Quadsphere command-line arguments.
///
/// CLI values override settings loaded from `planet.ron`.
#[derive(Parser, Debug)]
#[command(name = "quadsphere", about = "Quadtree cube-sphere terrain")]
pub struct CliArgs {
    /// Planet radius.
    #[arg(long)]
    pub radius: Option<f32>,

    /// Elevation source (heightmap, noise, hybrid, const).
    #[arg(long, value_parser = parse_height_mode)]
    pub mode: Option<HeightMode>,

    /// UV layout (cube, quad, legacy, legacy-continuous).
    #[arg(long, value_parser = parse_uv_mode)]
    pub uv: Option<UvMode>,

    /// Raw heightmap file.
    #[arg(long)]
    pub heightmap: Option<PathBuf>,

    /// RON noise graph file.
    #[arg(long)]
    pub noise_graph: Option<PathBuf>,

    /// Mesh worker threads (0 builds inline).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Quads allowed to split at once.
    #[arg(long)]
    pub splitting: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_height_mode(s: &str) -> Result<HeightMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "heightmap" => Ok(HeightMode::Heightmap),
        "noise" => Ok(HeightMode::Noise),
        "hybrid" => Ok(HeightMode::Hybrid),
        "const" => Ok(HeightMode::Const),
        other => Err(format!("unknown height mode '{other}'")),
    }
}

fn parse_uv_mode(s: &str) -> Result<UvMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "cube" => Ok(UvMode::Cube),
        "quad" => Ok(UvMode::Quad),
        "legacy" => Ok(UvMode::Legacy),
        "legacy-continuous" => Ok(UvMode::LegacyContinuous),
        other => Err(format!("unknown uv mode '{other}'")),
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(radius) = args.radius {
            self.planet.radius = radius;
        }
        if let Some(mode) = args.mode {
            self.terrain.mode = mode;
        }
        if let Some(uv) = args.uv {
            self.planet.uv_type = uv;
        }
        if let Some(ref path) = args.heightmap {
            self.terrain.heightmap_path = Some(path.clone());
        }
        if let Some(ref path) = args.noise_graph {
            self.terrain.noise_graph_path = Some(path.clone());
        }
        if let Some(workers) = args.workers {
            self.mesh.worker_threads = workers;
        }
        if let Some(splitting) = args.splitting {
            self.planet.quads_splitting_simultaneously = splitting;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
