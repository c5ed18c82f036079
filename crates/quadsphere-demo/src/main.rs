//! Headless quadsphere driver.
//!
//! Loads `planet.ron` (created with defaults on first run), applies CLI
//! overrides and flies a scripted camera down to the surface and around the
//! planet against a recording render backend. LOD statistics are logged as
//! it goes.
//!
//! Run with `cargo run -p quadsphere-demo -- --radius 5000 --workers 2`.

use std::f64::consts::TAU;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use glam::{DQuat, DVec3, Mat4, Quat};
use quadsphere_config::{CliArgs, Config, LodModeBehindCam, config_dir};
use quadsphere_lod::{HeadlessBackend, PlanetLodManager, Viewer};
use tracing::{error, info};

const DESCENT_TICKS: u32 = 240;
const ORBIT_TICKS: u32 = 360;
const SETTLE_TICKS: u32 = 60;
const FRAME: Duration = Duration::from_millis(16);

/// Camera path: straight down onto the +Z face, then one low orbit around Y.
fn camera_at(tick: u32, radius: f64) -> DVec3 {
    let start = radius * 4.0;
    let low = radius * 1.01;
    if tick < DESCENT_TICKS {
        let t = f64::from(tick) / f64::from(DESCENT_TICKS);
        // Ease out so most of the time is spent near the surface.
        let height = start + (low - start) * (1.0 - (1.0 - t).powi(3));
        return DVec3::Z * height;
    }
    let t = f64::from((tick - DESCENT_TICKS).min(ORBIT_TICKS)) / f64::from(ORBIT_TICKS);
    DQuat::from_rotation_y(t * TAU) * (DVec3::Z * low)
}

fn viewer_at(position: DVec3, frustum: bool) -> Viewer {
    let viewer = Viewer::at(position);
    if !frustum {
        return viewer;
    }
    let eye = position.as_vec3();
    let view = Mat4::look_at_rh(eye, glam::Vec3::ZERO, glam::Vec3::Y);
    let proj = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 1.0, 1.0e7);
    let rotation = Quat::from_mat4(&view.inverse());
    viewer.with_view_projection(rotation, proj * view)
}

fn run(config: &Config) -> Result<(), quadsphere_lod::LodError> {
    let mut manager = PlanetLodManager::new(config, HeadlessBackend::new())?;
    let radius = manager.radius();
    let frustum = config.planet.lod_mode_behind_camera == LodModeBehindCam::NotComputed;
    let interval = config.debug.stats_interval_ticks.max(1);

    info!(
        "Flying {} ticks around a planet of radius {radius}",
        DESCENT_TICKS + ORBIT_TICKS + SETTLE_TICKS
    );
    for tick in 0..DESCENT_TICKS + ORBIT_TICKS + SETTLE_TICKS {
        let position = camera_at(tick, radius);
        manager.tick(&viewer_at(position, frustum));

        if tick % interval == 0 {
            let stats = manager.stats();
            info!(
                "tick {tick}: altitude {:.1}, {} quads ({} leaves, max level {}), {} proxies, {} splitting, {} queued, {} jobs pending",
                position.length() - radius,
                stats.quads,
                stats.leaves,
                stats.max_level,
                stats.proxies,
                stats.splitting,
                stats.queued_splits,
                stats.pending_jobs
            );
        }
        std::thread::sleep(FRAME);
    }

    let stats = manager.stats();
    let counts = manager.backend().counts();
    info!(
        "Done: {} quads, {} visible proxies, {} stale results, {} failed builds, {} sync fallbacks",
        stats.quads,
        manager.backend().visible_count(),
        stats.stale_results,
        stats.failed_builds,
        stats.sync_fallbacks
    );
    info!(
        "Backend calls: {} created, {} reused, {} meshes set, {} hidden, {} released",
        counts.created, counts.updated, counts.meshes_set, counts.hidden, counts.released
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let Some(config_dir) = args.config.clone().or_else(config_dir) else {
        eprintln!("No config directory available, pass --config");
        return ExitCode::FAILURE;
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    quadsphere_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
