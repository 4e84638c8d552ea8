//! Headless driver: loads (or builds) a set of splines, sweeps their tubes
//! to completion and reports what a renderer would receive.
//!
//! Usage: `curvecraft [CURVES_JSON] [--config CONFIG_JSON] [--save OUT_JSON]`

use std::path::PathBuf;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};

use curvecraft::config::{load_config_from_file, ConfigError, EngineConfig};
use curvecraft::curve::CurveError;
use curvecraft::render::{self, TubeMeshCache};
use curvecraft::scene::serialization::{
    load_curves_from_file, save_curves_to_file, SerializationError,
};
use curvecraft::scene::CurveRegistry;

const SYNC_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Curve(#[from] CurveError),
}

#[derive(Debug, Default)]
struct Args {
    curves: Option<PathBuf>,
    config: Option<PathBuf>,
    save: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, AppError> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "--save" => {
                let value = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| AppError::Usage(format!("{} needs a path", arg)))?;
                if arg == "--config" {
                    parsed.config = Some(value);
                } else {
                    parsed.save = Some(value);
                }
            }
            flag if flag.starts_with("--") => {
                return Err(AppError::Usage(format!("unknown option {}", flag)));
            }
            _ if parsed.curves.is_none() => parsed.curves = Some(PathBuf::from(arg)),
            _ => return Err(AppError::Usage(format!("unexpected argument {}", arg))),
        }
    }
    Ok(parsed)
}

fn populate(registry: &mut CurveRegistry, curves: Option<&PathBuf>) -> Result<(), AppError> {
    match curves {
        Some(path) => {
            let data = load_curves_from_file(path)?;
            registry.extend_from_data(&data)?;
        }
        None => {
            log::info!("No curve file given, using the sample spline");
            registry.add_spline(&[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(5.0, 5.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
                Vec3::new(0.0, 15.0, 0.0),
            ])?;
        }
    }
    Ok(())
}

fn sweep_tubes(registry: &mut CurveRegistry, config: &EngineConfig) -> TubeMeshCache {
    let mut cache = TubeMeshCache::new();
    let started = Instant::now();
    loop {
        let stats = render::sync_tubes(registry, &mut cache, config.tube.tick_count);
        if stats.is_settled() {
            break;
        }
        if started.elapsed() > SYNC_TIMEOUT {
            log::warn!("{} tubes still pending after {:?}", stats.pending, SYNC_TIMEOUT);
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    log::info!(
        "Swept {} tubes ({} triangles) in {:.1?}",
        cache.len(),
        cache.total_triangles(),
        started.elapsed()
    );
    cache
}

/// Clicks the middle of a viewport looking straight at the first curve's
/// midpoint.
fn demo_pick(registry: &mut CurveRegistry, config: &EngineConfig) {
    let Some(id) = registry.ids().first().copied() else {
        return;
    };
    let Some(target) = registry.curve_mut(id).and_then(|curve| {
        let patch_count = curve.patches().len() as f32;
        curve.value_at(patch_count * 0.5)
    }) else {
        return;
    };
    let view = Mat4::look_at_rh(target + Vec3::Z * 20.0, target, Vec3::Y);
    let projection = Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0);
    let Some(ray) = render::ray_from_screen(640.0, 360.0, 1280.0, 720.0, view, projection) else {
        return;
    };
    match render::pick(registry, &ray, &config.picking) {
        Some(hit) => log::info!("Pick at screen center hit {:?}", hit),
        None => log::info!("Pick at screen center hit nothing"),
    }
}

fn run() -> Result<(), AppError> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => load_config_from_file(path)?,
        None => EngineConfig::default(),
    };
    log::info!("Config: {:?}", config);

    let mut registry =
        CurveRegistry::with_defaults(config.tube.default_radius, config.tube.default_sector_count)?;
    populate(&mut registry, args.curves.as_ref())?;

    sweep_tubes(&mut registry, &config);
    for id in registry.ids() {
        if let Some(curve) = registry.curve_mut(id) {
            let length = curve.length(config.length_epsilon);
            let patches = curve.patches().len();
            log::info!("Curve {:?}: {} patches, length {:.3}", id, patches, length);
        }
    }
    demo_pick(&mut registry, &config);

    if let Some(path) = &args.save {
        save_curves_to_file(&registry.to_data(), path)?;
        log::info!("Saved {} curves to {}", registry.len(), path.display());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
