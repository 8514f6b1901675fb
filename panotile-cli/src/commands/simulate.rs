//! Simulate command - drive a cube panorama headlessly.
//!
//! Opens the six faces, auto-rotates the camera at a fixed frame rate and
//! lets the caches, fetches and LOD monitor run as they would under a real
//! renderer. Cache and LOD statistics are logged once per second.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use panotile::cache::{CacheStats, ImageCacheConfig, TextureCacheConfig};
use panotile::config::ConfigFile;
use panotile::filesystem::FileSystemKind;
use panotile::loader::ResourceLoader;
use panotile::lod::RenderCause;
use panotile::render::{CompositorRenderer, MeshRenderer, Renderer, RendererKind, Viewport};
use panotile::{run_hq_timer, PanoramaConfig, VrPanorama};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{resolve_source, FileSystemArg, RendererArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub base: Option<String>,
    pub filesystem: Option<FileSystemArg>,
    pub renderer: RendererArg,
    pub frames: Option<u64>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

/// What a finished simulation reports.
struct Summary {
    frames: u64,
    elapsed: Duration,
    stats: CacheStats,
    magnification: f64,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("simulate");
    let config = runner.config();

    let (base, kind) = resolve_source(args.base.clone(), args.filesystem, config)?;
    let loader = runner.loader()?;
    let viewport = Viewport::new(f64::from(args.width), f64::from(args.height));

    println!("Simulating panorama {}", style(&base).cyan());
    println!("  Renderer:  {}", RendererKind::from(args.renderer));
    println!("  Viewport:  {} x {}", args.width, args.height);
    println!("  Frames:    {}", args.frames.map_or("until Ctrl+C".to_string(), |n| n.to_string()));
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Set up signal handler for graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let summary = match args.renderer {
        RendererArg::Mesh => {
            let renderer =
                MeshRenderer::with_cache_config(viewport, TextureCacheConfig::from_settings(&config.cache));
            runner.block_on(simulate(renderer, kind, &base, loader, config, &args, shutdown))?
        }
        RendererArg::Compositor => {
            let renderer = CompositorRenderer::with_cache_config(
                viewport,
                ImageCacheConfig::from_settings(&config.cache),
            );
            runner.block_on(simulate(renderer, kind, &base, loader, config, &args, shutdown))?
        }
    };

    print_summary(&summary);
    Ok(())
}

async fn simulate<R: Renderer>(
    renderer: R,
    kind: FileSystemKind,
    base: &str,
    loader: ResourceLoader,
    config: &ConfigFile,
    args: &SimulateArgs,
    shutdown: Arc<AtomicBool>,
) -> Result<Summary, CliError> {
    let panorama_config = PanoramaConfig::from_config_file(config);
    let hq_interval = panorama_config
        .lod
        .as_ref()
        .map_or(Duration::from_secs(1), |lod| lod.hq_render_interval);

    let mut panorama = VrPanorama::open(kind, base, renderer, loader, panorama_config).await?;

    let cancellation = CancellationToken::new();
    let (hq_timer, mut hq_ticks) = run_hq_timer(hq_interval, cancellation.clone());

    let mut frame_timer = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1))));
    frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report_timer = tokio::time::interval(Duration::from_secs(1));
    report_timer.tick().await;

    let started = Instant::now();
    panorama.view_mut().auto_rotate(started);
    panorama.render(RenderCause::Interaction);
    let mut frames: u64 = 1;

    while !shutdown.load(Ordering::SeqCst) && args.frames.map_or(true, |limit| frames < limit) {
        tokio::select! {
            _ = frame_timer.tick() => {
                panorama.animate(Instant::now());
                panorama.pump();
                frames += 1;
            }
            Some(now) = hq_ticks.recv() => {
                panorama.hq_tick(now);
            }
            _ = report_timer.tick() => {
                let stats = panorama.stats();
                let lod_state = panorama.lod().map(|lod| lod.state().to_string());
                info!(
                    frames,
                    yaw = panorama.view().yaw(),
                    magnification = panorama.magnification(),
                    lod = lod_state.as_deref().unwrap_or("off"),
                    hits = stats.hits,
                    misses = stats.misses,
                    fetches = stats.requests,
                    loaded = stats.insertions,
                    evicted = stats.evictions,
                    "Simulation progress"
                );
            }
        }
    }

    cancellation.cancel();
    let _ = hq_timer.await;

    let summary = Summary {
        frames,
        elapsed: started.elapsed(),
        stats: panorama.stats(),
        magnification: panorama.magnification(),
    };
    panorama.dispose();
    Ok(summary)
}

fn print_summary(summary: &Summary) {
    let seconds = summary.elapsed.as_secs_f64();
    let fps = if seconds > 0.0 {
        summary.frames as f64 / seconds
    } else {
        0.0
    };

    println!();
    println!("{}", style("Simulation Summary").bold());
    println!("==================");
    println!("  Frames:         {} in {:.1}s ({:.1} fps)", summary.frames, seconds, fps);
    println!("  Magnification:  {:.2}", summary.magnification);
    println!("  Cache:          {}", summary.stats);
}
