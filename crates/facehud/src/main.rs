use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use facehud_core::analyzer::OnnxAnalyzer;
use facehud_core::gallery::{build_gallery, GalleryBuild};
use facehud_core::matcher::NearestMatcher;
use facehud_core::models::ModelBundle;
use facehud_hw::Camera;
use facehud_overlay::OverlaySurface;

mod config;
mod engine;
mod loader;
mod manifest;
mod sink;

use config::Config;
use engine::{EngineSettings, OverlapPolicy};
use loader::HttpImageLoader;
use sink::SnapshotSink;

#[derive(Parser)]
#[command(name = "facehud", about = "Live webcam face annotation HUD")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live annotation loop
    Run {
        /// Gallery manifest (TOML) path
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// V4L2 device path (e.g., /dev/video0)
        #[arg(short, long)]
        device: Option<String>,
        /// Tick period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
        /// What to do when a tick fires while the previous one is running
        #[arg(long, value_enum)]
        overlap: Option<OverlapPolicy>,
    },
    /// Build the reference gallery and print the per-entry report
    Gallery {
        /// Gallery manifest (TOML) path
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// List capture devices
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Run { manifest, device, interval_ms, overlap } => {
            if let Some(path) = manifest {
                config.manifest_path = path;
            }
            if let Some(device) = device {
                config.camera_device = device;
            }
            if let Some(ms) = interval_ms {
                config.tick_interval = std::time::Duration::from_millis(ms);
            }
            if let Some(policy) = overlap {
                config.overlap = policy;
            }
            run(config).await
        }
        Commands::Gallery { manifest } => {
            if let Some(path) = manifest {
                config.manifest_path = path;
            }
            gallery_report(config).await
        }
        Commands::Probe => probe(),
    }
}

/// Startup-heavy work on a blocking thread: model loads, then the
/// sequential gallery build. The gallery is complete before the first tick
/// is ever scheduled.
async fn startup(config: &Config) -> Result<(OnnxAnalyzer, GalleryBuild)> {
    let specs = manifest::load(&config.manifest_path)?;
    let model_dir = config.model_dir.clone();

    tokio::task::spawn_blocking(move || -> Result<(OnnxAnalyzer, GalleryBuild)> {
        let bundle = ModelBundle::load_all(&model_dir).context("model load failed")?;
        let mut analyzer = OnnxAnalyzer::new(bundle);
        let loader = HttpImageLoader::new()?;
        let build = build_gallery(&specs, &mut analyzer, &loader);
        Ok((analyzer, build))
    })
    .await
    .context("startup task panicked")?
}

async fn run(config: Config) -> Result<()> {
    let (analyzer, build) = startup(&config).await?;
    tracing::info!(
        enrolled = build.enrolled_count(),
        skipped = build.skipped_count(),
        labels = ?build.gallery.labels().collect::<Vec<_>>(),
        "gallery ready"
    );

    let camera = Camera::open(&config.camera_device, config.capture_width, config.capture_height)
        .context("camera unavailable")?;
    let display = config.display_dims((camera.width, camera.height));

    let font = facehud_overlay::load_font(&config.font_path).context("overlay font")?;
    let surface = OverlaySurface::new(display.0, display.1, Some(font));
    let snapshot = config.snapshot_path.clone().map(SnapshotSink::new);

    let handle = engine::spawn_engine(
        camera,
        analyzer,
        NearestMatcher::new(config.match_threshold),
        build.gallery,
        surface,
        EngineSettings {
            warmup_frames: config.warmup_frames,
            overlap: config.overlap,
            display,
            snapshot,
        },
    )
    .context("capture stream unavailable")?;

    tracing::info!(
        period_ms = config.tick_interval.as_millis() as u64,
        policy = %config.overlap,
        "annotation loop running; ctrl-c to stop"
    );

    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => handle.tick().await,
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("shutting down");
    tokio::task::spawn_blocking(move || handle.stop())
        .await
        .context("engine join panicked")?;
    Ok(())
}

async fn gallery_report(config: Config) -> Result<()> {
    let (_analyzer, build) = startup(&config).await?;

    println!("{}", serde_json::to_string_pretty(&build.outcomes)?);
    tracing::info!(
        enrolled = build.enrolled_count(),
        skipped = build.skipped_count(),
        "gallery build finished"
    );
    Ok(())
}

fn probe() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("no capture devices found");
        return Ok(());
    }
    for dev in devices {
        println!("{}\t{}\t{} ({})", dev.path, dev.name, dev.driver, dev.bus);
    }
    Ok(())
}
