//! plate-reader - live license-plate reader
//!
//! Runs every captured frame through OCR and shows the most recent text that
//! reads as a Legacy (ABC1234) or Mercosul (ABC1D23) plate.

mod app;
mod capture;
mod config;
mod display;
mod pipeline;
mod plate;
mod shared;
mod vision;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::PlateReaderApp;
use crate::config::AppConfig;
use crate::vision::{OcrBackend, TesseractOcr};

/// plate-reader - extract license plates from a frame stream
#[derive(Parser, Debug)]
#[command(name = "plate-reader")]
#[command(about = "Reads Legacy and Mercosul license plates from camera frames via OCR")]
struct Args {
    /// Directory of frames to analyze
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OCR backend
    #[arg(short, long, value_enum)]
    backend: Option<OcrBackend>,

    /// Rotation of the frames in degrees (0, 90, 180 or 270)
    #[arg(short, long)]
    rotation: Option<i32>,

    /// Maximum frames per second to deliver
    #[arg(long)]
    fps: Option<u32>,

    /// Replay the source directory forever
    #[arg(long = "loop")]
    looping: bool,

    /// OCR tasks allowed to run at once
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Write the default configuration file and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.write_default_config {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => config::default_config_path()?,
        };
        config::save_config(&AppConfig::default(), &path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = load_or_create_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    info!("plate-reader starting...");

    if config.ocr.backend == OcrBackend::Tesseract
        && !TesseractOcr::new(&config.ocr).is_available().await
    {
        warn!(
            "{} could not be launched; every frame will fail OCR",
            config.ocr.tesseract_path.display()
        );
    }

    let mut app = PlateReaderApp::new(config)?;
    let source = app.open_source()?;

    let shutdown = app.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            shutdown.cancel();
        }
    });

    let summary = app.run(source).await?;
    match summary.last_plate {
        Some(plate) => info!("Last plate: {} ({})", plate, plate.shape),
        None => info!("No plate detected"),
    }

    info!("plate-reader shutdown complete");

    Ok(())
}

/// Load configuration from the given file, the default location, or defaults
fn load_or_create_config(explicit: Option<&std::path::Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = config::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring configuration file: {:#}", e),
            }
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Command-line flags take precedence over the configuration file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(source) = &args.source {
        config.capture.source_dir = Some(source.clone());
    }
    if let Some(backend) = args.backend {
        config.ocr.backend = backend;
    }
    if let Some(rotation) = args.rotation {
        config.capture.rotation_degrees = rotation;
    }
    if let Some(fps) = args.fps {
        config.capture.max_fps = fps;
    }
    if args.looping {
        config.capture.looping = true;
    }
    if let Some(max_in_flight) = args.max_in_flight {
        config.pipeline.max_in_flight = max_in_flight;
    }
}
