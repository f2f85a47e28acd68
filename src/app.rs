//! Application Coordinator
//!
//! Wires the capture thread, the analysis pipeline and the display together
//! and manages their lifecycle.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::capture::{CaptureSummary, DirectorySource, FrameCapture, FrameSource};
use crate::config::AppConfig;
use crate::display::{ConsoleDisplay, PlateDisplay};
use crate::pipeline::{FramePipeline, FrameSlot, StatsSnapshot};
use crate::plate::PlateMatch;
use crate::shared::DisplayedPlate;
use crate::vision::{build_engine, OcrEngine};

/// Totals reported at the end of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub capture: CaptureSummary,
    pub pipeline: StatsSnapshot,
    /// Frames accepted by the slot
    pub offered_frames: u64,
    /// Frames replaced in the slot before they could be analyzed
    pub dropped_frames: u64,
    pub last_plate: Option<PlateMatch>,
}

/// Main application coordinator
pub struct PlateReaderApp {
    config: AppConfig,
    displayed: DisplayedPlate,
    capture: FrameCapture,
    pipeline: FramePipeline,
    shutdown: CancellationToken,
}

impl PlateReaderApp {
    /// Create the application with the configured OCR engine and a console
    /// display
    pub fn new(config: AppConfig) -> Result<Self> {
        let engine = build_engine(&config.ocr)?;
        let displayed = DisplayedPlate::new();
        let display = Arc::new(ConsoleDisplay::new(displayed.clone()));
        Ok(Self::with_parts(config, engine, display, displayed))
    }

    /// Create the application from explicit collaborators
    pub fn with_parts(
        config: AppConfig,
        engine: Arc<dyn OcrEngine>,
        display: Arc<dyn PlateDisplay>,
        displayed: DisplayedPlate,
    ) -> Self {
        let pipeline = FramePipeline::new(engine, display, config.pipeline.clone());
        let capture = FrameCapture::new(config.capture.clone());

        Self {
            config,
            displayed,
            capture,
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }

    /// Build the frame source described by the capture settings
    pub fn open_source(&self) -> Result<Box<dyn FrameSource>> {
        let dir = self
            .config
            .capture
            .source_dir
            .as_deref()
            .context("No frame source configured (use --source or capture.source_dir)")?;
        let source = DirectorySource::open(dir, &self.config.capture)?;
        Ok(Box::new(source))
    }

    /// Token that stops the run when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Capture and analyze frames until the source is exhausted or the
    /// shutdown token fires. Each run gets a fresh frame slot.
    pub async fn run(&mut self, source: Box<dyn FrameSource>) -> Result<RunSummary> {
        let slot = Arc::new(FrameSlot::new());
        self.capture.start(source, slot.clone())?;

        let pipeline = self.pipeline.run(slot.clone(), self.shutdown.clone()).await;
        let capture = self.capture.stop().unwrap_or_default();

        let summary = RunSummary {
            capture,
            pipeline,
            offered_frames: slot.offered(),
            dropped_frames: slot.dropped(),
            last_plate: self.displayed.current(),
        };
        info!(
            "Run complete: {} frames captured, {} offered, {} dropped, {} analyzed, {} plates",
            summary.capture.delivered,
            summary.offered_frames,
            summary.dropped_frames,
            summary.pipeline.analyzed,
            summary.pipeline.plates
        );
        debug!(
            "Frames without a plate: {} skipped, {} OCR failures, {} without text, {} not matching",
            summary.pipeline.skipped,
            summary.pipeline.ocr_failures,
            summary.pipeline.no_text,
            summary.pipeline.no_match
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::matcher::PlateShape;
    use crate::vision::{OcrBackend, ReplayOcr};
    use image::{Rgba, RgbaImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, transcript: Option<&str>) {
        let path = dir.join(format!("{name}.png"));
        RgbaImage::from_pixel(8, 4, Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();
        if let Some(text) = transcript {
            std::fs::write(dir.join(format!("{name}.txt")), text).unwrap();
        }
    }

    fn replay_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.capture.source_dir = Some(dir.to_path_buf());
        config.capture.max_fps = 50;
        config.ocr.backend = OcrBackend::Replay;
        config
    }

    #[tokio::test]
    async fn test_replayed_session_keeps_last_plate() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "frame_001", Some("  A-B#C 1*2 3 4 "));
        write_frame(dir.path(), "frame_002", Some("BRASIL"));
        write_frame(dir.path(), "frame_003", None);

        let mut app = PlateReaderApp::new(replay_config(dir.path())).unwrap();
        let source = app.open_source().unwrap();
        let summary = app.run(source).await.unwrap();

        assert_eq!(summary.capture.delivered, 3);
        assert_eq!(summary.offered_frames, 3);
        assert_eq!(
            summary.pipeline.analyzed + summary.dropped_frames,
            3,
            "every frame is either analyzed or replaced"
        );
        let last = summary.last_plate.unwrap();
        assert_eq!(last.plate, "ABC1234");
        assert_eq!(last.shape, PlateShape::Legacy);
    }

    #[tokio::test]
    async fn test_app_runs_twice() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "only", Some("XYZ9876"));

        let mut app = PlateReaderApp::new(replay_config(dir.path())).unwrap();
        for run in 1..=2u64 {
            let source = app.open_source().unwrap();
            let summary = app.run(source).await.unwrap();
            assert_eq!(summary.offered_frames, 1);
            // Pipeline counters accumulate across runs
            assert_eq!(summary.pipeline.analyzed, run);
        }
        assert_eq!(app.displayed.current_text().as_deref(), Some("XYZ9876"));
    }

    #[tokio::test]
    async fn test_mercosul_overwrites_legacy() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "a", Some("ABC1234"));
        write_frame(dir.path(), "b", Some("BRA 2E19"));

        let mut config = replay_config(dir.path());
        config.capture.max_fps = 5;
        let displayed = DisplayedPlate::new();
        let mut app = PlateReaderApp::with_parts(
            config,
            Arc::new(ReplayOcr::new()),
            Arc::new(displayed.clone()),
            displayed.clone(),
        );

        let source = app.open_source().unwrap();
        let summary = app.run(source).await.unwrap();

        assert_eq!(summary.pipeline.plates, 2);
        assert_eq!(displayed.current_text().as_deref(), Some("BRA2E19"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_looping_source() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "loop", Some("ABC1D23"));

        let mut config = replay_config(dir.path());
        config.capture.looping = true;
        let mut app = PlateReaderApp::new(config).unwrap();
        let token = app.shutdown_token();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            token.cancel();
        });

        let source = app.open_source().unwrap();
        let summary = app.run(source).await.unwrap();
        assert!(summary.pipeline.plates >= 1);
        assert_eq!(summary.last_plate.map(|p| p.plate).as_deref(), Some("ABC1D23"));
    }

    #[test]
    fn test_missing_source_dir() {
        let app = PlateReaderApp::new(AppConfig::default()).unwrap();
        assert!(app.open_source().is_err());
    }
}
