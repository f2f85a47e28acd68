//! Frame Capture Layer
//!
//! Delivers frames to the analysis pipeline from a dedicated capture thread.
//! Frames come from a [`FrameSource`]; the bundled source replays a directory
//! of still images, which stands in for a live camera feed.

pub mod frame;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pipeline::FrameSlot;

pub use frame::{CapturedFrame, Rotation};

/// Image extensions picked up by [`DirectorySource`]
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Errors raised while producing frames
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no image frames found in {0}")]
    NoFrames(PathBuf),
    #[error("capture is already running")]
    AlreadyRunning,
    #[error("frame slot is already closed")]
    SlotClosed,
}

/// Frame capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory of frames to replay
    pub source_dir: Option<PathBuf>,
    /// Maximum frames per second to deliver
    pub max_fps: u32,
    /// Rotation reported with every frame, in degrees
    pub rotation_degrees: i32,
    /// Restart from the first frame once the directory is exhausted
    pub looping: bool,
    /// Frames larger than this on either side are scaled down
    pub max_dimension: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            max_fps: 30,
            rotation_degrees: 0,
            looping: false,
            max_dimension: 640,
        }
    }
}

impl CaptureConfig {
    pub fn rotation(&self) -> Rotation {
        Rotation::from_degrees(self.rotation_degrees)
    }

    /// Delay between two frames at the configured rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_fps.max(1) as f64)
    }
}

/// Command to control a running capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Stop,
}

/// Anything that can hand out frames one at a time
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Replays image files from a directory in file-name order
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    rotation: Rotation,
    looping: bool,
    max_dimension: u32,
}

impl DirectorySource {
    /// Scan `dir` for image files
    pub fn open(dir: &Path, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CaptureError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::NoFrames(dir.to_path_buf()));
        }

        info!(
            "Found {} frames in {:?} (rotation {} degrees)",
            files.len(),
            dir,
            config.rotation().degrees()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            position: 0,
            rotation: config.rotation(),
            looping: config.looping,
            max_dimension: config.max_dimension,
        })
    }

    /// Number of frame files in the directory
    pub fn len(&self) -> usize {
        self.files.len()
    }

    fn decode(&self, path: &Path) -> Result<CapturedFrame, CaptureError> {
        let mut image = image::open(path).map_err(|source| CaptureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let max = self.max_dimension;
        if max > 0 && (image.width() > max || image.height() > max) {
            debug!(
                "Scaling {:?} from {}x{} to fit {}",
                path,
                image.width(),
                image.height(),
                max
            );
            image = image.resize(max, max, FilterType::Triangle);
        }

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(CapturedFrame::new(rgba.into_raw(), width, height)
            .with_rotation(self.rotation)
            .with_source(path))
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        if self.position >= self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }

        let path = self.files[self.position].clone();
        self.position += 1;
        self.decode(&path).map(Some)
    }

    fn describe(&self) -> String {
        format!("directory {} ({} frames)", self.dir.display(), self.len())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Counts reported when a capture thread ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Frames handed to the slot
    pub delivered: u64,
    /// Frames the source failed to produce
    pub failed: u64,
}

/// Runs a [`FrameSource`] on its own thread, pacing frames into a [`FrameSlot`]
pub struct FrameCapture {
    config: CaptureConfig,
    command_tx: Option<Sender<CaptureCommand>>,
    handle: Option<JoinHandle<CaptureSummary>>,
}

impl FrameCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            command_tx: None,
            handle: None,
        }
    }

    /// Start capturing frames into `slot`. The slot is closed when the
    /// source runs out or the capture is stopped.
    pub fn start(
        &mut self,
        mut source: Box<dyn FrameSource>,
        slot: Arc<FrameSlot>,
    ) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }
        if slot.is_closed() {
            return Err(CaptureError::SlotClosed);
        }

        let (command_tx, command_rx) = unbounded();
        let interval = self.config.frame_interval();
        info!(
            "Starting capture from {} at {} fps",
            source.describe(),
            self.config.max_fps
        );

        let handle = std::thread::spawn(move || {
            let summary = run_capture(source.as_mut(), &slot, &command_rx, interval);
            slot.close();
            info!(
                "Capture thread exiting: {} frames delivered, {} failed",
                summary.delivered, summary.failed
            );
            summary
        });

        self.command_tx = Some(command_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the capture thread to stop and wait for it
    pub fn stop(&mut self) -> Option<CaptureSummary> {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }
        self.join()
    }

    /// Wait for the capture thread to finish on its own
    pub fn join(&mut self) -> Option<CaptureSummary> {
        let summary = self.handle.take().and_then(|h| h.join().ok());
        self.command_tx = None;
        summary
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for FrameCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    source: &mut dyn FrameSource,
    slot: &FrameSlot,
    commands: &Receiver<CaptureCommand>,
    interval: Duration,
) -> CaptureSummary {
    let mut summary = CaptureSummary::default();
    let mut sequence = 0u64;

    loop {
        match commands.try_recv() {
            Ok(CaptureCommand::Stop) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        let started = Instant::now();
        match source.next_frame() {
            Ok(Some(frame)) => {
                if slot.offer(frame.with_sequence(sequence)) {
                    debug!("Frame {} replaced an unanalyzed frame", sequence);
                }
                sequence += 1;
                summary.delivered += 1;
            }
            Ok(None) => {
                info!("Frame source exhausted");
                break;
            }
            Err(e) => {
                warn!("Skipping frame: {}", e);
                summary.failed += 1;
            }
        }

        let remaining = interval.saturating_sub(started.elapsed());
        match commands.recv_timeout(remaining) {
            Ok(CaptureCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    summary
}
