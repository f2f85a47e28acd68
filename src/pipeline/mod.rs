//! Frame Analysis Pipeline
//!
//! Pulls the newest frame from the [`FrameSlot`], dispatches OCR for it and
//! runs the completed result through the plate extractor. A found plate goes
//! to the display; anything else leaves the display as it was.
//!
//! OCR tasks are never cancelled. With more than one task in flight, results
//! can complete out of capture order and the display shows whichever plate
//! completed last.

pub mod slot;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::CapturedFrame;
use crate::display::PlateDisplay;
use crate::plate::{Extraction, PlateExtractor, PlateMatch};
use crate::vision::{OcrEngine, OcrError, OcrTask, RecognizedText};

pub use slot::FrameSlot;

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// OCR tasks allowed to run at once
    pub max_in_flight: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_in_flight: 1 }
    }
}

/// What became of a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame had no image and was not sent to OCR
    Skipped,
    /// OCR failed; the frame contributes nothing
    OcrFailed,
    /// OCR found no text
    NoText,
    /// Text found but it is not a plate
    NoMatch,
    /// A plate was found and sent to the display
    Displayed(PlateMatch),
}

/// Running counters for the pipeline
#[derive(Debug, Default)]
pub struct PipelineStats {
    analyzed: AtomicU64,
    skipped: AtomicU64,
    ocr_failures: AtomicU64,
    no_text: AtomicU64,
    no_match: AtomicU64,
    plates: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames sent to OCR
    pub analyzed: u64,
    /// Frames without an image
    pub skipped: u64,
    pub ocr_failures: u64,
    pub no_text: u64,
    pub no_match: u64,
    /// Plates sent to the display
    pub plates: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            analyzed: self.analyzed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            ocr_failures: self.ocr_failures.load(Ordering::Relaxed),
            no_text: self.no_text.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            plates: self.plates.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &FrameOutcome) {
        let counter = match outcome {
            FrameOutcome::Skipped => &self.skipped,
            FrameOutcome::OcrFailed => &self.ocr_failures,
            FrameOutcome::NoText => &self.no_text,
            FrameOutcome::NoMatch => &self.no_match,
            FrameOutcome::Displayed(_) => &self.plates,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Turns finished OCR results into display updates
#[derive(Clone)]
struct CompletionHandler {
    extractor: Arc<PlateExtractor>,
    display: Arc<dyn PlateDisplay>,
    stats: Arc<PipelineStats>,
}

impl CompletionHandler {
    fn complete(&self, sequence: u64, result: Result<RecognizedText, OcrError>) -> FrameOutcome {
        let outcome = match result {
            Err(e) => {
                warn!("OCR failed for frame {}: {}", sequence, e);
                FrameOutcome::OcrFailed
            }
            Ok(text) => match self.extractor.extract(&text) {
                Extraction::NoText => {
                    debug!("Frame {}: no text recognized", sequence);
                    FrameOutcome::NoText
                }
                Extraction::NoMatch { normalized } => {
                    debug!("Frame {}: {:?} is not a plate", sequence, normalized);
                    FrameOutcome::NoMatch
                }
                Extraction::Plate(plate) => {
                    debug!("Frame {}: plate {}", sequence, plate);
                    self.display.show(&plate);
                    FrameOutcome::Displayed(plate)
                }
            },
        };
        self.stats.record(&outcome);
        outcome
    }
}

/// Single-worker frame analysis pipeline
#[derive(Clone)]
pub struct FramePipeline {
    engine: Arc<dyn OcrEngine>,
    handler: CompletionHandler,
    config: PipelineConfig,
}

impl FramePipeline {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        display: Arc<dyn PlateDisplay>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_extractor(engine, display, PlateExtractor::default(), config)
    }

    pub fn with_extractor(
        engine: Arc<dyn OcrEngine>,
        display: Arc<dyn PlateDisplay>,
        extractor: PlateExtractor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            engine,
            handler: CompletionHandler {
                extractor: Arc::new(extractor),
                display,
                stats: Arc::new(PipelineStats::default()),
            },
            config,
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.handler.stats.clone()
    }

    /// Analyze one frame and wait for its outcome
    pub async fn process_frame(&self, frame: CapturedFrame) -> FrameOutcome {
        let task = match self.dispatch(frame) {
            Ok(task) => task,
            Err(outcome) => return outcome,
        };

        let sequence = task.sequence();
        let handler = self.handler.clone();
        match task
            .on_complete(move |sequence, result| handler.complete(sequence, result))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Completion for frame {} did not finish: {}", sequence, e);
                FrameOutcome::OcrFailed
            }
        }
    }

    /// Start OCR for `frame`, or report why it was skipped
    fn dispatch(&self, frame: CapturedFrame) -> Result<OcrTask, FrameOutcome> {
        if frame.is_empty() {
            debug!("Frame {} has no image, skipping", frame.sequence);
            let outcome = FrameOutcome::Skipped;
            self.handler.stats.record(&outcome);
            return Err(outcome);
        }

        let waited = frame.timestamp.elapsed();
        self.handler.stats.analyzed.fetch_add(1, Ordering::Relaxed);
        let task = OcrTask::spawn(self.engine.clone(), frame);
        debug!("OCR started for frame {} ({:?} after capture)", task.sequence(), waited);
        Ok(task)
    }

    /// Analyze frames from `slot` until it is closed or `shutdown` fires,
    /// then wait for in-flight OCR to finish.
    pub async fn run(&self, slot: Arc<FrameSlot>, shutdown: CancellationToken) -> StatsSnapshot {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        info!(
            "Frame pipeline started ({} OCR, {} in flight, shapes: {})",
            self.engine.name(),
            self.config.max_in_flight.max(1),
            self.handler.extractor.shape_names().join(", ")
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                frame = slot.next() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let pipeline = self.clone();
            in_flight.retain(|handle| !handle.is_finished());
            in_flight.push(tokio::spawn(async move {
                let sequence = frame.sequence;
                let outcome = pipeline.process_frame(frame).await;
                debug!("Frame {} finished: {:?}", sequence, outcome);
                drop(permit);
            }));
        }

        if slot.is_pending() {
            debug!("Stopping with an unanalyzed frame left in the slot");
        }
        debug!("Waiting for {} in-flight OCR tasks", in_flight.len());
        for handle in in_flight {
            let _ = handle.await;
        }

        let snapshot = self.stats().snapshot();
        info!(
            "Frame pipeline stopped: {} analyzed, {} plates",
            snapshot.analyzed, snapshot.plates
        );
        snapshot
    }
}
