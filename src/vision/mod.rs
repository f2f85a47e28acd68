//! Vision/OCR Layer
//!
//! Runs text recognition on captured frames. Supports multiple OCR backends:
//! - Tesseract CLI (live recognition)
//! - Transcript replay (pre-recorded OCR results stored next to each frame)

pub mod replay;
pub mod tesseract;
pub mod text;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::capture::{CapturedFrame, Rotation};

pub use replay::ReplayOcr;
pub use tesseract::TesseractOcr;
pub use text::{RecognizedText, TextBlock, TextElement, TextLine};

/// Errors reported by OCR engines
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("frame has no image data")]
    EmptyImage,
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
    #[error("OCR processing failed: {0}")]
    Processing(String),
    #[error("malformed OCR output: {0}")]
    MalformedOutput(String),
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR task did not complete: {0}")]
    Task(String),
}

/// OCR backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// Tesseract command-line engine
    #[default]
    Tesseract,
    /// Replay OCR transcripts stored next to each frame
    Replay,
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine to run
    pub backend: OcrBackend,
    /// Path or name of the tesseract executable
    pub tesseract_path: PathBuf,
    /// Tesseract language pack
    pub language: String,
    /// Tesseract page segmentation mode
    pub page_segmentation_mode: u32,
    /// Restrict recognition to these characters
    pub char_whitelist: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Tesseract,
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: 3,
            char_whitelist: None,
        }
    }
}

/// An OCR engine: image plus rotation in, recognized text out
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Recognize the text in `frame`, which must be rotated by `rotation`
    /// to be upright
    async fn recognize(
        &self,
        frame: &CapturedFrame,
        rotation: Rotation,
    ) -> Result<RecognizedText, OcrError>;
}

/// Create the engine selected by `config`
pub fn build_engine(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>> {
    let engine: Arc<dyn OcrEngine> = match config.backend {
        OcrBackend::Tesseract => Arc::new(TesseractOcr::new(config)),
        OcrBackend::Replay => Arc::new(ReplayOcr::new()),
    };
    info!("Using {} OCR backend", engine.name());
    Ok(engine)
}

/// A recognition running in the background
///
/// Completion is observed either by awaiting [`outcome`](Self::outcome) or by
/// registering a callback with [`on_complete`](Self::on_complete).
pub struct OcrTask {
    sequence: u64,
    handle: JoinHandle<Result<RecognizedText, OcrError>>,
}

impl OcrTask {
    /// Start recognizing `frame` with its own rotation hint
    pub fn spawn(engine: Arc<dyn OcrEngine>, frame: CapturedFrame) -> Self {
        let sequence = frame.sequence;
        let handle = tokio::spawn(async move {
            let rotation = frame.rotation;
            engine.recognize(&frame, rotation).await
        });
        Self { sequence, handle }
    }

    /// Sequence number of the frame being recognized
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wait for the recognition result
    pub async fn outcome(self) -> Result<RecognizedText, OcrError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(OcrError::Task(e.to_string())),
        }
    }

    /// Run `callback` with the result once recognition completes. The
    /// returned handle resolves to whatever the callback returns.
    pub fn on_complete<F, T>(self, callback: F) -> JoinHandle<T>
    where
        F: FnOnce(u64, Result<RecognizedText, OcrError>) -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(async move {
            let sequence = self.sequence;
            callback(sequence, self.outcome().await)
        })
    }
}
