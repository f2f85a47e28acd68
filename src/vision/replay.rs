//! Transcript replay backend
//!
//! Looks up a pre-recorded OCR result next to each frame file, so a recorded
//! session can be re-run without an OCR engine installed. Lookup order for
//! `frame.png`:
//! 1. `frame.png.ocr.json`
//! 2. `frame.json`
//! 3. `frame.txt` (plain text, one line per OCR line)
//!
//! A frame with no transcript recognizes as empty text.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{OcrEngine, OcrError, RecognizedText};
use crate::capture::{CapturedFrame, Rotation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TranscriptKind {
    Json,
    Text,
}

/// Replays OCR transcripts stored beside the frame images
#[derive(Debug, Default)]
pub struct ReplayOcr;

impl ReplayOcr {
    pub fn new() -> Self {
        Self
    }

    /// Load the transcript for a frame file, if one exists
    pub async fn load(frame_path: &Path) -> Result<Option<RecognizedText>, OcrError> {
        for (path, kind) in transcript_candidates(frame_path) {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(OcrError::Io(e)),
            };

            debug!("Replaying transcript {:?}", path);
            let text = match kind {
                TranscriptKind::Json => serde_json::from_str(&content).map_err(|e| {
                    OcrError::MalformedOutput(format!("{}: {}", path.display(), e))
                })?,
                TranscriptKind::Text => {
                    let lines: Vec<&str> = content.lines().collect();
                    RecognizedText::from_lines(&lines)
                }
            };
            return Ok(Some(text));
        }

        Ok(None)
    }
}

fn transcript_candidates(frame_path: &Path) -> Vec<(PathBuf, TranscriptKind)> {
    let mut sidecar = frame_path.as_os_str().to_owned();
    sidecar.push(".ocr.json");

    vec![
        (PathBuf::from(sidecar), TranscriptKind::Json),
        (frame_path.with_extension("json"), TranscriptKind::Json),
        (frame_path.with_extension("txt"), TranscriptKind::Text),
    ]
}

#[async_trait]
impl OcrEngine for ReplayOcr {
    fn name(&self) -> &str {
        "replay"
    }

    async fn recognize(
        &self,
        frame: &CapturedFrame,
        _rotation: Rotation,
    ) -> Result<RecognizedText, OcrError> {
        let Some(path) = &frame.source else {
            return Err(OcrError::Unavailable(
                "replay needs frames that come from files".to_string(),
            ));
        };

        Ok(Self::load(path).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frame_at(path: &Path) -> CapturedFrame {
        CapturedFrame::new(vec![0; 4], 1, 1).with_source(path)
    }

    #[tokio::test]
    async fn test_sidecar_json_preferred() {
        let dir = TempDir::new().unwrap();
        let frame_path = dir.path().join("car.png");
        let transcript = RecognizedText::from_lines(&["ABC 1234"]);
        std::fs::write(
            dir.path().join("car.png.ocr.json"),
            serde_json::to_string(&transcript).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("car.txt"), "IGNORED").unwrap();

        let text = ReplayOcr::new()
            .recognize(&frame_at(&frame_path), Rotation::Deg0)
            .await
            .unwrap();
        assert_eq!(text, transcript);
    }

    #[tokio::test]
    async fn test_plain_text_transcript() {
        let dir = TempDir::new().unwrap();
        let frame_path = dir.path().join("car.jpg");
        std::fs::write(dir.path().join("car.txt"), "BRA 2E19\nBRASIL\n").unwrap();

        let text = ReplayOcr::new()
            .recognize(&frame_at(&frame_path), Rotation::Deg90)
            .await
            .unwrap();
        assert_eq!(text.blocks[0].lines.len(), 2);
        assert_eq!(text.flatten(), "BRA2E19BRASIL");
    }

    #[tokio::test]
    async fn test_missing_transcript_is_empty() {
        let dir = TempDir::new().unwrap();
        let text = ReplayOcr::new()
            .recognize(&frame_at(&dir.path().join("none.png")), Rotation::Deg0)
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_transcript() {
        let dir = TempDir::new().unwrap();
        let frame_path = dir.path().join("bad.png");
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let result = ReplayOcr::new()
            .recognize(&frame_at(&frame_path), Rotation::Deg0)
            .await;
        assert!(matches!(result, Err(OcrError::MalformedOutput(_))));
    }

    #[tokio::test]
    async fn test_frame_without_source_rejected() {
        let frame = CapturedFrame::new(vec![0; 4], 1, 1);
        let result = ReplayOcr::new().recognize(&frame, Rotation::Deg0).await;
        assert!(matches!(result, Err(OcrError::Unavailable(_))));
    }
}
