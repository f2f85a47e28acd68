//! Tesseract OCR backend
//!
//! Drives the `tesseract` command-line tool in TSV mode, which reports every
//! word with its block, paragraph and line numbers. Those numbers are folded
//! back into the block → line → element structure.

use async_trait::async_trait;
use image::{imageops, RgbaImage};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::{OcrConfig, OcrEngine, OcrError, RecognizedText, TextBlock, TextElement, TextLine};
use crate::capture::{CapturedFrame, Rotation};

/// TSV level for word rows
const WORD_LEVEL: u32 = 5;
/// Columns before the text column
const TEXT_COLUMN: usize = 11;

/// Tesseract command-line OCR engine
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    page_segmentation_mode: u32,
    char_whitelist: Option<String>,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            char_whitelist: config.char_whitelist.clone(),
        }
    }

    /// Check whether the tesseract binary can be launched
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string());
        if let Some(whitelist) = &self.char_whitelist {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={whitelist}"));
        }
        command.arg("tsv");
        command
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        frame: &CapturedFrame,
        rotation: Rotation,
    ) -> Result<RecognizedText, OcrError> {
        if frame.is_empty() {
            return Err(OcrError::EmptyImage);
        }

        let image = upright_image(frame, rotation)?;
        let input_path =
            std::env::temp_dir().join(format!("plate_ocr_{}.png", uuid::Uuid::new_v4()));

        let save_path = input_path.clone();
        tokio::task::spawn_blocking(move || image.save(&save_path))
            .await
            .map_err(|e| OcrError::Task(e.to_string()))?
            .map_err(|e| OcrError::Processing(format!("failed to write temp image: {e}")))?;

        let output = self.command(&input_path).output().await;
        let _ = tokio::fs::remove_file(&input_path).await;

        let output = output.map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                OcrError::Unavailable(format!("{} not found", self.binary.display()))
            }
            _ => OcrError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Processing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = parse_tsv(&String::from_utf8_lossy(&output.stdout))?;
        let (width, height) = frame.dimensions();
        debug!(
            "Tesseract recognized {} words in {}x{} frame {}",
            text.element_count(),
            width,
            height,
            frame.sequence
        );
        Ok(text)
    }
}

/// Copy the frame into an image rotated clockwise by `rotation`
fn upright_image(frame: &CapturedFrame, rotation: Rotation) -> Result<RgbaImage, OcrError> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or(OcrError::EmptyImage)?;

    Ok(match rotation {
        Rotation::Deg0 => image,
        Rotation::Deg90 => imageops::rotate90(&image),
        Rotation::Deg180 => imageops::rotate180(&image),
        Rotation::Deg270 => imageops::rotate270(&image),
    })
}

/// Parse tesseract TSV output into recognized text.
///
/// Only word rows with text become elements. A change of page or block starts
/// a new block; a change of paragraph or line starts a new line.
pub fn parse_tsv(tsv: &str) -> Result<RecognizedText, OcrError> {
    let mut text = RecognizedText::new();
    let mut current_block: Option<(u32, u32)> = None;
    let mut current_line: Option<(u32, u32)> = None;

    for (index, row) in tsv.lines().enumerate() {
        let row = row.trim_end_matches('\r');
        if row.is_empty() || row.starts_with("level") {
            continue;
        }

        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < TEXT_COLUMN {
            return Err(OcrError::MalformedOutput(format!(
                "row {} has {} columns",
                index + 1,
                columns.len()
            )));
        }

        let number = |column: usize| -> Result<u32, OcrError> {
            columns[column].trim().parse().map_err(|_| {
                OcrError::MalformedOutput(format!(
                    "row {} column {} is not a number: {:?}",
                    index + 1,
                    column + 1,
                    columns[column]
                ))
            })
        };

        if number(0)? != WORD_LEVEL {
            continue;
        }

        let word = columns.get(TEXT_COLUMN).copied().unwrap_or("");
        if word.trim().is_empty() {
            continue;
        }

        let block_key = (number(1)?, number(2)?);
        let line_key = (number(3)?, number(4)?);

        if current_block != Some(block_key) {
            text.blocks.push(TextBlock::default());
            current_block = Some(block_key);
            current_line = None;
        }

        let block = text
            .blocks
            .last_mut()
            .ok_or_else(|| OcrError::MalformedOutput("word outside a block".to_string()))?;

        if current_line != Some(line_key) {
            block.lines.push(TextLine::default());
            current_line = Some(line_key);
        }

        if let Some(line) = block.lines.last_mut() {
            line.elements.push(TextElement::new(word));
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out.push('\n');
        out
    }

    #[test]
    fn test_parse_groups_blocks_and_lines() {
        let output = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t",
            "2\t1\t1\t0\t0\t0\t10\t10\t200\t40\t-1\t",
            "5\t1\t1\t1\t1\t1\t10\t10\t60\t40\t91.5\tABC",
            "5\t1\t1\t1\t1\t2\t80\t10\t80\t40\t90.1\t-1234",
            "5\t1\t1\t1\t2\t1\t10\t60\t80\t40\t88.0\tBRASIL",
            "5\t1\t2\t1\t1\t1\t10\t300\t80\t40\t70.2\tSP",
        ]);

        let text = parse_tsv(&output).unwrap();
        assert_eq!(text.blocks.len(), 2);
        assert_eq!(text.blocks[0].lines.len(), 2);
        assert_eq!(text.blocks[0].lines[0].elements.len(), 2);
        assert_eq!(text.flatten(), "ABC-1234BRASILSP");
    }

    #[test]
    fn test_parse_skips_blank_words() {
        let output = tsv(&[
            "5\t1\t1\t1\t1\t1\t10\t10\t60\t40\t95\t ",
            "5\t1\t1\t1\t1\t2\t10\t10\t60\t40\t95\t",
            "5\t1\t1\t1\t1\t3\t10\t10\t60\t40\t95",
        ]);
        assert!(parse_tsv(&output).unwrap().blocks.is_empty());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv("").unwrap().is_empty());
        assert!(parse_tsv(HEADER).unwrap().blocks.is_empty());
    }

    #[test]
    fn test_parse_handles_crlf() {
        let output = format!("{HEADER}\r\n5\t1\t1\t1\t1\t1\t0\t0\t1\t1\t90\tABC1D23\r\n");
        assert_eq!(parse_tsv(&output).unwrap().flatten(), "ABC1D23");
    }

    #[test]
    fn test_parse_rejects_malformed_rows() {
        assert!(matches!(
            parse_tsv("5\t1\t1"),
            Err(OcrError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_tsv("x\t1\t1\t1\t1\t1\t0\t0\t1\t1\t90\tABC"),
            Err(OcrError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_upright_image_rotation() {
        // 2x1 frame: red pixel then blue pixel
        let data = vec![255, 0, 0, 255, 0, 0, 255, 255];
        let frame = CapturedFrame::new(data, 2, 1);

        let same = upright_image(&frame, Rotation::Deg0).unwrap();
        assert_eq!(same.dimensions(), (2, 1));

        let turned = upright_image(&frame, Rotation::Deg90).unwrap();
        assert_eq!(turned.dimensions(), (1, 2));
        assert_eq!(turned.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(turned.get_pixel(0, 1).0, [0, 0, 255, 255]);

        let flipped = upright_image(&frame, Rotation::Deg180).unwrap();
        assert_eq!(flipped.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_command_arguments() {
        let config = OcrConfig {
            page_segmentation_mode: 7,
            char_whitelist: Some("ABC123".to_string()),
            ..Default::default()
        };
        let engine = TesseractOcr::new(&config);
        let command = engine.command(std::path::Path::new("/tmp/frame.png"));
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "/tmp/frame.png",
                "stdout",
                "-l",
                "eng",
                "--psm",
                "7",
                "-c",
                "tessedit_char_whitelist=ABC123",
                "tsv"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let config = OcrConfig {
            tesseract_path: PathBuf::from("/nonexistent/tesseract-binary"),
            ..Default::default()
        };
        let engine = TesseractOcr::new(&config);
        assert!(!engine.is_available().await);

        let frame = CapturedFrame::new(vec![0; 4], 1, 1);
        let result = engine.recognize(&frame, Rotation::Deg0).await;
        assert!(matches!(result, Err(OcrError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_frame_rejected() {
        let engine = TesseractOcr::new(&OcrConfig::default());
        let result = engine.recognize(&CapturedFrame::new(Vec::new(), 0, 0), Rotation::Deg0).await;
        assert!(matches!(result, Err(OcrError::EmptyImage)));
    }
}
