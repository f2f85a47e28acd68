//! Recognized text structure produced by OCR engines
//!
//! Engines report text hierarchically: blocks contain lines, lines contain
//! elements (words). The plate extractor only cares about the linear text,
//! which [`RecognizedText::flatten`] produces.

use serde::{Deserialize, Serialize};

/// Full OCR result for a single frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Text blocks in reading order
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
}

/// A block of text (paragraph-level region)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub lines: Vec<TextLine>,
}

/// A single line within a block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLine {
    #[serde(default)]
    pub elements: Vec<TextElement>,
}

/// Smallest recognized unit, usually a word
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
}

impl RecognizedText {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a result holding one block with one line per entry in `lines`,
    /// each line split into elements on whitespace
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let lines = lines
            .iter()
            .map(|line| TextLine {
                elements: line
                    .as_ref()
                    .split_whitespace()
                    .map(TextElement::new)
                    .collect(),
            })
            .collect();

        Self {
            blocks: vec![TextBlock { lines }],
        }
    }

    /// Iterate over every element in block, line, element order
    pub fn elements(&self) -> impl Iterator<Item = &TextElement> {
        self.blocks
            .iter()
            .flat_map(|block| block.lines.iter())
            .flat_map(|line| line.elements.iter())
    }

    /// Number of elements across all blocks and lines
    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    /// Concatenate every element's text in traversal order, with no separators
    pub fn flatten(&self) -> String {
        let capacity = self.elements().map(|e| e.text.len()).sum();
        let mut flattened = String::with_capacity(capacity);
        for element in self.elements() {
            flattened.push_str(&element.text);
        }
        flattened
    }

    /// True when no element carries any text
    pub fn is_empty(&self) -> bool {
        self.elements().all(|e| e.text.is_empty())
    }
}

impl TextElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
