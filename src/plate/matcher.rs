//! Plate shape matching
//!
//! Letter slots accept any character that is not an ASCII digit, as the plate
//! formats were first written; digit slots accept ASCII digits only. Matching
//! always runs on normalized text, where the only non-digits left are ASCII
//! letters.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Known plate layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateShape {
    /// Three letters then four digits (ABC1234)
    Legacy,
    /// Three letters, a digit, a letter, two digits (ABC1D23)
    Mercosul,
}

impl PlateShape {
    pub fn name(&self) -> &'static str {
        match self {
            PlateShape::Legacy => "legacy",
            PlateShape::Mercosul => "mercosul",
        }
    }
}

impl fmt::Display for PlateShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plate shape paired with its full-string rule
#[derive(Debug, Clone)]
pub struct PlatePattern {
    shape: PlateShape,
    rule: Regex,
}

impl PlatePattern {
    /// Compile a pattern. `body` is wrapped in start/end anchors.
    pub fn new(shape: PlateShape, body: &str) -> Result<Self, regex::Error> {
        let rule = Regex::new(&format!("^(?:{body})$"))?;
        Ok(Self { shape, rule })
    }

    pub fn shape(&self) -> PlateShape {
        self.shape
    }

    /// True when the whole of `text` fits this pattern
    pub fn matches(&self, text: &str) -> bool {
        self.rule.is_match(text)
    }
}

/// A plate found in normalized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateMatch {
    /// The matched text, exactly as it appeared after normalization
    pub plate: String,
    /// Layout that accepted it
    pub shape: PlateShape,
}

impl PlateMatch {
    pub fn as_str(&self) -> &str {
        &self.plate
    }
}

impl fmt::Display for PlateMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plate)
    }
}

static STANDARD_PATTERNS: LazyLock<Vec<PlatePattern>> = LazyLock::new(|| {
    vec![
        PlatePattern::new(PlateShape::Legacy, r"[^0-9]{3}[0-9]{4}")
            .expect("built-in legacy plate pattern"),
        PlatePattern::new(PlateShape::Mercosul, r"[^0-9]{3}[0-9][^0-9][0-9]{2}")
            .expect("built-in mercosul plate pattern"),
    ]
});

/// Ordered list of plate patterns; the first full match wins
#[derive(Debug, Clone)]
pub struct PlateMatcher {
    patterns: Vec<PlatePattern>,
}

impl Default for PlateMatcher {
    fn default() -> Self {
        Self::standard()
    }
}

impl PlateMatcher {
    /// Legacy checked before Mercosul
    pub fn standard() -> Self {
        Self::with_patterns(STANDARD_PATTERNS.clone())
    }

    /// Matcher over a custom ordered pattern list
    pub fn with_patterns(patterns: Vec<PlatePattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[PlatePattern] {
        &self.patterns
    }

    /// Match the entire normalized text against each pattern in order.
    ///
    /// There is no substring search: any extra leading or trailing character
    /// makes the text miss every pattern.
    pub fn find(&self, normalized: &str) -> Option<PlateMatch> {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(normalized))
            .map(|pattern| PlateMatch {
                plate: normalized.to_string(),
                shape: pattern.shape(),
            })
    }
}
