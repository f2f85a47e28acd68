//! Plate Extraction Layer
//!
//! Turns a frame's recognized text into a plate candidate:
//! flatten → normalize → full-string match against the known plate shapes.

pub mod matcher;
pub mod normalize;

pub use matcher::{PlateMatch, PlateMatcher};
pub use normalize::normalize;

use tracing::debug;

use crate::vision::RecognizedText;

/// Outcome of running one OCR result through the extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Nothing was recognized in the frame
    NoText,
    /// Text was recognized but no plate shape fit it
    NoMatch { normalized: String },
    /// A plate was found
    Plate(PlateMatch),
}

/// Stateless plate extractor over a fixed pattern list
#[derive(Debug, Clone)]
pub struct PlateExtractor {
    matcher: PlateMatcher,
}

impl Default for PlateExtractor {
    fn default() -> Self {
        Self::new(PlateMatcher::standard())
    }
}

impl PlateExtractor {
    pub fn new(matcher: PlateMatcher) -> Self {
        Self { matcher }
    }

    /// Names of the plate shapes tried, in priority order
    pub fn shape_names(&self) -> Vec<&'static str> {
        self.matcher
            .patterns()
            .iter()
            .map(|pattern| pattern.shape().name())
            .collect()
    }

    /// Run the full extraction on a recognized text result
    pub fn extract(&self, recognized: &RecognizedText) -> Extraction {
        if recognized.is_empty() {
            return Extraction::NoText;
        }
        self.extract_from_str(&recognized.flatten())
    }

    /// Normalize and match already-flattened text
    pub fn extract_from_str(&self, flattened: &str) -> Extraction {
        let normalized = normalize(flattened);
        match self.matcher.find(&normalized) {
            Some(plate) => {
                debug!("Plate candidate {} ({})", plate, plate.shape);
                Extraction::Plate(plate)
            }
            None => Extraction::NoMatch { normalized },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::matcher::{PlatePattern, PlateShape};

    #[test]
    fn test_noisy_ocr_text_yields_plate() {
        let extractor = PlateExtractor::default();
        let recognized = RecognizedText::from_lines(&["  A-B#C 1*2 3 4 "]);

        assert_eq!(
            extractor.extract(&recognized),
            Extraction::Plate(PlateMatch {
                plate: "ABC1234".to_string(),
                shape: PlateShape::Legacy,
            })
        );
    }

    #[test]
    fn test_split_elements_yield_mercosul_plate() {
        let extractor = PlateExtractor::default();
        let recognized = RecognizedText::from_lines(&["BRA", "2E19"]);

        assert!(matches!(
            extractor.extract(&recognized),
            Extraction::Plate(PlateMatch {
                shape: PlateShape::Mercosul,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_text_is_no_text() {
        let extractor = PlateExtractor::default();
        assert_eq!(extractor.extract(&RecognizedText::new()), Extraction::NoText);
        assert_eq!(
            extractor.extract(&RecognizedText::from_lines(&["", "   "])),
            Extraction::NoText
        );
    }

    #[test]
    fn test_punctuation_only_is_no_match() {
        let extractor = PlateExtractor::default();
        let extraction = extractor.extract(&RecognizedText::from_lines(&["-- ..."]));
        assert_eq!(
            extraction,
            Extraction::NoMatch {
                normalized: String::new()
            }
        );
    }

    #[test]
    fn test_extra_text_around_plate_misses() {
        let extractor = PlateExtractor::default();
        let recognized = RecognizedText::from_lines(&["BRASIL", "ABC1234"]);
        assert_eq!(
            extractor.extract(&recognized),
            Extraction::NoMatch {
                normalized: "BRASILABC1234".to_string()
            }
        );
    }

    #[test]
    fn test_shape_names_follow_pattern_order() {
        assert_eq!(PlateExtractor::default().shape_names(), vec!["legacy", "mercosul"]);

        let extractor = PlateExtractor::new(PlateMatcher::with_patterns(vec![PlatePattern::new(
            PlateShape::Mercosul,
            r"[A-Z]{3}[0-9][A-Z][0-9]{2}",
        )
        .unwrap()]));
        assert_eq!(extractor.shape_names(), vec!["mercosul"]);
        assert!(matches!(
            extractor.extract_from_str("ABC1234"),
            Extraction::NoMatch { .. }
        ));
    }
}
