//! Displayed plate state shared between the pipeline and the display

use parking_lot::RwLock;
use std::sync::Arc;

use crate::plate::PlateMatch;

/// The plate currently on display
///
/// Writes are whole-value replacements: whichever frame finishes last wins,
/// regardless of the order the frames were captured in. There is no way to
/// clear the value, so a frame without a plate leaves the display untouched.
#[derive(Debug, Clone, Default)]
pub struct DisplayedPlate {
    inner: Arc<RwLock<Option<PlateMatch>>>,
}

impl DisplayedPlate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the displayed plate, returning the previous one
    pub fn update(&self, plate: PlateMatch) -> Option<PlateMatch> {
        self.inner.write().replace(plate)
    }

    /// Current plate, if any has been displayed
    pub fn current(&self) -> Option<PlateMatch> {
        self.inner.read().clone()
    }

    /// Current plate text, if any has been displayed
    pub fn current_text(&self) -> Option<String> {
        self.inner.read().as_ref().map(|p| p.plate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::matcher::PlateShape;

    fn plate(text: &str, shape: PlateShape) -> PlateMatch {
        PlateMatch {
            plate: text.to_string(),
            shape,
        }
    }

    #[test]
    fn test_starts_empty() {
        let displayed = DisplayedPlate::new();
        assert!(displayed.current().is_none());
        assert!(displayed.current_text().is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let displayed = DisplayedPlate::new();
        assert!(displayed.update(plate("ABC1234", PlateShape::Legacy)).is_none());

        let previous = displayed.update(plate("BRA2E19", PlateShape::Mercosul));
        assert_eq!(previous.map(|p| p.plate), Some("ABC1234".to_string()));
        assert_eq!(displayed.current_text().as_deref(), Some("BRA2E19"));
    }

    #[test]
    fn test_clones_share_value() {
        let displayed = DisplayedPlate::new();
        let writer = displayed.clone();
        writer.update(plate("XYZ9876", PlateShape::Legacy));
        assert_eq!(displayed.current_text().as_deref(), Some("XYZ9876"));
    }
}
