//! Plate Display Layer
//!
//! Receives plates from the pipeline. The display never acknowledges and is
//! never cleared by frames without a plate.

use tracing::{debug, info};

use crate::plate::PlateMatch;
use crate::shared::DisplayedPlate;

/// Anything that can present a detected plate
pub trait PlateDisplay: Send + Sync {
    /// Present `plate`, replacing whatever was shown before
    fn show(&self, plate: &PlateMatch);
}

impl PlateDisplay for DisplayedPlate {
    fn show(&self, plate: &PlateMatch) {
        self.update(plate.clone());
    }
}

/// Prints each newly displayed plate to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleDisplay {
    displayed: DisplayedPlate,
}

impl ConsoleDisplay {
    pub fn new(displayed: DisplayedPlate) -> Self {
        Self { displayed }
    }
}

impl PlateDisplay for ConsoleDisplay {
    fn show(&self, plate: &PlateMatch) {
        let unchanged = self.displayed.current_text().as_deref() == Some(plate.as_str());
        self.displayed.update(plate.clone());
        if unchanged {
            debug!("Plate {} still displayed", plate);
            return;
        }

        info!("Plate detected: {} ({})", plate, plate.shape);
        println!("{}", plate);
    }
}
