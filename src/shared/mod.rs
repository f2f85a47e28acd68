//! Shared state between the analysis pipeline and the display

pub mod state;

pub use state::DisplayedPlate;
