//! Frame data structures for captured camera content

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

/// Rotation needed to bring a frame upright, as reported by the frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Map a rotation in degrees to its enumerant. Anything other than
    /// 0, 90, 180 or 270 is treated as 0.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees {
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            270 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// A captured frame from the camera
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Clockwise rotation that makes the image upright
    pub rotation: Rotation,
    /// Position of the frame in the capture stream
    pub sequence: u64,
    /// File the frame was decoded from, if any
    pub source: Option<PathBuf>,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            rotation: Rotation::Deg0,
            sequence: 0,
            source: None,
            timestamp: Instant::now(),
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when the frame has no usable image data
    pub fn is_empty(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return true;
        }
        let required = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(4));
        match required {
            Some(required) => self.data.len() < required,
            None => true,
        }
    }
}
