use crate::error::{ProcessingError, ProcessingStage};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Shared pixel buffer. Identity (`Arc::ptr_eq`) tells whether a processing
/// step produced a new allocation or handed back its input.
pub type PixelBuffer = Arc<RgbaImage>;

/// Rotation options for frame processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    /// Already upright
    None,
    /// Rotate 90 degrees clockwise
    Rotate90,
    /// Rotate 180 degrees
    Rotate180,
    /// Rotate 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl Rotation {
    /// Map a sensor-reported rotation in degrees
    pub fn from_degrees(degrees: u16) -> Result<Self, ProcessingError> {
        match degrees % 360 {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Rotate90),
            180 => Ok(Rotation::Rotate180),
            270 => Ok(Rotation::Rotate270),
            other => Err(ProcessingError::new(
                ProcessingStage::Orientation,
                format!("unsupported rotation of {} degrees", other),
            )),
        }
    }

    /// Get rotation angle in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }
}

/// One frame delivered by the camera subsystem
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Unprocessed pixels as delivered by the sensor
    pub image: PixelBuffer,
    /// Clockwise rotation needed to make the frame upright
    pub rotation_degrees: u16,
    /// Timestamp when frame was captured
    pub captured_at: SystemTime,
}

impl CapturedFrame {
    pub fn new(image: RgbaImage, rotation_degrees: u16) -> Self {
        Self {
            image: Arc::new(image),
            rotation_degrees,
            captured_at: SystemTime::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
