use crate::error::ProcessingError;
use crate::frame::{PixelBuffer, Rotation};
use image::imageops;
use std::sync::Arc;
use tracing::debug;

/// Rotate a frame clockwise by the sensor-reported angle so it is upright.
/// A zero rotation hands back the same buffer without copying.
pub fn correct_orientation(
    frame: PixelBuffer,
    rotation_degrees: u16,
) -> Result<PixelBuffer, ProcessingError> {
    let rotation = Rotation::from_degrees(rotation_degrees)?;

    let rotated = match rotation {
        Rotation::None => return Ok(frame),
        Rotation::Rotate90 => imageops::rotate90(&*frame),
        Rotation::Rotate180 => imageops::rotate180(&*frame),
        Rotation::Rotate270 => imageops::rotate270(&*frame),
    };

    debug!(
        "Rotated frame {}x{} by {} degrees",
        frame.width(),
        frame.height(),
        rotation.degrees()
    );
    Ok(Arc::new(rotated))
}
