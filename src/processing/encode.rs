use crate::error::{ProcessingError, ProcessingStage};
use crate::frame::PixelBuffer;
use bytes::Bytes;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{RgbImage, RgbaImage};

/// Encode an RGBA buffer as JPEG; alpha is dropped
pub(crate) fn encode_jpeg(image: &PixelBuffer, quality: u8) -> Result<Bytes, ProcessingError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ProcessingError::new(
            ProcessingStage::Encode,
            "cannot encode an empty image",
        ));
    }

    let source: &RgbaImage = image;
    let rgb: RgbImage = source.convert();

    let mut buf = Vec::with_capacity(rgb.as_raw().len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode_image(&rgb)
        .map_err(|e| ProcessingError::new(ProcessingStage::Encode, e.to_string()))?;

    Ok(Bytes::from(buf))
}
