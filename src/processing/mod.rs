//! Post-capture image pipeline: orientation correction, timestamp stamping
//! and JPEG encoding for upload.

mod encode;
mod orientation;
mod overlay;

pub use orientation::correct_orientation;
pub use overlay::{resolve_timestamp_timezone, TIMESTAMP_FORMAT};

use crate::config::OverlayConfig;
use crate::error::{ProcessingError, ProcessingStage};
use crate::frame::{CapturedFrame, PixelBuffer};
use bytes::Bytes;
use chrono_tz::Tz;
use rusttype::Font;
use std::fs;
use tracing::{debug, warn};

/// Result of a successful pass through the pipeline
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Upright, stamped pixels held for operator review
    pub image: PixelBuffer,
    /// Encoded bytes sent as the upload body
    pub jpeg: Bytes,
}

impl ProcessedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Stateless image pipeline configured from the overlay settings
pub struct ImageProcessor {
    config: OverlayConfig,
    font: Result<Font<'static>, String>,
    timezone: Option<Tz>,
}

impl ImageProcessor {
    pub fn new(config: OverlayConfig) -> Self {
        let font = if config.enabled {
            load_font(&config.font_path)
        } else {
            Err("timestamp overlay disabled".to_string())
        };

        if let Err(e) = &font {
            if config.enabled {
                warn!("Timestamp font unavailable, captures will fail to stamp: {}", e);
            }
        }

        let timezone = config.timezone.as_deref().map(resolve_timestamp_timezone);

        Self {
            config,
            font,
            timezone,
        }
    }

    /// Use an already-parsed font instead of the configured file
    pub fn with_font(mut self, font: Font<'static>) -> Self {
        self.font = Ok(font);
        self
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Orientation, stamping and encoding in sequence; intermediate buffers
    /// are dropped as soon as the next stage supersedes them
    pub fn process(&self, frame: CapturedFrame) -> Result<ProcessedImage, ProcessingError> {
        let upright = correct_orientation(frame.image, frame.rotation_degrees)?;

        let stamped = if self.config.enabled {
            self.stamp_timestamp(upright)?
        } else {
            upright
        };

        let jpeg = self.encode_jpeg(&stamped)?;
        debug!(
            "Processed frame {}x{} into {} JPEG bytes",
            stamped.width(),
            stamped.height(),
            jpeg.len()
        );

        Ok(ProcessedImage {
            image: stamped,
            jpeg,
        })
    }

    /// Render the current date-time into the bottom-left corner
    pub fn stamp_timestamp(&self, image: PixelBuffer) -> Result<PixelBuffer, ProcessingError> {
        let font = self
            .font
            .as_ref()
            .map_err(|e| ProcessingError::new(ProcessingStage::Timestamp, e.clone()))?;
        let text = self.timestamp_text(chrono::Utc::now());
        Ok(overlay::stamp_text(
            image,
            &text,
            font,
            self.config.font_size,
            self.config.inset,
        ))
    }

    pub(crate) fn timestamp_text(&self, at: chrono::DateTime<chrono::Utc>) -> String {
        match &self.timezone {
            Some(tz) => at.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string(),
            None => at
                .with_timezone(&chrono::Local)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }

    pub fn encode_jpeg(&self, image: &PixelBuffer) -> Result<Bytes, ProcessingError> {
        encode::encode_jpeg(image, self.config.jpeg_quality)
    }
}

fn load_font(path: &str) -> Result<Font<'static>, String> {
    let data = fs::read(path).map_err(|e| format!("Failed to read font file '{}': {}", path, e))?;
    Font::try_from_vec(data).ok_or_else(|| format!("Failed to parse font file '{}'", path))
}
