use super::FrameSource;
use crate::error::{DccamError, Result};
use crate::frame::CapturedFrame;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Frame source that decodes an image file from disk on every request.
///
/// Useful on kiosks fed by an external capture tool and for bench testing.
pub struct StillImageSource {
    path: PathBuf,
    rotation_degrees: u16,
}

impl StillImageSource {
    pub fn new<P: Into<PathBuf>>(path: P, rotation_degrees: u16) -> Self {
        Self {
            path: path.into(),
            rotation_degrees,
        }
    }
}

#[async_trait]
impl FrameSource for StillImageSource {
    async fn acquire_frame(&self) -> Result<CapturedFrame> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            DccamError::camera(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&data))
            .await
            .map_err(|e| DccamError::camera(format!("Decode task failed: {}", e)))?
            .map_err(|e| {
                DccamError::camera(format!("Failed to decode {}: {}", self.path.display(), e))
            })?
            .to_rgba8();

        debug!(
            "Acquired still frame {}x{} from {}",
            image.width(),
            image.height(),
            self.path.display()
        );
        Ok(CapturedFrame::new(image, self.rotation_degrees))
    }

    fn describe(&self) -> String {
        format!("still image {}", self.path.display())
    }
}
