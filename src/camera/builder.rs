use super::{FrameSource, StillImageSource};
use crate::config::{CameraConfig, CameraSource};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Build the frame source selected by configuration
pub fn build_frame_source(config: &CameraConfig) -> Result<Arc<dyn FrameSource>> {
    let source: Arc<dyn FrameSource> = match config.source {
        CameraSource::Still => Arc::new(StillImageSource::new(
            config.still_path.clone(),
            config.rotation_degrees,
        )),
        CameraSource::V4l2 => build_v4l2(config)?,
    };

    info!("Using frame source: {}", source.describe());
    Ok(source)
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_v4l2(config: &CameraConfig) -> Result<Arc<dyn FrameSource>> {
    Ok(Arc::new(super::V4l2FrameSource::new(config.clone())?))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn build_v4l2(_config: &CameraConfig) -> Result<Arc<dyn FrameSource>> {
    Err(crate::error::DccamError::camera(
        "V4L2 capture requires building with the `camera` feature on Linux",
    ))
}
