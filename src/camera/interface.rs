use super::FrameSource;
use crate::config::CameraConfig;
use crate::error::{DccamError, Result};
use crate::frame::CapturedFrame;
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use tracing::{debug, info, warn};

const SAMPLE_TIMEOUT_SECONDS: u64 = 5;

/// Single-shot MJPEG grab from a V4L2 device through GStreamer.
///
/// A pipeline is built per request and torn down once the first sample
/// arrives, so the device is only held while a capture is in flight.
pub struct V4l2FrameSource {
    config: CameraConfig,
}

impl V4l2FrameSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        info!(
            "Initializing GStreamer frame source for device {} ({}x{})",
            config.device_index, config.resolution.0, config.resolution.1
        );

        gstreamer::init()
            .map_err(|e| DccamError::camera(format!("Failed to initialize GStreamer: {}", e)))?;

        Ok(Self { config })
    }

    fn build_pipeline_string(&self) -> String {
        let (width, height) = self.config.resolution;
        format!(
            "v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            self.config.device_index, width, height
        )
    }

    /// Blocking: run the pipeline until one JPEG sample is available
    fn grab_jpeg(pipeline_desc: &str) -> Result<Vec<u8>> {
        let pipeline = gstreamer::parse::launch(pipeline_desc)
            .map_err(|e| DccamError::camera(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| DccamError::camera("Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| DccamError::camera("Pipeline has no appsink"))?
            .downcast::<AppSink>()
            .map_err(|_| DccamError::camera("Sink element is not an AppSink"))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DccamError::camera(format!("Failed to start pipeline: {}", e)))?;

        let sample = appsink.try_pull_sample(gstreamer::ClockTime::from_seconds(
            SAMPLE_TIMEOUT_SECONDS,
        ));

        if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop pipeline: {}", e);
        }

        let sample = sample.ok_or_else(|| {
            DccamError::camera(format!(
                "No frame within {} seconds",
                SAMPLE_TIMEOUT_SECONDS
            ))
        })?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| DccamError::camera("No buffer in sample"))?;
        let map = buffer
            .map_readable()
            .map_err(|e| DccamError::camera(format!("Failed to map buffer: {}", e)))?;

        Ok(map.as_slice().to_vec())
    }
}

#[async_trait]
impl FrameSource for V4l2FrameSource {
    async fn acquire_frame(&self) -> Result<CapturedFrame> {
        let pipeline_desc = self.build_pipeline_string();
        debug!("Launching capture pipeline: {}", pipeline_desc);

        let image = tokio::task::spawn_blocking(move || -> Result<image::RgbaImage> {
            let jpeg = Self::grab_jpeg(&pipeline_desc)?;
            let decoded = image::load_from_memory(&jpeg)
                .map_err(|e| DccamError::camera(format!("Failed to decode frame: {}", e)))?;
            Ok(decoded.to_rgba8())
        })
        .await
        .map_err(|e| DccamError::camera(format!("Capture task failed: {}", e)))??;

        debug!("Captured frame {}x{}", image.width(), image.height());
        Ok(CapturedFrame::new(image, self.config.rotation_degrees))
    }

    fn describe(&self) -> String {
        format!("/dev/video{}", self.config.device_index)
    }
}
