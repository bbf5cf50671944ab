mod builder;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod interface;
mod still;

pub use builder::build_frame_source;
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use interface::V4l2FrameSource;
pub use still::StillImageSource;

use crate::error::Result;
use crate::frame::CapturedFrame;
use async_trait::async_trait;

/// Camera subsystem seam: deliver one frame per request
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire a single frame together with its sensor rotation
    async fn acquire_frame(&self) -> Result<CapturedFrame>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}
