pub mod camera;

pub use camera::{Camera, CameraInfo};

use anyhow::Result;

/// Source of frames for the detection loop.
pub trait FrameSource {
    type Frame;

    /// Next frame, or `None` when no frame could be acquired.
    fn read_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Release the underlying device. Safe to call more than once.
    fn release(&mut self) -> Result<()>;
}
