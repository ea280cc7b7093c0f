pub mod display;
pub mod overlay;

pub use display::DisplayManager;
pub use overlay::OverlayRenderer;

use anyhow::Result;

use crate::core::detection::DetectionResult;

/// Draws model output and the frame-rate counter onto frames.
pub trait FrameRenderer<F> {
    /// Annotated copy of `frame`; the input is left untouched.
    fn plot(&self, frame: &F, result: &DetectionResult) -> Result<F>;

    fn stamp_fps(&self, frame: &mut F, fps: f64) -> Result<()>;
}

/// Window the annotated frames are presented in.
pub trait DisplaySink<F> {
    fn show(&mut self, frame: &F) -> Result<()>;

    /// Wait up to `wait_ms` for a key press.
    fn poll_key(&mut self, wait_ms: i32) -> Result<Option<char>>;

    /// Close every window. Safe to call more than once.
    fn close_all(&mut self) -> Result<()>;
}
