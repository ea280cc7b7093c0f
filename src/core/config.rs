use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "best.onnx";
pub const DEFAULT_WINDOW_TITLE: &str = "Component Detection - YOLO";
pub const QUIT_KEY: char = 'q';
pub const KEY_WAIT_MS: i32 = 1;

/// Everything the detection loop needs to set up its collaborators.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionConfig {
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub camera_index: i32,
    /// Requested capture size; the device may ignore it.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Side of the square network input.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub window_title: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL),
            labels_path: None,
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            bail!(
                "Capture size must be positive, got {}x{}",
                self.frame_width,
                self.frame_height
            );
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            bail!("Input size must be a positive multiple of 32, got {}", self.input_size);
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            bail!("Confidence threshold {} outside [0, 1]", self.confidence_threshold);
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            bail!("IoU threshold {} outside [0, 1]", self.iou_threshold);
        }
        if self.window_title.trim().is_empty() {
            bail!("Window title must not be empty");
        }
        Ok(())
    }
}
