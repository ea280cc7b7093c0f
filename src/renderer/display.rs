use anyhow::{Context, Result};
use opencv::{highgui, prelude::*};

use super::DisplaySink;

/// HighGUI window showing the annotated stream.
pub struct DisplayManager {
    title: String,
    closed: bool,
}

impl DisplayManager {
    pub fn new(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("Failed to create window '{}'", title))?;
        Ok(Self {
            title: title.to_string(),
            closed: false,
        })
    }
}

/// Decode a `waitKey` result: -1 means no key, otherwise the low byte is the character.
pub fn decode_key(code: i32) -> Option<char> {
    if code < 0 {
        None
    } else {
        Some(((code & 0xFF) as u8) as char)
    }
}

impl DisplaySink<Mat> for DisplayManager {
    fn show(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(&self.title, frame).context("Failed to present frame")
    }

    fn poll_key(&mut self, wait_ms: i32) -> Result<Option<char>> {
        let code = highgui::wait_key(wait_ms)?;
        Ok(decode_key(code))
    }

    fn close_all(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        highgui::destroy_all_windows().context("Failed to close windows")
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}
