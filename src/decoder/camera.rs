use anyhow::{bail, Context, Result};
use opencv::{prelude::*, videoio};
use serde::Serialize;

use super::FrameSource;

/// Negotiated capture properties, as reported by the backend after open.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CameraInfo {
    pub device: i32,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub backend: String,
}

/// Webcam capture through OpenCV's VideoCapture.
pub struct Camera {
    capture: videoio::VideoCapture,
    info: CameraInfo,
    released: bool,
}

impl Camera {
    /// Open `device` and request a `width x height` capture size.
    ///
    /// The requested size is advisory; the device may pick another one.
    pub fn open(device: i32, width: u32, height: u32) -> Result<Self> {
        // CAP_ANY lets OpenCV choose: V4L2 on Linux, AVFoundation on macOS,
        // Media Foundation on Windows
        let mut capture = videoio::VideoCapture::new(device, videoio::CAP_ANY)
            .with_context(|| format!("Failed to create capture for camera {}", device))?;

        if !capture.is_opened()? {
            bail!("Could not access the camera (device {}).", device);
        }

        let width_ok = capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        let height_ok = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        if !width_ok || !height_ok {
            log::warn!(
                "Camera {} rejected requested resolution {}x{}",
                device,
                width,
                height
            );
        }

        let info = CameraInfo {
            device,
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            fps: capture.get(videoio::CAP_PROP_FPS)?,
            backend: capture
                .get_backend_name()
                .unwrap_or_else(|_| "unknown".to_string()),
        };

        if (info.width, info.height) != (width, height) {
            log::warn!(
                "Camera {} delivers {}x{} instead of {}x{}",
                device,
                info.width,
                info.height,
                width,
                height
            );
        }
        log::info!(
            "Camera {} opened via {} ({}x{} @ {:.1} fps)",
            device,
            info.backend,
            info.width,
            info.height,
            info.fps
        );

        Ok(Self {
            capture,
            info,
            released: false,
        })
    }

    pub fn info(&self) -> &CameraInfo {
        &self.info
    }
}

impl FrameSource for Camera {
    type Frame = Mat;

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        if self.released {
            return Ok(None);
        }
        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => Ok(Some(frame)),
            Ok(_) => Ok(None),
            Err(e) => {
                // A read error is treated like a missing frame: the device is gone
                log::warn!("Camera {} read error: {}", self.info.device, e);
                Ok(None)
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.capture.release().context("Failed to release camera")?;
        log::debug!("Camera {} released", self.info.device);
        Ok(())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
