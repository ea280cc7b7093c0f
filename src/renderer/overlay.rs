use anyhow::{Context, Result};
use opencv::{core, imgproc, prelude::*};

use super::FrameRenderer;
use crate::core::detection::{Detection, DetectionResult};

// RGB, cycled by class id
const PALETTE: [(u8, u8, u8); 20] = [
    (0xFF, 0x38, 0x38), (0xFF, 0x9D, 0x97), (0xFF, 0x70, 0x1F), (0xFF, 0xB2, 0x1D),
    (0xCF, 0xD2, 0x31), (0x48, 0xF9, 0x0A), (0x92, 0xCC, 0x17), (0x3D, 0xDB, 0x86),
    (0x1A, 0x93, 0x34), (0x00, 0xD4, 0xBB), (0x2C, 0x99, 0xA8), (0x00, 0xC2, 0xFF),
    (0x34, 0x45, 0x93), (0x64, 0x73, 0xFF), (0x00, 0x18, 0xEC), (0x84, 0x38, 0xFF),
    (0x52, 0x00, 0x85), (0xCB, 0x38, 0xFF), (0xFF, 0x95, 0xC8), (0xFF, 0x37, 0xC7),
];

const FPS_ORIGIN: (i32, i32) = (10, 30);
const FPS_SCALE: f64 = 1.0;
const FPS_THICKNESS: i32 = 2;

/// BGR color for a class.
pub fn class_color(class_id: usize) -> (u8, u8, u8) {
    let (r, g, b) = PALETTE[class_id % PALETTE.len()];
    (b, g, r)
}

/// Box line width scaled to the frame size, never thinner than 2px.
pub fn line_width(frame_width: i32, frame_height: i32) -> i32 {
    (((frame_width + frame_height) as f64 / 2.0 * 0.003).round() as i32).max(2)
}

pub fn fps_text(fps: f64) -> String {
    format!("FPS: {:.2}", fps)
}

pub fn label_text(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label, detection.confidence)
}

/// Vertical extent of a label background and its text baseline.
///
/// Labels sit above the box when there is room, otherwise just inside its top edge.
pub fn label_rows(box_top: i32, text_height: i32) -> (i32, i32, i32) {
    if box_top >= text_height + 3 {
        (box_top - text_height - 3, box_top, box_top - 2)
    } else {
        (box_top, box_top + text_height + 3, box_top + text_height + 2)
    }
}

fn scalar((b, g, r): (u8, u8, u8)) -> core::Scalar {
    core::Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

/// Draws boxes, labels and the FPS counter with OpenCV primitives.
#[derive(Debug, Default)]
pub struct OverlayRenderer;

impl OverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    fn draw_detection(&self, canvas: &mut Mat, detection: &Detection, lw: i32) -> Result<()> {
        let color = scalar(class_color(detection.class_id));
        let bbox = &detection.bbox;
        let x1 = bbox.x1.round() as i32;
        let y1 = bbox.y1.round() as i32;
        let x2 = bbox.x2.round() as i32;
        let y2 = bbox.y2.round() as i32;

        imgproc::rectangle(
            canvas,
            core::Rect::new(x1, y1, (x2 - x1).max(1), (y2 - y1).max(1)),
            color,
            lw,
            imgproc::LINE_AA,
            0,
        )?;

        let text = label_text(detection);
        let text_thickness = (lw - 1).max(1);
        let text_scale = lw as f64 / 3.0;
        let mut baseline = 0;
        let size = imgproc::get_text_size(
            &text,
            imgproc::FONT_HERSHEY_SIMPLEX,
            text_scale,
            text_thickness,
            &mut baseline,
        )?;

        let (bg_top, bg_bottom, text_y) = label_rows(y1, size.height);
        imgproc::rectangle(
            canvas,
            core::Rect::new(x1, bg_top, size.width, bg_bottom - bg_top),
            color,
            imgproc::FILLED,
            imgproc::LINE_AA,
            0,
        )?;
        imgproc::put_text(
            canvas,
            &text,
            core::Point::new(x1, text_y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            text_scale,
            core::Scalar::new(255.0, 255.0, 255.0, 0.0),
            text_thickness,
            imgproc::LINE_AA,
            false,
        )?;
        Ok(())
    }
}

impl FrameRenderer<Mat> for OverlayRenderer {
    fn plot(&self, frame: &Mat, result: &DetectionResult) -> Result<Mat> {
        let mut canvas = frame.try_clone().context("Failed to copy frame")?;
        let lw = line_width(canvas.cols(), canvas.rows());
        for detection in &result.detections {
            self.draw_detection(&mut canvas, detection, lw)
                .with_context(|| format!("Failed to draw '{}'", detection.label))?;
        }
        Ok(canvas)
    }

    fn stamp_fps(&self, frame: &mut Mat, fps: f64) -> Result<()> {
        imgproc::put_text(
            frame,
            &fps_text(fps),
            core::Point::new(FPS_ORIGIN.0, FPS_ORIGIN.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            FPS_SCALE,
            core::Scalar::new(0.0, 255.0, 0.0, 0.0),
            FPS_THICKNESS,
            imgproc::LINE_8,
            false,
        )
        .context("Failed to draw FPS counter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detection::BoundingBox;

    #[test]
    fn test_class_color_is_bgr_and_cycles() {
        assert_eq!(class_color(0), (0x38, 0x38, 0xFF));
        assert_eq!(class_color(20), class_color(0));
        assert_ne!(class_color(1), class_color(0));
    }

    #[test]
    fn test_line_width() {
        assert_eq!(line_width(640, 480), 2);
        assert_eq!(line_width(1280, 720), 3);
    }

    #[test]
    fn test_fps_text_two_decimals() {
        assert_eq!(fps_text(0.0), "FPS: 0.00");
        assert_eq!(fps_text(29.876), "FPS: 29.88");
    }

    #[test]
    fn test_label_rows() {
        // room above the box
        assert_eq!(label_rows(100, 12), (85, 100, 98));
        // box touches the top edge
        assert_eq!(label_rows(5, 12), (5, 20, 19));
    }

    #[test]
    fn test_plot_leaves_source_untouched() {
        let frame = Mat::zeros(48, 64, core::CV_8UC3).unwrap().to_mat().unwrap();
        let result = DetectionResult::new(
            vec![Detection {
                class_id: 0,
                label: "resistor".to_string(),
                confidence: 0.9,
                bbox: BoundingBox::new(10.0, 20.0, 40.0, 40.0),
            }],
            Default::default(),
        );
        let renderer = OverlayRenderer::new();
        let mut annotated = renderer.plot(&frame, &result).unwrap();
        renderer.stamp_fps(&mut annotated, 12.5).unwrap();

        let before = frame.at_2d::<core::Vec3b>(20, 10).unwrap();
        let after = annotated.at_2d::<core::Vec3b>(20, 10).unwrap();
        assert_eq!((before[0], before[1], before[2]), (0, 0, 0));
        assert_ne!((after[0], after[1], after[2]), (0, 0, 0));
    }
}
