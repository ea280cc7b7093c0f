use anyhow::{bail, Result};
use rayon::prelude::*;

use super::detection::{BoundingBox, Detection, DetectionResult};
use super::labels::ClassLabels;

/// Inference backend run once per frame.
///
/// Implementations must not keep the frame beyond the `detect` call.
pub trait Detector<F> {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one frame.
    fn detect(&mut self, frame: &F) -> Result<DetectionResult>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shape of a YOLO detection head output.
///
/// Ultralytics exports emit `[1, 4 + C, N]`; some converters transpose this to
/// `[1, N, 4 + C]`. The attribute axis is always the shorter one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub attributes: usize,
    pub candidates: usize,
    pub transposed: bool,
}

impl OutputLayout {
    pub fn from_shape(dims: &[i32]) -> Result<Self> {
        let (a, b) = match dims {
            [1, a, b] | [a, b] => (*a, *b),
            _ => bail!("Unexpected model output shape {:?}", dims),
        };
        if a <= 0 || b <= 0 {
            bail!("Unexpected model output shape {:?}", dims);
        }
        let (a, b) = (a as usize, b as usize);
        let layout = if a <= b {
            Self { attributes: a, candidates: b, transposed: false }
        } else {
            Self { attributes: b, candidates: a, transposed: true }
        };
        if layout.attributes <= 4 {
            bail!("Model output has no class scores (shape {:?})", dims);
        }
        Ok(layout)
    }

    pub fn class_count(&self) -> usize {
        self.attributes - 4
    }

    pub fn len(&self) -> usize {
        self.attributes * self.candidates
    }

    #[inline(always)]
    fn value(&self, data: &[f32], attribute: usize, candidate: usize) -> f32 {
        if self.transposed {
            data[candidate * self.attributes + attribute]
        } else {
            data[attribute * self.candidates + candidate]
        }
    }
}

/// Aspect-preserving fit of a frame into the square network input.
///
/// The frame is scaled by `gain` to `new_width x new_height` and centered on the
/// canvas, leaving `pad_x`/`pad_y` pixels of fill on each side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub gain: f32,
    pub new_width: i32,
    pub new_height: i32,
    pub pad_x: i32,
    pub pad_y: i32,
}

impl Letterbox {
    pub fn fit(frame_width: i32, frame_height: i32, input_size: i32) -> Self {
        let gain = (input_size as f32 / frame_width.max(1) as f32)
            .min(input_size as f32 / frame_height.max(1) as f32);
        let new_width = ((frame_width as f32 * gain).round() as i32).clamp(1, input_size);
        let new_height = ((frame_height as f32 * gain).round() as i32).clamp(1, input_size);
        Self {
            gain,
            new_width,
            new_height,
            pad_x: (input_size - new_width) / 2,
            pad_y: (input_size - new_height) / 2,
        }
    }

    /// Map a network-space coordinate pair back to frame pixels.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.gain,
            (y - self.pad_y as f32) / self.gain,
        )
    }
}

/// Parameters mapping network-space candidates back onto the frame.
#[derive(Clone, Copy, Debug)]
pub struct DecodeParams {
    pub confidence_threshold: f32,
    pub letterbox: Letterbox,
    pub frame_width: f32,
    pub frame_height: f32,
}

/// Turn raw head output into frame-space detections, before suppression.
pub fn decode_predictions(
    data: &[f32],
    layout: OutputLayout,
    params: &DecodeParams,
    labels: &ClassLabels,
) -> Result<Vec<Detection>> {
    if data.len() < layout.len() {
        bail!(
            "Model output holds {} values, layout needs {}",
            data.len(),
            layout.len()
        );
    }

    let letterbox = params.letterbox;

    let detections = (0..layout.candidates)
        .into_par_iter()
        .filter_map(|i| {
            let (class_id, confidence) = (0..layout.class_count())
                .map(|c| (c, layout.value(data, 4 + c, i)))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });

            if !(confidence >= params.confidence_threshold) {
                return None;
            }

            let (cx, cy) = letterbox.to_frame(layout.value(data, 0, i), layout.value(data, 1, i));
            let w = layout.value(data, 2, i) / letterbox.gain;
            let h = layout.value(data, 3, i) / letterbox.gain;
            let bbox = BoundingBox::from_center(cx, cy, w, h)
                .clamped(params.frame_width, params.frame_height);

            Some(Detection {
                class_id,
                label: labels.name(class_id),
                confidence,
                bbox,
            })
        })
        .collect();

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_for(frame_width: i32, frame_height: i32) -> DecodeParams {
        DecodeParams {
            confidence_threshold: 0.5,
            letterbox: Letterbox::fit(frame_width, frame_height, 640),
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
        }
    }

    fn params() -> DecodeParams {
        params_for(640, 480)
    }

    /// One-class head with five candidates; only candidate 0 scores.
    fn single_candidate(cx: f32, cy: f32, w: f32, h: f32) -> Vec<f32> {
        let mut data = vec![0.0f32; 25];
        for (attribute, value) in [cx, cy, w, h, 0.9].into_iter().enumerate() {
            data[attribute * 5] = value;
        }
        data
    }

    #[test]
    fn test_layout_from_shape() {
        let layout = OutputLayout::from_shape(&[1, 84, 8400]).unwrap();
        assert_eq!(layout.class_count(), 80);
        assert!(!layout.transposed);

        let layout = OutputLayout::from_shape(&[1, 8400, 6]).unwrap();
        assert_eq!(layout.candidates, 8400);
        assert!(layout.transposed);

        assert!(OutputLayout::from_shape(&[1, 4, 8400]).is_err());
        assert!(OutputLayout::from_shape(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_decode_keeps_confident_candidates() {
        // 2 classes, 3 candidates, attribute-major.
        let layout = OutputLayout::from_shape(&[1, 6, 3]).unwrap();
        #[rustfmt::skip]
        let data = [
            // cx
            320.0, 100.0, 50.0,
            // cy
            320.0, 100.0, 50.0,
            // w
            64.0, 20.0, 10.0,
            // h
            64.0, 20.0, 10.0,
            // class 0
            0.9, 0.1, 0.2,
            // class 1
            0.1, 0.7, 0.3,
        ];
        let labels = ClassLabels::new(vec!["resistor".into(), "led".into()]);
        let mut dets = decode_predictions(&data, layout, &params(), &labels).unwrap();
        dets.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, "resistor");
        assert_eq!(dets[0].class_id, 0);
        // 640x480 sits on the canvas at gain 1 with 80px bars top and bottom
        assert_eq!(dets[0].bbox, BoundingBox::new(288.0, 208.0, 352.0, 272.0));
        assert_eq!(dets[1].label, "led");
        assert!((dets[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_fit() {
        let lb = Letterbox::fit(640, 480, 640);
        assert_eq!(lb.gain, 1.0);
        assert_eq!((lb.new_width, lb.new_height), (640, 480));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 80));

        let lb = Letterbox::fit(1280, 720, 640);
        assert_eq!(lb.gain, 0.5);
        assert_eq!((lb.new_width, lb.new_height), (640, 360));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 140));

        let lb = Letterbox::fit(480, 640, 320);
        assert_eq!(lb.gain, 0.5);
        assert_eq!((lb.pad_x, lb.pad_y), (40, 0));
    }

    #[test]
    fn test_decode_removes_padding_and_gain() {
        let layout = OutputLayout::from_shape(&[1, 5, 5]).unwrap();
        let labels = ClassLabels::new(vec!["chip".into()]);

        // Canvas center is the frame center whatever the padding
        let data = single_candidate(320.0, 320.0, 64.0, 64.0);
        let dets = decode_predictions(&data, layout, &params_for(1280, 720), &labels).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(576.0, 296.0, 704.0, 424.0));

        // A box touching the top bar edge lands on the frame's top row
        let data = single_candidate(100.0, 140.0 + 20.0, 40.0, 40.0);
        let dets = decode_predictions(&data, layout, &params_for(1280, 720), &labels).unwrap();
        assert_eq!(dets[0].bbox, BoundingBox::new(160.0, 0.0, 240.0, 80.0));

        // A square drawn on the canvas stays square on a non-square frame
        let bbox = dets[0].bbox;
        assert_eq!(bbox.width(), bbox.height());
    }

    #[test]
    fn test_decode_transposed_matches() {
        let layout = OutputLayout::from_shape(&[1, 7, 6]).unwrap();
        assert!(layout.transposed);
        let mut data = vec![0.0f32; 42];
        // candidate 2: box at center of network input, class 1 score 0.8
        data[2 * 6] = 320.0;
        data[2 * 6 + 1] = 320.0;
        data[2 * 6 + 2] = 10.0;
        data[2 * 6 + 3] = 10.0;
        data[2 * 6 + 5] = 0.8;
        let labels = ClassLabels::new(vec![]);
        let dets = decode_predictions(&data, layout, &params(), &labels).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].label, "class1");
    }

    #[test]
    fn test_non_coco_model_gets_generic_names() {
        let layout = OutputLayout::from_shape(&[1, 6, 8]).unwrap();
        let labels = ClassLabels::default().reconcile(layout.class_count(), false);
        let mut data = vec![0.0f32; layout.len()];
        // candidate 0: class 1 with score 0.8
        data[0] = 320.0;
        data[8] = 320.0;
        data[16] = 10.0;
        data[24] = 10.0;
        data[5 * 8] = 0.8;
        let dets = decode_predictions(&data, layout, &params(), &labels).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "class1");
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let layout = OutputLayout::from_shape(&[1, 6, 3]).unwrap();
        let labels = ClassLabels::default();
        assert!(decode_predictions(&[0.0; 5], layout, &params(), &labels).is_err());
    }
}
