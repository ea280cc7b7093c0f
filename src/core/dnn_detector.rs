use anyhow::{anyhow, bail, Context, Result};
use opencv::{core, dnn, imgproc, prelude::*};
use std::path::Path;
use std::time::Instant;

use super::config::DetectionConfig;
use super::detection::DetectionResult;
use super::detector::{decode_predictions, DecodeParams, Detector, Letterbox, OutputLayout};
use super::labels::ClassLabels;
use super::nms::non_max_suppression;

/// Fill value for the letterbox bars, the grey Ultralytics trains with.
const PAD_VALUE: f64 = 114.0;

/// YOLO detector running an ONNX export through OpenCV's DNN module.
pub struct DnnDetector {
    net: dnn::Net,
    labels: ClassLabels,
    labels_from_file: bool,
    input_size: i32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl DnnDetector {
    /// Load the model named in `config`. Any failure here is fatal for the caller.
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        let labels = match &config.labels_path {
            Some(path) => ClassLabels::load(path)?,
            None => ClassLabels::default(),
        };
        let mut detector = Self::from_path(&config.model_path, config.input_size as i32, labels)?;
        detector.labels_from_file = config.labels_path.is_some();
        detector.confidence_threshold = config.confidence_threshold;
        detector.iou_threshold = config.iou_threshold;
        Ok(detector)
    }

    pub fn from_path(model_path: &Path, input_size: i32, labels: ClassLabels) -> Result<Self> {
        let path_str = model_path
            .to_str()
            .ok_or_else(|| anyhow!("Model path is not valid UTF-8: {}", model_path.display()))?;
        if !model_path.exists() {
            bail!("Model file not found: {}", model_path.display());
        }

        let mut net = dnn::read_net_from_onnx(path_str)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;
        if net.empty()? {
            bail!("OpenCV returned an empty network for {}", model_path.display());
        }
        net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)?;
        net.set_preferable_target(dnn::DNN_TARGET_CPU)?;

        let threads = num_cpus::get() as i32;
        core::set_num_threads(threads).context("Failed to set OpenCV thread count")?;

        log::info!(
            "Loaded model {} ({}x{} input, {} labels, {} threads)",
            model_path.display(),
            input_size,
            input_size,
            labels.len(),
            threads
        );

        Ok(Self {
            net,
            labels,
            labels_from_file: false,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        })
    }

    /// Scale `frame` into a grey square canvas, keeping its aspect ratio.
    fn letterbox(&self, frame: &Mat, fit: &Letterbox) -> Result<Mat> {
        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            core::Size::new(fit.new_width, fit.new_height),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .context("Failed to resize frame for inference")?;

        let mut canvas = Mat::new_rows_cols_with_default(
            self.input_size,
            self.input_size,
            frame.typ(),
            core::Scalar::all(PAD_VALUE),
        )?;
        {
            let roi = core::Rect::new(fit.pad_x, fit.pad_y, resized.cols(), resized.rows());
            let mut canvas_roi = Mat::roi_mut(&mut canvas, roi)?;
            resized.copy_to(&mut canvas_roi)?;
        }
        Ok(canvas)
    }

    fn forward(&mut self, frame: &Mat, fit: &Letterbox) -> Result<Mat> {
        let canvas = self.letterbox(frame, fit)?;
        let blob = dnn::blob_from_image(
            &canvas,
            1.0 / 255.0,
            core::Size::new(self.input_size, self.input_size),
            core::Scalar::default(),
            true,
            false,
            core::CV_32F,
        )
        .context("Failed to build input blob")?;
        self.net
            .set_input(&blob, "", 1.0, core::Scalar::default())
            .context("Failed to set network input")?;
        self.net.forward_single("").context("Inference failed")
    }
}

impl Detector<Mat> for DnnDetector {
    fn name(&self) -> &'static str {
        "opencv-dnn"
    }

    fn detect(&mut self, frame: &Mat) -> Result<DetectionResult> {
        let start = Instant::now();
        let fit = Letterbox::fit(frame.cols(), frame.rows(), self.input_size);
        let output = self.forward(frame, &fit)?;

        let shape: Vec<i32> = output.mat_size().iter().copied().collect();
        let layout = OutputLayout::from_shape(&shape)?;
        let data = output
            .data_typed::<f32>()
            .context("Model output is not a continuous f32 tensor")?;

        let params = DecodeParams {
            confidence_threshold: self.confidence_threshold,
            letterbox: fit,
            frame_width: frame.cols() as f32,
            frame_height: frame.rows() as f32,
        };
        let candidates = decode_predictions(data, layout, &params, &self.labels)?;
        let detections = non_max_suppression(candidates, self.iou_threshold);

        let elapsed = start.elapsed();
        log::debug!(
            "{} detections in {:.1}ms",
            detections.len(),
            elapsed.as_secs_f64() * 1000.0
        );
        Ok(DetectionResult::new(detections, elapsed))
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Mat::zeros(self.input_size, self.input_size, core::CV_8UC3)?.to_mat()?;
        let fit = Letterbox::fit(self.input_size, self.input_size, self.input_size);
        let output = self.forward(&blank, &fit).context("Model warm-up failed")?;

        let shape: Vec<i32> = output.mat_size().iter().copied().collect();
        let layout = OutputLayout::from_shape(&shape)?;
        log::info!(
            "Model output {:?}: {} classes, {} candidates",
            shape,
            layout.class_count(),
            layout.candidates
        );
        let labels = std::mem::take(&mut self.labels);
        self.labels = labels.reconcile(layout.class_count(), self.labels_from_file);
        Ok(())
    }
}
