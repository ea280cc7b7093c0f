mod core;
mod decoder;
mod renderer;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::config::{DetectionConfig, DEFAULT_MODEL, DEFAULT_WINDOW_TITLE};
use crate::core::detection_loop;
use crate::core::detector::Detector;
use crate::core::dnn_detector::DnnDetector;
use crate::decoder::{Camera, FrameSource};
use crate::renderer::{DisplayManager, OverlayRenderer};

#[derive(Parser)]
#[command(author, version, about = "Real-time YOLO object detection on a webcam", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the camera and print its negotiated properties as JSON
    Probe {
        #[arg(short, long, default_value_t = 0)]
        camera: i32,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
    },
}

#[derive(Args)]
struct RunArgs {
    /// ONNX export of the detection model
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: PathBuf,
    /// Class names: JSON array (.json) or one name per line
    #[arg(short, long)]
    labels: Option<PathBuf>,
    #[arg(short, long, default_value_t = 0)]
    camera: i32,
    #[arg(long, default_value_t = 640, help = "Requested capture width (the device may ignore it)")]
    width: u32,
    #[arg(long, default_value_t = 480, help = "Requested capture height (the device may ignore it)")]
    height: u32,
    #[arg(long, default_value_t = 640, help = "Square network input size, multiple of 32")]
    input_size: u32,
    #[arg(long, default_value_t = 0.25)]
    conf: f32,
    #[arg(long, default_value_t = 0.7)]
    iou: f32,
    #[arg(long, default_value = DEFAULT_WINDOW_TITLE)]
    title: String,
}

impl From<RunArgs> for DetectionConfig {
    fn from(args: RunArgs) -> Self {
        Self {
            model_path: args.model,
            labels_path: args.labels,
            camera_index: args.camera,
            frame_width: args.width,
            frame_height: args.height,
            input_size: args.input_size,
            confidence_threshold: args.conf,
            iou_threshold: args.iou,
            window_title: args.title,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Probe { camera, width, height }) => probe_camera(camera, width, height)?,
        None => run_detection(cli.run.into())?,
    }

    Ok(())
}

fn run_detection(config: DetectionConfig) -> Result<()> {
    config.validate()?;

    // Model first: a model that fails to load aborts before the camera is touched
    let mut detector = DnnDetector::new(&config)?;
    detector.warm_up()?;
    log::info!("Inference backend: {}", detector.name());
    let renderer = OverlayRenderer::new();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error registering Ctrl-C handler")?;

    detection_loop::launch(
        || Camera::open(config.camera_index, config.frame_width, config.frame_height),
        || DisplayManager::new(&config.window_title),
        &mut detector,
        &renderer,
        &running,
    )?;

    Ok(())
}

fn probe_camera(device: i32, width: u32, height: u32) -> Result<()> {
    let mut camera = Camera::open(device, width, height)?;
    println!("{}", serde_json::to_string_pretty(camera.info())?);
    camera.release()
}
