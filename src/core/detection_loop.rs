use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::core::config::{KEY_WAIT_MS, QUIT_KEY};
use crate::core::detector::Detector;
use crate::core::fps::FpsCounter;
use crate::decoder::FrameSource;
use crate::renderer::{DisplaySink, FrameRenderer};

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    QuitKey,
    FrameUnavailable,
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub exit: LoopExit,
}

/// Capture, detect, annotate and present frames until a stop condition.
///
/// `running` is cleared by the Ctrl-C handler and checked before every capture.
/// Does not release anything; see [`run_session`].
pub fn run_detection_loop<S, D, R, K>(
    source: &mut S,
    detector: &mut D,
    renderer: &R,
    display: &mut K,
    running: &AtomicBool,
) -> Result<LoopSummary>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: FrameRenderer<S::Frame>,
    K: DisplaySink<S::Frame>,
{
    run_loop_with_clock(source, detector, renderer, display, running, Instant::now)
}

/// Loop body with the FPS sample time supplied by `clock`.
fn run_loop_with_clock<S, D, R, K, C>(
    source: &mut S,
    detector: &mut D,
    renderer: &R,
    display: &mut K,
    running: &AtomicBool,
    mut clock: C,
) -> Result<LoopSummary>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: FrameRenderer<S::Frame>,
    K: DisplaySink<S::Frame>,
    C: FnMut() -> Instant,
{
    let mut fps_counter = FpsCounter::new();
    let mut frames = 0u64;

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(LoopSummary { frames, exit: LoopExit::Interrupted });
        }

        let Some(frame) = source.read_frame()? else {
            println!("Failed to grab frame.");
            return Ok(LoopSummary { frames, exit: LoopExit::FrameUnavailable });
        };

        let result = detector.detect(&frame)?;
        let mut annotated = renderer.plot(&frame, &result)?;
        drop(frame);

        let fps = fps_counter.tick(clock());
        renderer.stamp_fps(&mut annotated, fps)?;

        display.show(&annotated)?;
        frames += 1;
        log::debug!(
            "frame {}: {} detections, inference {:.1}ms, {:.2} fps",
            frames,
            result.len(),
            result.inference_time.as_secs_f64() * 1000.0,
            fps
        );

        if display.poll_key(KEY_WAIT_MS)? == Some(QUIT_KEY) {
            return Ok(LoopSummary { frames, exit: LoopExit::QuitKey });
        }
    }
}

/// Release the camera and close the windows. Failures are logged, not returned.
pub fn teardown<S, K, F>(source: &mut S, display: &mut K)
where
    S: FrameSource<Frame = F>,
    K: DisplaySink<F>,
{
    if let Err(e) = source.release() {
        log::warn!("Camera release failed: {:#}", e);
    }
    if let Err(e) = display.close_all() {
        log::warn!("Closing windows failed: {:#}", e);
    }
}

/// Run the loop, then tear down exactly once whichever way it ended.
pub fn run_session<S, D, R, K>(
    source: &mut S,
    detector: &mut D,
    renderer: &R,
    display: &mut K,
    running: &AtomicBool,
) -> Result<LoopSummary>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: FrameRenderer<S::Frame>,
    K: DisplaySink<S::Frame>,
{
    let outcome = run_detection_loop(source, detector, renderer, display, running);
    teardown(source, display);

    match &outcome {
        Ok(summary) => log::info!(
            "Detection loop ended after {} frames ({:?})",
            summary.frames,
            summary.exit
        ),
        Err(e) => log::error!("Detection loop aborted: {:#}", e),
    }
    outcome
}

/// Open the camera and window, then run a full session.
///
/// A camera that fails to open aborts before anything else happens; the
/// window is never created and the loop is never entered.
pub fn launch<S, D, R, K, OpenS, OpenK>(
    open_source: OpenS,
    open_display: OpenK,
    detector: &mut D,
    renderer: &R,
    running: &AtomicBool,
) -> Result<LoopSummary>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: FrameRenderer<S::Frame>,
    K: DisplaySink<S::Frame>,
    OpenS: FnOnce() -> Result<S>,
    OpenK: FnOnce() -> Result<K>,
{
    let mut source = open_source()?;

    let mut display = match open_display() {
        Ok(display) => display,
        Err(e) => {
            if let Err(release_err) = source.release() {
                log::warn!("Camera release failed: {:#}", release_err);
            }
            return Err(e);
        }
    };

    println!("Starting real-time detection... Press '{}' to exit.", QUIT_KEY);
    let outcome = run_session(&mut source, detector, renderer, &mut display, running);
    println!("Detection stopped.");
    outcome
}
