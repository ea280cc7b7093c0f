use std::time::Instant;

/// Instantaneous frame rate from the time between consecutive ticks.
///
/// No smoothing: every tick reports `1 / Δt` against the previous tick.
#[derive(Debug, Default)]
pub struct FpsCounter {
    previous: Option<Instant>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Record a tick at `now` and return the rate since the last one.
    ///
    /// The first tick has nothing to measure against and reports 0. A zero
    /// interval also reports 0 instead of infinity.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let fps = match self.previous {
            Some(prev) => {
                let delta = now.saturating_duration_since(prev).as_secs_f64();
                if delta > 0.0 {
                    1.0 / delta
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.previous = Some(now);
        fps
    }
}
