// src/frame/fps.rs

//! Frame-rate measurement against wall-clock time.
use std::time::{Duration, Instant};

/// Tracks the instantaneous rate between two draw frames and a rolling
/// average refreshed every `report_interval`.
#[derive(Debug)]
pub struct FpsMonitor {
    last_tick: Option<(Instant, u64)>,
    window_start: Option<(Instant, u64)>,
    report_interval: Duration,
    fps: f32,
    lfps: f32,
}

impl FpsMonitor {
    pub fn new() -> Self {
        Self::with_interval(Duration::from_millis(500))
    }

    pub fn with_interval(report_interval: Duration) -> Self {
        Self {
            last_tick: None,
            window_start: None,
            report_interval,
            fps: 0.0,
            lfps: 0.0,
        }
    }

    /// Records a draw frame. `framecount` counts every frame, so non-draw
    /// frames in between are included in the rate.
    ///
    /// Returns `(instantaneous, smoothed)`.
    pub fn tick(&mut self, framecount: u64, now: Instant) -> (f32, f32) {
        if let Some((then, frames)) = self.last_tick {
            let elapsed = now.saturating_duration_since(then).as_secs_f32();
            if elapsed > 0.0 {
                self.fps = framecount.saturating_sub(frames) as f32 / elapsed;
            }
        }
        self.last_tick = Some((now, framecount));

        match self.window_start {
            Some((start, frames)) => {
                let elapsed = now.saturating_duration_since(start);
                if elapsed >= self.report_interval {
                    self.lfps =
                        framecount.saturating_sub(frames) as f32 / elapsed.as_secs_f32();
                    self.window_start = Some((now, framecount));
                }
            }
            None => self.window_start = Some((now, framecount)),
        }

        (self.fps, self.lfps)
    }

    pub fn fps(&self) -> (f32, f32) {
        (self.fps, self.lfps)
    }
}

impl Default for FpsMonitor {
    fn default() -> Self {
        Self::new()
    }
}
