//! Simulation time and frame timing.
//!
//! [`SimClock`] is the explicit simulation clock: the caller advances it by a
//! timestep and threads the resulting time into the obstacle script and the
//! reset schedule. [`FrameTimer`] measures wall-clock frame rate for logging.
//!
//! ```ignore
//! let mut clock = SimClock::new(5.0);
//! let mut timer = FrameTimer::new();
//!
//! // In the render loop:
//! let t = clock.advance(1.0 / 60.0);
//! if clock.reset_due() {
//!     blob.initialize(&generator.generate())?;
//!     clock.rewind();
//! }
//! if let Some(fps) = timer.tick() {
//!     log::info!("{:.1} fps", fps);
//! }
//! ```

use std::time::{Duration, Instant};

/// Simulation clock advanced explicitly by the caller.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Simulation seconds since the last rewind.
    elapsed: f32,
    /// Seconds between periodic resets; `None` disables them.
    reset_interval: Option<f32>,
    /// Whether advances are ignored.
    paused: bool,
}

impl SimClock {
    /// Clock resetting every `reset_interval` simulation seconds.
    pub fn new(reset_interval: f32) -> Self {
        Self {
            elapsed: 0.0,
            reset_interval: (reset_interval > 0.0).then_some(reset_interval),
            paused: false,
        }
    }

    /// Clock that never asks for a reset.
    pub fn unbounded() -> Self {
        Self {
            reset_interval: None,
            ..Self::new(0.0)
        }
    }

    /// Move time forward by `dt` seconds and return the new elapsed time.
    pub fn advance(&mut self, dt: f32) -> f32 {
        if !self.paused {
            self.elapsed += dt.max(0.0);
        }
        self.elapsed
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Whether the reset interval has passed since the last rewind.
    pub fn reset_due(&self) -> bool {
        self.reset_interval.is_some_and(|interval| self.elapsed > interval)
    }

    /// Start over from time zero.
    pub fn rewind(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(5.0)
    }
}

/// Wall-clock frame counter reporting frames per second periodically.
#[derive(Debug)]
pub struct FrameTimer {
    frame_count: u64,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    pub fn with_interval(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            frame_count: 0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: interval,
        }
    }

    /// Record a frame. Returns the new FPS figure when one was computed.
    pub fn tick(&mut self) -> Option<f32> {
        let now = Instant::now();
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
            return Some(frames_since as f32 / fps_elapsed.as_secs_f32());
        }
        None
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
