//! High-resolution timer for frame timing.

use std::time::{Duration, Instant};

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Get the time elapsed since the last call to `tick()`.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame counter reporting an average rate once per interval.
#[derive(Debug)]
pub struct FrameStats {
    interval: Duration,
    frames: u32,
    accumulated: Duration,
    total_frames: u64,
}

impl FrameStats {
    /// Creates a counter that reports every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            frames: 0,
            accumulated: Duration::ZERO,
            total_frames: 0,
        }
    }

    /// Records a frame that took `delta`.
    ///
    /// Returns the frames per second over the last interval once the
    /// interval has passed, and starts a new one.
    pub fn record(&mut self, delta: Duration) -> Option<f32> {
        self.frames += 1;
        self.total_frames += 1;
        self.accumulated += delta;

        if self.accumulated < self.interval {
            return None;
        }

        let fps = self.frames as f32 / self.accumulated.as_secs_f32();
        self.frames = 0;
        self.accumulated = Duration::ZERO;
        Some(fps)
    }

    /// Frames recorded since creation.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
