//! Frame timing for the cache.
//!
//! This module provides:
//! - [`FrameClock`] - logical clock advanced by the host once per tick
//! - [`FpsSampler`] - frame-rate estimate over a fixed sampling window
//!
//! The cache never reads wall time for record timestamps; `last_used_at`
//! values are offsets on the [`FrameClock`], which keeps eviction timing
//! deterministic under test.
//!
//! # Examples
//!
//! ```
//! use bundle_cache::time::{FpsSampler, FrameClock};
//! use std::time::Duration;
//!
//! let mut clock = FrameClock::new();
//! let mut fps = FpsSampler::new(Duration::from_secs(1));
//!
//! for _ in 0..60 {
//!     let delta = Duration::from_millis(16);
//!     clock.advance(delta);
//!     fps.record(delta);
//! }
//! assert_eq!(clock.frame_count(), 60);
//! assert!(fps.fps() > 55.0);
//! ```

use std::time::Duration;

/// Timestamp on the cache's logical clock (time since the clock started)
pub type Timestamp = Duration;

/// Logical clock advanced by `run_tick`
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    /// Time since last tick
    delta: Duration,
    /// Total elapsed time since start
    now: Timestamp,
    /// Tick counter
    frame_count: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one tick of `delta`
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.now += delta;
        self.frame_count += 1;
    }

    /// Current logical time
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Duration of the last tick
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Time elapsed since `earlier`, saturating at zero
    pub fn since(&self, earlier: Timestamp) -> Duration {
        self.now.saturating_sub(earlier)
    }
}

/// Frame-rate estimate, refreshed once per sampling window
#[derive(Clone, Debug)]
pub struct FpsSampler {
    interval: Duration,
    accumulated: Duration,
    frames: u32,
    fps: f32,
}

impl FpsSampler {
    /// Create with the given sampling window
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: Duration::ZERO,
            frames: 0,
            // optimistic until the first window closes so the sweep isn't
            // blocked during start-up
            fps: f32::MAX,
        }
    }

    /// Record one frame of length `delta`; returns the current estimate
    pub fn record(&mut self, delta: Duration) -> f32 {
        self.accumulated += delta;
        self.frames += 1;

        if self.accumulated >= self.interval && !self.accumulated.is_zero() {
            self.fps = self.frames as f32 / self.accumulated.as_secs_f32();
            self.accumulated = Duration::ZERO;
            self.frames = 0;
        }
        self.fps
    }

    /// Last computed estimate
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FpsSampler {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_creation() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_clock_advance() {
        let mut clock = FrameClock::new();
        clock.advance(Duration::from_millis(16));
        clock.advance(Duration::from_millis(17));
        assert_eq!(clock.now(), Duration::from_millis(33));
        assert_eq!(clock.delta(), Duration::from_millis(17));
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn test_since_saturates() {
        let mut clock = FrameClock::new();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.since(Duration::from_secs(5)), Duration::ZERO);
        assert_eq!(clock.since(Duration::ZERO), Duration::from_secs(1));
    }

    #[test]
    fn test_fps_before_first_window() {
        let mut fps = FpsSampler::new(Duration::from_secs(1));
        fps.record(Duration::from_millis(100));
        assert_eq!(fps.fps(), f32::MAX);
    }

    #[test]
    fn test_fps_slow_frames() {
        let mut fps = FpsSampler::new(Duration::from_secs(1));
        // 10 FPS for one second
        for _ in 0..10 {
            fps.record(Duration::from_millis(100));
        }
        assert!((fps.fps() - 10.0).abs() < 0.5);
    }
}
