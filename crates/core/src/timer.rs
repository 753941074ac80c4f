//! Frame rate counter for the render loop.

use std::time::{Duration, Instant};

/// Counts frames and reports the average rate once per interval.
#[derive(Debug)]
pub struct FrameTimer {
    interval: Duration,
    window_start: Instant,
    frames: u32,
    total_frames: u64,
}

impl FrameTimer {
    /// Creates a timer reporting once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            frames: 0,
            total_frames: 0,
        }
    }

    /// Records one presented frame.
    ///
    /// Returns the frames-per-second average when the current interval has
    /// elapsed, then starts a new interval.
    pub fn frame(&mut self) -> Option<f32> {
        self.frame_at(Instant::now())
    }

    fn frame_at(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        self.total_frames += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    /// Total number of frames recorded since creation.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_once_per_interval() {
        let mut timer = FrameTimer::new(Duration::from_millis(100));
        let start = timer.window_start;

        assert!(timer.frame_at(start + Duration::from_millis(10)).is_none());
        assert!(timer.frame_at(start + Duration::from_millis(50)).is_none());

        let fps = timer
            .frame_at(start + Duration::from_millis(100))
            .expect("interval elapsed");
        assert!((fps - 30.0).abs() < 0.01);

        // The window restarted, so the next frame is not reported
        assert!(timer.frame_at(start + Duration::from_millis(120)).is_none());
        assert_eq!(timer.total_frames(), 4);
    }
}
