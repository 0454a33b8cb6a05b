//! Frame-rate governor for the sender loop.
//!
//! Each iteration marks the start of a frame, produces and sends it, then
//! sleeps for whatever is left of the frame budget. An iteration that ran
//! over budget proceeds immediately; there is no catch-up and no frame
//! skipping.

use std::time::{Duration, Instant};

/// Highest frame rate the pacer accepts.
pub const MAX_FPS: u32 = 240;

/// Remaining wait in microseconds for a frame that took `elapsed_us`.
///
/// `max(0, 1e6 / target_fps - elapsed_us)`.
pub fn wait_time_us(target_fps: u32, elapsed_us: u64) -> u64 {
    let frame_time_us = 1_000_000 / u64::from(target_fps.max(1));
    frame_time_us.saturating_sub(elapsed_us)
}

pub struct Pacer {
    target_fps: u32,
    frame_interval: Duration,
    frame_start: Instant,
}

impl Pacer {
    /// `target_fps` is clamped to `1..=MAX_FPS`.
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.clamp(1, MAX_FPS);
        Self {
            target_fps,
            frame_interval: Duration::from_micros(wait_time_us(target_fps, 0)),
            frame_start: Instant::now(),
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Mark the start of a frame's production.
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Wait owed for a frame that took `elapsed`.
    pub fn wait_time(&self, elapsed: Duration) -> Duration {
        self.frame_interval.saturating_sub(elapsed)
    }

    /// Wait owed right now for the frame started by [`begin_frame`](Self::begin_frame).
    pub fn remaining(&self) -> Duration {
        self.wait_time(self.frame_start.elapsed())
    }

    /// Sleep for the remainder of the frame budget.
    pub async fn pace(&self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_time_under_budget() {
        assert_eq!(wait_time_us(30, 10_000), 23_333);
    }

    #[test]
    fn wait_time_over_budget_is_zero() {
        assert_eq!(wait_time_us(30, 40_000), 0);
        assert_eq!(wait_time_us(30, 33_333), 0);
    }

    #[test]
    fn pacer_interval_matches_formula() {
        let pacer = Pacer::new(30);
        assert_eq!(pacer.wait_time(Duration::ZERO), Duration::from_micros(33_333));
        assert_eq!(
            pacer.wait_time(Duration::from_micros(10_000)),
            Duration::from_micros(23_333)
        );
        assert_eq!(pacer.wait_time(Duration::from_millis(40)), Duration::ZERO);
    }

    #[test]
    fn fps_is_clamped() {
        assert_eq!(Pacer::new(0).target_fps(), 1);
        assert_eq!(Pacer::new(10_000).target_fps(), MAX_FPS);
    }

    #[tokio::test]
    async fn pace_sleeps_for_remainder() {
        let mut pacer = Pacer::new(50); // 20 ms budget
        pacer.begin_frame();
        let start = Instant::now();
        pacer.pace().await;
        let slept = start.elapsed();
        assert!(slept >= Duration::from_millis(15), "slept {slept:?}");
        assert!(pacer.remaining().is_zero());
    }
}
