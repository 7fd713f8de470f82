//! Pausable frame clock for the render loop.
//!
//! The clock measures two things: the delta between consecutive `tick()`
//! calls, and the total running time since `reset()` excluding any spans
//! spent stopped. Stopping the clock (window minimized, app unfocused)
//! freezes total time and forces the delta to zero until it is started
//! again.

use std::time::{Duration, Instant};

/// Wall-clock timer producing per-tick delta and total time, pausable.
#[derive(Debug)]
pub struct FrameClock {
    base: Instant,
    prev_tick: Instant,
    stop_point: Option<Instant>,
    paused_total: Duration,
    delta: Duration,
}

impl FrameClock {
    /// Create a new clock, started and running from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            base: now,
            prev_tick: now,
            stop_point: None,
            paused_total: Duration::ZERO,
            delta: Duration::ZERO,
        }
    }

    /// Restart time measurement from now, discarding accumulated state.
    ///
    /// Call once before entering the main loop.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.base = now;
        self.prev_tick = now;
        self.stop_point = None;
        self.paused_total = Duration::ZERO;
        self.delta = Duration::ZERO;
    }

    /// Stop (pause) the clock. While stopped, `tick()` yields zero deltas
    /// and total time stays frozen.
    pub fn stop(&mut self) {
        if self.stop_point.is_none() {
            self.stop_point = Some(Instant::now());
        }
    }

    /// Resume a stopped clock. The span spent stopped is excluded from
    /// total time.
    pub fn start(&mut self) {
        if let Some(stopped_at) = self.stop_point.take() {
            let now = Instant::now();
            self.paused_total += now - stopped_at;
            self.prev_tick = now;
        }
    }

    /// Whether the clock is currently stopped.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop_point.is_some()
    }

    /// Advance the clock by one frame. Call once per loop iteration.
    pub fn tick(&mut self) {
        if self.stop_point.is_some() {
            self.delta = Duration::ZERO;
            return;
        }

        let now = Instant::now();
        self.delta = now - self.prev_tick;
        self.prev_tick = now;
    }

    /// Time elapsed between the two most recent `tick()` calls, in seconds.
    #[inline]
    pub fn delta_time(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total running time since `reset()`, in seconds, excluding time spent
    /// stopped.
    pub fn total_time(&self) -> f32 {
        let end = self.stop_point.unwrap_or_else(Instant::now);
        (end - self.base - self.paused_total).as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_tick_produces_positive_delta() {
        let mut clock = FrameClock::new();
        sleep(Duration::from_millis(5));
        clock.tick();
        assert!(clock.delta_time() > 0.0);
    }

    #[test]
    fn test_delta_is_zero_while_stopped() {
        let mut clock = FrameClock::new();
        clock.stop();
        sleep(Duration::from_millis(5));
        clock.tick();
        assert_eq!(clock.delta_time(), 0.0);
    }

    #[test]
    fn test_total_time_excludes_stopped_span() {
        let mut clock = FrameClock::new();
        sleep(Duration::from_millis(10));
        clock.stop();
        let frozen = clock.total_time();
        sleep(Duration::from_millis(200));
        // Still stopped: total must not have advanced
        assert_eq!(clock.total_time(), frozen);

        clock.start();
        sleep(Duration::from_millis(5));
        let resumed = clock.total_time();
        // The 200ms paused span is excluded, so resumed total is close to
        // the pre-stop total plus the post-start sleep, not the wall time.
        assert!(resumed >= frozen);
        assert!(resumed < frozen + 0.1, "paused span leaked into total");
    }

    #[test]
    fn test_reset_clears_state() {
        let mut clock = FrameClock::new();
        sleep(Duration::from_millis(5));
        clock.stop();
        clock.reset();
        assert!(!clock.is_stopped());
        assert!(clock.total_time() < 0.05);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut clock = FrameClock::new();
        clock.stop();
        let first = clock.total_time();
        clock.stop();
        assert_eq!(clock.total_time(), first);
    }
}
