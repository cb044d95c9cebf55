// Drift-corrected tick scheduling
//
// Deadlines advance by exactly one interval per tick from a fixed baseline,
// so a slow cycle shortens the following wait instead of shifting every
// later deadline. Long-run average rate stays at the target even when
// individual cycles jitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Sleep granularity while waiting for a deadline; short enough that a stop
/// request is observed promptly.
const POLL_SLICE: Duration = Duration::from_millis(2);

/// Fixed-rate scheduler with absolute deadlines.
pub struct TickClock {
    interval: Duration,
    next_deadline: Instant,
}

impl TickClock {
    /// Create a clock ticking at `rate_hz`. The first deadline is "now", so
    /// the first tick fires immediately.
    pub fn new(rate_hz: f32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / rate_hz as f64);
        Self {
            interval,
            next_deadline: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Wait until the current deadline, then advance it by one interval.
    ///
    /// Returns false without advancing when `running` is cleared while
    /// waiting. If the deadline is already past (a slow previous cycle),
    /// returns immediately; the advance is still exactly one interval.
    pub fn tick(&mut self, running: &AtomicBool) -> bool {
        loop {
            if !running.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= self.next_deadline {
                break;
            }
            let remaining = self.next_deadline - now;
            thread::sleep(remaining.min(POLL_SLICE));
        }
        self.next_deadline += self.interval;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rate() {
        let clock = TickClock::new(90.0);
        let micros = clock.interval().as_micros();
        // 1/90 s = 11_111.1 us.
        assert!((11_110..=11_112).contains(&micros), "got {} us", micros);
    }

    #[test]
    fn test_deadlines_advance_one_interval_per_tick() {
        let running = AtomicBool::new(true);
        let mut clock = TickClock::new(200.0);
        let baseline = clock.next_deadline();
        let interval = clock.interval();

        for n in 1..=5u32 {
            assert!(clock.tick(&running));
            assert_eq!(clock.next_deadline(), baseline + interval * n);
        }
    }

    #[test]
    fn test_slow_cycle_does_not_shift_later_deadlines() {
        let running = AtomicBool::new(true);
        let mut clock = TickClock::new(100.0);
        let baseline = clock.next_deadline();
        let interval = clock.interval();

        assert!(clock.tick(&running));
        // Simulate a cycle that overruns several periods.
        thread::sleep(interval * 3);
        assert!(clock.tick(&running));
        assert!(clock.tick(&running));

        // Deadlines stay on the original grid.
        assert_eq!(clock.next_deadline(), baseline + interval * 3);
    }

    #[test]
    fn test_stop_flag_aborts_wait() {
        let running = AtomicBool::new(false);
        let mut clock = TickClock::new(1.0);
        let before = clock.next_deadline();
        let start = Instant::now();
        assert!(!clock.tick(&running));
        // Returned quickly and left the deadline untouched.
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(clock.next_deadline(), before);
    }

    #[test]
    fn test_average_rate_holds_under_jitter() {
        let running = AtomicBool::new(true);
        let mut clock = TickClock::new(500.0);
        let start = Instant::now();
        let ticks = 50u32;
        for i in 0..ticks {
            assert!(clock.tick(&running));
            if i % 7 == 0 {
                thread::sleep(Duration::from_millis(3));
            }
        }
        // The first tick fires at the baseline, so N ticks span N-1 intervals.
        let expected = clock.interval() * (ticks - 1);
        let elapsed = start.elapsed();
        // Never finishes ahead of the deadline grid, and catch-up keeps it
        // from drifting far behind.
        assert!(elapsed >= expected);
        assert!(elapsed < expected + Duration::from_millis(60));
    }
}
