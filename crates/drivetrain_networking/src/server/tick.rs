//! # Tick Pacer
//!
//! Fixed-period pacing for the orchestrator loop.
//!
//! ## Design
//!
//! A tick runs its three exchanges back to back, then the pacer sleeps for
//! whatever is left of the period. A tick that overruns is counted as late
//! and the next one starts immediately; no catch-up ticks are run.

use std::fmt;
use std::time::{Duration, Instant};

/// Remaining time below which the pacer spins instead of sleeping.
const SPIN_THRESHOLD: Duration = Duration::from_micros(500);

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Number of late ticks (took longer than the period).
    pub late_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn new(period: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: period.as_micros() as u64,
            late_ticks: 0,
            total_ticks: 0,
        }
    }

    fn record(&mut self, duration: Duration, period: Duration) {
        let duration_us = duration.as_micros() as u64;
        self.total_ticks += 1;
        self.min_tick_us = self.min_tick_us.min(duration_us);
        self.max_tick_us = self.max_tick_us.max(duration_us);
        self.avg_tick_us = (self.avg_tick_us * 15 + duration_us) / 16;
        if duration > period {
            self.late_ticks += 1;
        }
    }
}

impl fmt::Display for TickStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total_ticks == 0 {
            return f.write_str("no ticks");
        }
        write!(
            f,
            "{} ticks, min {}us, max {}us, avg {}us, {} late",
            self.total_ticks, self.min_tick_us, self.max_tick_us, self.avg_tick_us, self.late_ticks
        )
    }
}

/// Fixed-period tick controller.
#[derive(Debug)]
pub struct TickPacer {
    period: Duration,
    stats: TickStats,
}

impl TickPacer {
    /// Creates a pacer with the given period.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            stats: TickStats::new(period),
        }
    }

    /// Marks the start of a tick.
    #[must_use]
    pub fn begin_tick(&self) -> Instant {
        Instant::now()
    }

    /// Marks the end of a tick started at `start` and records its duration.
    pub fn end_tick(&mut self, start: Instant) {
        self.stats.record(start.elapsed(), self.period);
    }

    /// Blocks until one period has passed since `start`.
    ///
    /// Sleeps for most of the remainder, then spins for precision.
    pub fn wait_for_next_tick(&self, start: Instant) {
        let deadline = start + self.period;
        let now = Instant::now();
        if now >= deadline {
            return;
        }

        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD * 2 {
            std::thread::sleep(remaining - SPIN_THRESHOLD);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.stats.total_ticks
    }

    /// Tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// The nominal period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_creation() {
        let pacer = TickPacer::new(Duration::from_micros(16_600));
        assert_eq!(pacer.tick_count(), 0);
        assert_eq!(pacer.period(), Duration::from_micros(16_600));
        assert_eq!(pacer.stats().to_string(), "no ticks");
    }

    #[test]
    fn test_wait_fills_the_period() {
        let pacer = TickPacer::new(Duration::from_millis(5));
        let start = pacer.begin_tick();
        pacer.wait_for_next_tick(start);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_overrun_does_not_wait() {
        let pacer = TickPacer::new(Duration::from_millis(1));
        let start = pacer.begin_tick();
        std::thread::sleep(Duration::from_millis(3));
        let before = Instant::now();
        pacer.wait_for_next_tick(start);
        assert!(before.elapsed() < Duration::from_millis(1));
    }

    #[test]
    fn test_stats_tracking() {
        let mut pacer = TickPacer::new(Duration::from_millis(1));
        for _ in 0..5 {
            let start = pacer.begin_tick();
            std::thread::sleep(Duration::from_micros(50));
            pacer.end_tick(start);
        }

        let start = pacer.begin_tick();
        std::thread::sleep(Duration::from_millis(2));
        pacer.end_tick(start);

        let stats = pacer.stats();
        assert_eq!(stats.total_ticks, 6);
        assert_eq!(pacer.tick_count(), 6);
        assert!(stats.min_tick_us > 0);
        assert!(stats.min_tick_us <= stats.max_tick_us);
        assert!(stats.late_ticks >= 1);
    }
}
