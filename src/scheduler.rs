//! Fixed-period tick source for the control loops.
//!
//! On the robot itself, yaw integration and velocity correction hang off
//! hardware timer interrupts. Here both loops run off a `Ticker`: a sleeper
//! that tracks an absolute deadline so the period stays consistent even when
//! individual iterations take variable time. The property that matters is
//! the bounded, consistent sampling period, not the timer mechanism.

use std::time::{Duration, Instant};

/// Absolute-deadline periodic sleeper.
///
/// A zero period disables throttling entirely; the loop then runs as fast as
/// the host allows. Tests use this to execute missions in milliseconds while
/// keeping the kinematic timestep fixed.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    /// Sleep until the next deadline, then advance it by one period.
    ///
    /// If the loop overran the deadline, the next deadline is re-anchored to
    /// now rather than letting a backlog of missed ticks fire back-to-back.
    pub fn wait(&mut self) {
        if self.period.is_zero() {
            return;
        }

        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            self.next = now + self.period;
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_period_never_sleeps() {
        let mut ticker = Ticker::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10_000 {
            ticker.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_period_is_maintained() {
        let mut ticker = Ticker::new(Duration::from_millis(2));
        let start = Instant::now();
        for _ in 0..5 {
            ticker.wait();
        }
        // Five 2ms ticks should take at least ~10ms.
        assert!(start.elapsed() >= Duration::from_millis(9));
    }
}
