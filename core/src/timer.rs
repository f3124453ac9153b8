use std::time::Duration;

/// Countdown timer advanced by elapsed durations rather than by reading the clock,
/// so the gateway loop can be driven with synthetic time in tests.
#[derive(Debug, Clone)]
pub struct Timer {
    timeout: Duration,
    elapsed: Duration,
    running: bool,
}

impl Timer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            elapsed: Duration::ZERO,
            running: false,
        }
    }

    /// (Re)start from zero
    pub fn start(&mut self) {
        self.elapsed = Duration::ZERO;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.elapsed = Duration::ZERO;
    }

    pub fn clock(&mut self, elapsed: Duration) {
        if self.running {
            self.elapsed = self.elapsed.saturating_add(elapsed);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True once a running timer has reached its timeout
    pub fn has_expired(&self) -> bool {
        self.running && self.elapsed >= self.timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Fires once per `period` of accumulated time, carrying the remainder over
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    accumulated: Duration,
}

impl Pacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            accumulated: Duration::ZERO,
        }
    }

    pub fn clock(&mut self, elapsed: Duration) {
        self.accumulated = self.accumulated.saturating_add(elapsed);
    }

    /// Consume one period if it is due
    pub fn tick(&mut self) -> bool {
        if self.accumulated >= self.period {
            self.accumulated -= self.period;
            true
        } else {
            false
        }
    }

    /// Drop any backlog, used when the lane goes idle
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_expiry() {
        let mut timer = Timer::new(Duration::from_millis(1500));
        timer.clock(Duration::from_secs(10));
        assert!(!timer.has_expired(), "stopped timer never expires");

        timer.start();
        timer.clock(Duration::from_millis(1000));
        assert!(!timer.has_expired());
        timer.clock(Duration::from_millis(500));
        assert!(timer.has_expired());

        timer.start();
        assert!(!timer.has_expired());
        timer.stop();
        assert!(!timer.is_running());
    }

    #[test]
    fn test_pacer_carries_remainder() {
        let mut pacer = Pacer::new(Duration::from_millis(55));
        pacer.clock(Duration::from_millis(50));
        assert!(!pacer.tick());
        pacer.clock(Duration::from_millis(65));
        assert!(pacer.tick());
        assert!(pacer.tick());
        assert!(!pacer.tick());
        pacer.clock(Duration::from_millis(200));
        pacer.reset();
        assert!(!pacer.tick());
    }
}
