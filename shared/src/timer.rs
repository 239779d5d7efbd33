use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock time in milliseconds since the Unix epoch. Used wherever a
/// timestamp must survive externalization; protocol-internal timers use
/// `Instant` instead.
pub type TimeMillis = u64;

/// The current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> TimeMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// A Timer with a given duration. Time advances only through the `now`
/// argument, so protocol code stays testable without sleeping.
pub struct Timer {
    duration: Duration,
    last: Instant,
}

impl Timer {
    /// Creates a new Timer that rings `duration` from now
    pub fn new(duration: Duration) -> Self {
        Timer {
            duration,
            last: Instant::now(),
        }
    }

    /// Whether the timer has rung
    pub fn ringing(&self, now: &Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.duration
    }

    /// Restarts the timer from `now`, keeping its duration
    pub fn reset(&mut self, now: &Instant) {
        self.last = *now;
    }

    /// Restarts the timer from `now` with a new duration
    pub fn rearm(&mut self, duration: Duration, now: &Instant) {
        self.duration = duration;
        self.last = *now;
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Applies a random variation of up to `fraction` in either direction to a
/// duration, so independent endpoints never fall into lockstep timing
pub fn vary(duration: Duration, fraction: f32) -> Duration {
    if fraction <= 0.0 {
        return duration;
    }
    // scale in [1 - fraction, 1 + fraction]
    let scale = 1.0 + fraction * (fastrand::f32() * 2.0 - 1.0);
    duration.mul_f32(scale.max(0.0))
}
