// ABOUTME: Monotonic timing for measuring parse and validation passes.
// ABOUTME: Callers bound wall-time around a parse; the core itself never times out.
use std::time::{Duration, Instant};

/// Create a monotonic duration measurer
///
/// # Examples
///
/// ```
/// use cap_core::MonotonicTimer;
/// use std::thread;
/// use std::time::Duration;
///
/// let timer = MonotonicTimer::new();
/// thread::sleep(Duration::from_millis(1));
/// let elapsed = timer.elapsed();
/// assert!(elapsed >= Duration::from_millis(1));
/// ```
pub struct MonotonicTimer {
    start: Instant,
}

impl MonotonicTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time since creation
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in whole microseconds, for structured log fields
    pub fn elapsed_micros(&self) -> u128 {
        self.elapsed().as_micros()
    }

    /// Reset the timer to now
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_timer() {
        let timer = MonotonicTimer::new();
        thread::sleep(Duration::from_millis(1));
        let elapsed = timer.elapsed();
        // Timer should show some elapsed time, but be reasonable
        assert!(elapsed < Duration::from_secs(1));
        assert!(timer.elapsed_micros() >= 1000);
    }

    #[test]
    fn test_monotonic_timer_reset() {
        let mut timer = MonotonicTimer::new();
        thread::sleep(Duration::from_millis(1));
        let first_elapsed = timer.elapsed();
        timer.reset();
        let second_elapsed = timer.elapsed();
        // After reset, elapsed time should be less than before
        assert!(second_elapsed < first_elapsed);
    }
}
