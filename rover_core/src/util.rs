//! Common time/period helpers for rover_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the period in microseconds for a given rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Whole periods contained in `elapsed`.
#[inline]
pub fn whole_periods(elapsed: Duration, period: Duration) -> usize {
    let period_ns = period.as_nanos().max(1);
    usize::try_from(elapsed.as_nanos() / period_ns).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_clamps_zero_rate() {
        assert_eq!(period_us(0), MICROS_PER_SEC);
        assert_eq!(period_us(15), 66_666);
    }

    #[test]
    fn whole_periods_truncates() {
        let p = Duration::from_millis(66);
        assert_eq!(whole_periods(Duration::from_millis(65), p), 0);
        assert_eq!(whole_periods(Duration::from_millis(200), p), 3);
        assert_eq!(whole_periods(Duration::from_secs(1), Duration::ZERO), 1_000_000_000);
    }
}
