//! Tick period helpers for afc_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Period in microseconds of a tick rate, never below 1 us. `hz = 0` is
/// treated as 1 Hz.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Step tick period for a step rate.
#[inline]
pub fn step_period(hz: u32) -> Duration {
    Duration::from_micros(period_us(hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_step_rates() {
        assert_eq!(step_period(6_400), Duration::from_micros(156));
        assert_eq!(step_period(3_200), Duration::from_micros(312));
        assert_eq!(period_us(0), MICROS_PER_SEC);
        assert_eq!(period_us(u32::MAX), 1);
    }
}
