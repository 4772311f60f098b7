//! Slow-tick watchdog.
//!
//! The housekeeping tick must be processed within a bounded window; if it is
//! not, the run fails with `FatalReason::Watchdog` and the caller is expected
//! to restart.

use std::time::Duration;

use crate::error::{AfcError, FatalReason};

#[derive(Debug, Clone)]
pub struct SlowTickWatchdog {
    timeout: Duration,
    last_kick: Duration,
}

impl SlowTickWatchdog {
    /// `now` is the elapsed time since the run started.
    pub fn new(timeout: Duration, now: Duration) -> Self {
        Self {
            timeout,
            last_kick: now,
        }
    }

    pub fn kick(&mut self, now: Duration) {
        self.last_kick = now;
    }

    /// Time since the last kick.
    pub fn starved_for(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_kick)
    }

    pub fn check(&self, now: Duration) -> Result<(), AfcError> {
        let starved = self.starved_for(now);
        if starved > self.timeout {
            tracing::error!(
                starved_ms = u64::try_from(starved.as_millis()).unwrap_or(u64::MAX),
                "slow tick watchdog expired"
            );
            return Err(AfcError::Fatal(FatalReason::Watchdog));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_only_past_timeout() {
        let mut wd = SlowTickWatchdog::new(Duration::from_secs(8), Duration::ZERO);
        assert!(wd.check(Duration::from_secs(8)).is_ok());
        assert!(matches!(
            wd.check(Duration::from_millis(8_001)),
            Err(AfcError::Fatal(FatalReason::Watchdog))
        ));
        wd.kick(Duration::from_secs(8));
        assert!(wd.check(Duration::from_secs(10)).is_ok());
    }
}
