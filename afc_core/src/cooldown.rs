//! Idle accounting and the cooldown blend toward home.

use crate::config::CooldownCfg;
use crate::fixed_point::scale_q15;
use crate::tables::COOLDOWN;

/// Blend `hot` toward `home` by the cooldown factor for `time_off` idle ticks.
///
/// The result always lies between `home` and `hot`, and equals `home` once
/// the factor reaches zero.
pub fn blend_toward_home(hot: u16, home: u16, time_off: u32, bucket_shift: u32) -> u16 {
    let factor = COOLDOWN[cooldown_index(time_off, bucket_shift)];
    if home > hot {
        home - scale_q15(home - hot, factor)
    } else {
        home + scale_q15(hot - home, factor)
    }
}

#[inline]
fn cooldown_index(time_off: u32, bucket_shift: u32) -> usize {
    let idx = time_off.checked_shr(bucket_shift).unwrap_or(0);
    usize::try_from(idx).map_or(COOLDOWN.len() - 1, |i| i.min(COOLDOWN.len() - 1))
}

/// Per-run pulse count, idle time and the hot position.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    cfg: CooldownCfg,
    time_off: u32,
    pulses_on_this_run: u32,
    hot_position: u16,
}

impl IdleTracker {
    pub fn new(cfg: CooldownCfg, hot_position: u16) -> Self {
        Self {
            cfg,
            time_off: 0,
            pulses_on_this_run: 0,
            hot_position,
        }
    }

    pub fn time_off(&self) -> u32 {
        self.time_off
    }

    pub fn pulses_on_this_run(&self) -> u32 {
        self.pulses_on_this_run
    }

    pub fn hot_position(&self) -> u16 {
        self.hot_position
    }

    pub fn set_hot_position(&mut self, position: u16) {
        self.hot_position = position;
    }

    /// `count` pulses fired since the last observation: count them and
    /// restart the idle timer.
    pub fn on_pulses(&mut self, count: u32) {
        self.pulses_on_this_run = self.pulses_on_this_run.saturating_add(count);
        self.time_off = 0;
    }

    /// One slow tick of idle time. Returns true while cooling down; the
    /// pulse count is cleared whenever that is the case.
    pub fn tick(&mut self) -> bool {
        if self.time_off < self.cfg.idle_ceiling_ticks {
            self.time_off += 1;
        }
        let cooling = self.time_off >= self.cfg.start_after_ticks;
        if cooling {
            if self.pulses_on_this_run != 0 {
                tracing::debug!(
                    pulses = self.pulses_on_this_run,
                    hot_position = self.hot_position,
                    "pulsing stopped, cooling down"
                );
            }
            self.pulses_on_this_run = 0;
        }
        cooling
    }

    /// Cooldown target for the current idle time.
    pub fn target(&self, home: u16) -> u16 {
        blend_toward_home(self.hot_position, home, self.time_off, self.cfg.bucket_shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_starts_at_hot_and_ends_at_home() {
        assert_eq!(blend_toward_home(20_000, 15_000, 0, 9), 20_000);
        assert_eq!(blend_toward_home(10_000, 15_000, 0, 9), 10_000);
        assert_eq!(blend_toward_home(20_000, 15_000, 120_000, 9), 15_000);
        assert_eq!(blend_toward_home(10_000, 15_000, 120_000, 9), 15_000);
    }

    #[test]
    fn idle_timer_saturates_and_pulse_resets() {
        let cfg = CooldownCfg {
            start_after_ticks: 3,
            idle_ceiling_ticks: 5,
            bucket_shift: 9,
        };
        let mut t = IdleTracker::new(cfg, 100);
        t.on_pulses(1);
        assert_eq!(t.pulses_on_this_run(), 1);
        assert!(!t.tick());
        assert!(!t.tick());
        assert!(t.tick());
        assert_eq!(t.pulses_on_this_run(), 0);
        for _ in 0..10 {
            t.tick();
        }
        assert_eq!(t.time_off(), 5);
        t.on_pulses(1);
        assert_eq!(t.time_off(), 0);
    }
}
