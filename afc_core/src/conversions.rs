//! `From` implementations bridging `afc_config` types to `afc_core` types.

use crate::config::{
    ActuatorCfg, AfcCfg, ChannelSource, CooldownCfg, DirectionCfg, PowerCfg, RevPowerBand,
    TimingCfg, TravelCfg,
};
use crate::fixed_point::q15_from_f32;
use crate::sampling::LinearScaler;

// ── TravelCfg ────────────────────────────────────────────────────────────────

impl From<&afc_config::Travel> for TravelCfg {
    fn from(c: &afc_config::Travel) -> Self {
        Self {
            min_position: c.min_position,
            max_position: c.max_position,
            zero_tolerance: c.zero_tolerance,
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&afc_config::Actuator> for ActuatorCfg {
    fn from(c: &afc_config::Actuator) -> Self {
        Self {
            low_power_after_ticks: c.low_power_after_ticks,
            fast_step_hz: c.fast_step_hz,
            slow_step_hz: c.slow_step_hz,
        }
    }
}

// ── DirectionCfg ─────────────────────────────────────────────────────────────

impl From<&afc_config::Direction> for DirectionCfg {
    fn from(c: &afc_config::Direction) -> Self {
        Self {
            min_position_change: c.min_position_change,
            rev_power_bands: c
                .rev_power_bands
                .iter()
                .map(|b| RevPowerBand {
                    from_position: b.from_position,
                    min_change: b.min_change,
                })
                .collect(),
            fast_move_delta: c.fast_move_delta,
            slow_move_delta: c.slow_move_delta,
            max_no_decision: c.max_no_decision,
            max_fast_pulses: c.max_fast_pulses,
            min_fast_pulses: c.min_fast_pulses,
            inversions_to_slow: c.inversions_to_slow,
        }
    }
}

// ── CooldownCfg ──────────────────────────────────────────────────────────────

impl From<&afc_config::Cooldown> for CooldownCfg {
    fn from(c: &afc_config::Cooldown) -> Self {
        Self {
            start_after_ticks: c.start_after_ticks,
            idle_ceiling_ticks: c.idle_ceiling_ticks,
            bucket_shift: c.bucket_shift,
        }
    }
}

// ── PowerCfg ─────────────────────────────────────────────────────────────────

impl From<afc_config::ChannelSource> for ChannelSource {
    fn from(c: afc_config::ChannelSource) -> Self {
        match c {
            afc_config::ChannelSource::InternalA => Self::InternalA,
            afc_config::ChannelSource::InternalB => Self::InternalB,
            afc_config::ChannelSource::ExternalA => Self::ExternalA,
            afc_config::ChannelSource::ExternalB => Self::ExternalB,
        }
    }
}

impl From<&afc_config::Power> for PowerCfg {
    fn from(c: &afc_config::Power) -> Self {
        Self {
            min_reading: c.min_reading,
            max_reading: c.max_reading,
            db_factor_q15: q15_from_f32(c.db_factor),
            reverse_source: c.reverse_source.into(),
            forward_source: c.forward_source.into(),
        }
    }
}

// ── Analog ───────────────────────────────────────────────────────────────────

impl From<&afc_config::ChannelCal> for LinearScaler {
    fn from(c: &afc_config::ChannelCal) -> Self {
        Self {
            gain_q15: q15_from_f32(c.gain),
            offset: c.offset,
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&afc_config::Watchdog> for TimingCfg {
    fn from(c: &afc_config::Watchdog) -> Self {
        Self {
            slow_tick_ms: c.slow_tick_ms,
            watchdog_ms: c.timeout_ms,
        }
    }
}

// ── AfcCfg ───────────────────────────────────────────────────────────────────

impl From<&afc_config::Config> for AfcCfg {
    fn from(c: &afc_config::Config) -> Self {
        Self {
            travel: (&c.travel).into(),
            actuator: (&c.actuator).into(),
            direction: (&c.direction).into(),
            cooldown: (&c.cooldown).into(),
            power: (&c.power).into(),
            timing: (&c.watchdog).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_to_default_core_config() {
        let c = afc_config::Config::default();
        assert_eq!(AfcCfg::from(&c), AfcCfg::default());
        assert_eq!(LinearScaler::from(&c.analog.reverse), LinearScaler::default());
    }

    #[test]
    fn smallest_accepted_db_factor_stays_nonzero() {
        let mut c = afc_config::Config::default();
        c.power.db_factor = 0.5 / 32_768.0;
        c.validate().expect("config accepts half a step");
        let core = AfcCfg::from(&c);
        assert_eq!(core.power.db_factor_q15, 1);
        crate::builder::validate(&core).expect("controller accepts it too");
    }
}
