//! Runtime configuration types for the control core.
//!
//! These are the structs used by `AfcController` and the schedulers. They are
//! separate from the TOML-deserialized config in `afc_config`; see
//! `conversions` for the mapping. Defaults match the shipped board settings.

/// Position bounds of the tuning element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelCfg {
    /// Lower bound of the operational range.
    pub min_position: u16,
    /// Upper bound of the operational range and of the startup sweep.
    pub max_position: u16,
    /// Auto-zero is complete once the position is at or below this value.
    pub zero_tolerance: u16,
}

impl Default for TravelCfg {
    fn default() -> Self {
        Self {
            min_position: 1_000,
            max_position: 28_000,
            zero_tolerance: 100,
        }
    }
}

impl TravelCfg {
    /// Clamp `position` into the operational range.
    #[inline]
    pub fn clamp(&self, position: u16) -> u16 {
        position.clamp(self.min_position, self.max_position)
    }
}

/// Stepping tick configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorCfg {
    /// Stationary ticks before switching to the low-current table.
    pub low_power_after_ticks: u16,
    /// Step tick rate while fast tuning.
    pub fast_step_hz: u32,
    /// Step tick rate once fast tuning is done.
    pub slow_step_hz: u32,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            low_power_after_ticks: 640,
            fast_step_hz: 6_400,
            slow_step_hz: 3_200,
        }
    }
}

/// One band of the reverse-power noise threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevPowerBand {
    /// Band applies to positions at or above this value.
    pub from_position: u16,
    /// Minimum reverse-power difference (0.01 dB) that counts as a change.
    pub min_change: u16,
}

/// Direction-decision configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionCfg {
    /// Position differences below this are "no data".
    pub min_position_change: u16,
    /// Reverse-power thresholds, sorted descending by `from_position` at build.
    pub rev_power_bands: Vec<RevPowerBand>,
    /// Move size while fast tuning.
    pub fast_move_delta: u16,
    /// Move size once fast tuning is done.
    pub slow_move_delta: u16,
    /// Consecutive tie votes that repeat the previous direction.
    pub max_no_decision: u8,
    /// Pulses after which fast tuning always ends.
    pub max_fast_pulses: u32,
    /// Pulses after which fast tuning may end on inversions.
    pub min_fast_pulses: u32,
    /// Inversions that end fast tuning once `min_fast_pulses` is reached.
    pub inversions_to_slow: u32,
}

impl Default for DirectionCfg {
    fn default() -> Self {
        Self {
            min_position_change: 16,
            rev_power_bands: vec![
                RevPowerBand {
                    from_position: 16_000,
                    min_change: 7,
                },
                RevPowerBand {
                    from_position: 11_000,
                    min_change: 5,
                },
                RevPowerBand {
                    from_position: 0,
                    min_change: 3,
                },
            ],
            fast_move_delta: 64,
            slow_move_delta: 32,
            max_no_decision: 4,
            max_fast_pulses: 400,
            min_fast_pulses: 100,
            inversions_to_slow: 8,
        }
    }
}

impl DirectionCfg {
    /// Reverse-power noise threshold at `position`.
    ///
    /// Bands must be sorted descending; positions below every band use the
    /// last band's threshold.
    pub fn min_rev_power_change(&self, position: u16) -> u16 {
        self.rev_power_bands
            .iter()
            .find(|b| position >= b.from_position)
            .or(self.rev_power_bands.last())
            .map_or(0, |b| b.min_change)
    }
}

/// Idle cooldown configuration, in slow ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownCfg {
    /// Idle ticks without a pulse before cooldown starts.
    pub start_after_ticks: u32,
    /// Idle counter saturation.
    pub idle_ceiling_ticks: u32,
    /// Right shift from idle ticks to cooldown table index.
    pub bucket_shift: u32,
}

impl Default for CooldownCfg {
    fn default() -> Self {
        Self {
            start_after_ticks: 100,
            idle_ceiling_ticks: 120_000,
            bucket_shift: 9,
        }
    }
}

/// Which captured reading feeds a power channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSource {
    InternalA,
    InternalB,
    ExternalA,
    ExternalB,
}

/// Power conversion configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCfg {
    /// Lower clamp of calibrated detector readings (100 uV).
    pub min_reading: u16,
    /// Upper clamp of calibrated detector readings (100 uV).
    pub max_reading: u16,
    /// Q1.15 multiplier from 100 uV to 0.01 dB.
    pub db_factor_q15: u16,
    pub reverse_source: ChannelSource,
    pub forward_source: ChannelSource,
}

impl Default for PowerCfg {
    fn default() -> Self {
        Self {
            min_reading: 4_000,
            max_reading: 22_000,
            db_factor_q15: 13_107,
            reverse_source: ChannelSource::ExternalA,
            forward_source: ChannelSource::InternalB,
        }
    }
}

/// Slow tick and watchdog timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingCfg {
    /// Period of the slow (housekeeping) tick.
    pub slow_tick_ms: u64,
    /// The slow tick must run at least this often.
    pub watchdog_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            slow_tick_ms: 10,
            watchdog_ms: 8_000,
        }
    }
}

/// Everything the controller needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AfcCfg {
    pub travel: TravelCfg,
    pub actuator: ActuatorCfg,
    pub direction: DirectionCfg,
    pub cooldown: CooldownCfg,
    pub power: PowerCfg,
    pub timing: TimingCfg,
}
