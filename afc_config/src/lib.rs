#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the AFC controller.
//!
//! `Config` and its sections are deserialized from TOML and validated. Every
//! section is optional; the defaults are the shipped board settings, so an
//! empty file is a valid configuration.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Travel {
    pub min_position: u16,
    pub max_position: u16,
    /// Auto-zero completes at or below this position.
    pub zero_tolerance: u16,
}

impl Default for Travel {
    fn default() -> Self {
        Self {
            min_position: 1_000,
            max_position: 28_000,
            zero_tolerance: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Actuator {
    /// Stationary step ticks before the low-current table is used.
    pub low_power_after_ticks: u16,
    pub fast_step_hz: u32,
    pub slow_step_hz: u32,
}

impl Default for Actuator {
    fn default() -> Self {
        Self {
            low_power_after_ticks: 640,
            fast_step_hz: 6_400,
            slow_step_hz: 3_200,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RevPowerBand {
    pub from_position: u16,
    pub min_change: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Direction {
    pub min_position_change: u16,
    /// Reverse-power noise thresholds by position; any order.
    pub rev_power_bands: Vec<RevPowerBand>,
    pub fast_move_delta: u16,
    pub slow_move_delta: u16,
    pub max_no_decision: u8,
    pub max_fast_pulses: u32,
    pub min_fast_pulses: u32,
    pub inversions_to_slow: u32,
}

impl Default for Direction {
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Cooldown {
    /// Idle slow ticks before cooldown starts.
    pub start_after_ticks: u32,
    /// Idle counter ceiling in slow ticks.
    pub idle_ceiling_ticks: u32,
    /// Idle ticks to cooldown table index shift.
    pub bucket_shift: u32,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self {
            start_after_ticks: 100,
            idle_ceiling_ticks: 120_000,
            bucket_shift: 9,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSource {
    InternalA,
    InternalB,
    ExternalA,
    ExternalB,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Power {
    /// Lower clamp, 100 uV units.
    pub min_reading: u16,
    /// Upper clamp, 100 uV units.
    pub max_reading: u16,
    /// 100 uV to 0.01 dB factor.
    pub db_factor: f32,
    pub reverse_source: ChannelSource,
    pub forward_source: ChannelSource,
}

impl Default for Power {
    fn default() -> Self {
        Self {
            min_reading: 4_000,
            max_reading: 22_000,
            db_factor: 0.4,
            reverse_source: ChannelSource::ExternalA,
            forward_source: ChannelSource::InternalB,
        }
    }
}

/// Linear calibration of one detector channel.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ChannelCal {
    pub gain: f32,
    pub offset: i16,
}

impl Default for ChannelCal {
    fn default() -> Self {
        Self {
            gain: 0.625,
            offset: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct Analog {
    pub reverse: ChannelCal,
    pub forward: ChannelCal,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Watchdog {
    pub slow_tick_ms: u64,
    /// The slow tick must be serviced at least this often.
    pub timeout_ms: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self {
            slow_tick_ms: 10,
            timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Simulated RF load and pulse source used by `afc simulate`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    /// Position of minimum reflected power.
    pub resonance: u16,
    /// Half width of the resonance dip, position units.
    pub width: u16,
    /// Reverse detector reading far from resonance (external converter
    /// counts). The detector has a negative slope: more power, lower reading.
    pub off_resonance_reading: u16,
    /// Reverse detector reading at resonance.
    pub on_resonance_reading: u16,
    /// Peak-to-peak uniform noise on each reading.
    pub noise: u16,
    /// Every Nth external read answers "not responding" (0 disables).
    pub not_responding_every: u32,
    /// Forward detector reading on the internal converter (10 bit).
    pub forward_reading: u16,
    pub pulse_hz: u32,
    /// Home position sent at startup.
    pub home: u16,
    pub seed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            resonance: 17_500,
            width: 3_000,
            off_resonance_reading: 9_000,
            on_resonance_reading: 33_000,
            noise: 160,
            not_responding_every: 0,
            forward_reading: 800,
            pulse_hz: 200,
            home: 16_000,
            seed: 0x5EED,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub travel: Travel,
    pub actuator: Actuator,
    pub direction: Direction,
    pub cooldown: Cooldown,
    pub power: Power,
    pub analog: Analog,
    pub watchdog: Watchdog,
    pub logging: Logging,
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))
}

/// One Q1.15 step; the core stores gains in that format.
const Q15_RESOLUTION: f32 = 1.0 / 32_768.0;

fn check_gain(name: &str, gain: f32) -> eyre::Result<()> {
    if !gain.is_finite() || gain <= 0.0 || gain >= 2.0 {
        eyre::bail!("{name} must be in (0.0, 2.0)");
    }
    // anything under half a step rounds to a zero multiplier
    if gain < Q15_RESOLUTION / 2.0 {
        eyre::bail!("{name} must be at least {Q15_RESOLUTION:e} (Q1.15 resolution)");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Travel
        if self.travel.min_position >= self.travel.max_position {
            eyre::bail!("travel.min_position must be < travel.max_position");
        }
        if self.travel.zero_tolerance >= self.travel.min_position {
            eyre::bail!("travel.zero_tolerance must be < travel.min_position");
        }

        // Actuator
        if self.actuator.fast_step_hz == 0 {
            eyre::bail!("actuator.fast_step_hz must be > 0");
        }
        if self.actuator.slow_step_hz == 0 {
            eyre::bail!("actuator.slow_step_hz must be > 0");
        }
        if self.actuator.fast_step_hz > 1_000_000 || self.actuator.slow_step_hz > 1_000_000 {
            eyre::bail!("actuator step rates must be <= 1 MHz");
        }

        // Direction
        if self.direction.rev_power_bands.is_empty() {
            eyre::bail!("direction.rev_power_bands must not be empty");
        }
        if self.direction.fast_move_delta == 0 {
            eyre::bail!("direction.fast_move_delta must be > 0");
        }
        if self.direction.slow_move_delta == 0 {
            eyre::bail!("direction.slow_move_delta must be > 0");
        }
        if self.direction.slow_move_delta > self.direction.fast_move_delta {
            eyre::bail!("direction.slow_move_delta must be <= direction.fast_move_delta");
        }
        if self.direction.min_fast_pulses > self.direction.max_fast_pulses {
            eyre::bail!("direction.min_fast_pulses must be <= direction.max_fast_pulses");
        }

        // Cooldown
        if self.cooldown.bucket_shift >= 32 {
            eyre::bail!("cooldown.bucket_shift must be < 32");
        }
        if self.cooldown.start_after_ticks == 0 {
            eyre::bail!("cooldown.start_after_ticks must be >= 1");
        }
        if self.cooldown.start_after_ticks > self.cooldown.idle_ceiling_ticks {
            eyre::bail!("cooldown.start_after_ticks must be <= cooldown.idle_ceiling_ticks");
        }

        // Power
        if self.power.min_reading >= self.power.max_reading {
            eyre::bail!("power.min_reading must be < power.max_reading");
        }
        check_gain("power.db_factor", self.power.db_factor)?;

        // Analog
        check_gain("analog.reverse.gain", self.analog.reverse.gain)?;
        check_gain("analog.forward.gain", self.analog.forward.gain)?;

        // Watchdog
        if self.watchdog.slow_tick_ms == 0 {
            eyre::bail!("watchdog.slow_tick_ms must be >= 1");
        }
        if self.watchdog.timeout_ms <= self.watchdog.slow_tick_ms {
            eyre::bail!("watchdog.timeout_ms must be > watchdog.slow_tick_ms");
        }

        // Simulation
        if self.simulation.pulse_hz == 0 {
            eyre::bail!("simulation.pulse_hz must be > 0");
        }
        if self.simulation.width == 0 {
            eyre::bail!("simulation.width must be > 0");
        }
        if self.simulation.home < self.travel.min_position
            || self.simulation.home > self.travel.max_position
        {
            eyre::bail!("simulation.home must lie within the travel range");
        }

        Ok(())
    }
}
