//! Fixed-rate position stepping and phase duty lookup.
//!
//! `Stepper` is the state owned by the step tick: it alone moves
//! `current_position`. Targets and bounds arrive as a `Limits` snapshot
//! published by the control loop (see `handoff::ActuatorLink`).

use crate::tables::{PHASE_OFFSETS, PWM_HIGH_POWER, PWM_LOW_POWER, shift_index};

/// Drive current regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerMode {
    /// Full torque while moving.
    #[default]
    High,
    /// Reduced holding current once stationary.
    Low,
}

/// Target and bounds as seen by one step tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u16,
    pub max: u16,
    pub target: u16,
}

impl Limits {
    /// Target clamped into `[min, max]`.
    ///
    /// A degenerate `min > max` resolves to `max`.
    #[inline]
    pub fn clamped_target(&self) -> u16 {
        self.target.max(self.min).min(self.max)
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub position: u16,
    pub moved: bool,
    pub power: PowerMode,
    pub duties: [u16; 4],
}

/// Snapshot of the actuator as a whole, assembled from both sides of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    pub current_position: u16,
    pub target_position: u16,
    pub min_position: u16,
    pub max_position: u16,
    pub home_position: u16,
    pub time_steps_stopped: u16,
    pub power: PowerMode,
}

/// Step-tick state.
#[derive(Debug, Clone)]
pub struct Stepper {
    current: u16,
    time_steps_stopped: u16,
    low_power_after: u16,
}

impl Stepper {
    pub fn new(position: u16, low_power_after: u16) -> Self {
        Self {
            current: position,
            time_steps_stopped: 0,
            low_power_after,
        }
    }

    #[inline]
    pub fn position(&self) -> u16 {
        self.current
    }

    #[inline]
    pub fn time_steps_stopped(&self) -> u16 {
        self.time_steps_stopped
    }

    /// Overwrite the believed position (open-loop re-zero).
    pub fn preset(&mut self, position: u16) {
        self.current = position;
        self.time_steps_stopped = 0;
    }

    pub fn power_mode(&self) -> PowerMode {
        if self.time_steps_stopped >= self.low_power_after {
            PowerMode::Low
        } else {
            PowerMode::High
        }
    }

    /// Advance one tick toward the clamped target.
    pub fn tick(&mut self, limits: Limits) -> StepReport {
        let target = limits.clamped_target();
        let moved = if self.current > target {
            self.current -= 1;
            self.time_steps_stopped = 0;
            true
        } else if self.current < target {
            self.current += 1;
            self.time_steps_stopped = 0;
            true
        } else {
            self.time_steps_stopped = self
                .time_steps_stopped
                .saturating_add(1)
                .min(self.low_power_after);
            false
        };
        let power = self.power_mode();
        StepReport {
            position: self.current,
            moved,
            power,
            duties: phase_duties(self.current, power),
        }
    }
}

/// A+, A-, B+, B- duty cycles for `position` in `power` mode.
pub fn phase_duties(position: u16, power: PowerMode) -> [u16; 4] {
    let table = match power {
        PowerMode::High => &PWM_HIGH_POWER,
        PowerMode::Low => &PWM_LOW_POWER,
    };
    PHASE_OFFSETS.map(|offset| table[shift_index(position, offset)])
}
