#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Automatic frequency control core (hardware-agnostic).
//!
//! Keeps a magnetron tuned to its RF load by stepping a tuning actuator
//! toward minimum reflected power. All board access goes through the traits
//! in `afc_traits`.
//!
//! ## Architecture
//!
//! - **Trigger side**: `sampling::PulseCapture` (per pulse), `handoff::StepTick`
//!   (per actuator step) and the slow tick flag. Each publishes through a
//!   lock-free handoff in `handoff`.
//! - **Control loop**: `controller::AfcController`, the single owner of mode,
//!   targets, idle time and status. `poll` never blocks.
//! - **Algorithms**: `direction` (vote over a 16-sample history), `cooldown`
//!   (drift back toward home while idle), `state` (mode transitions).
//! - **Scheduling**: `runner` drives a controller on virtual time or on
//!   real threads.
//!
//! ## Units
//!
//! Positions are actuator steps. Power readings are 100 uV detector units
//! after calibration; `to_db` converts them to 0.01 dB steps with Q15 math.

pub mod actuator;
pub mod builder;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod cooldown;
pub mod direction;
pub mod error;
pub mod faults;
pub mod fixed_point;
pub mod handoff;
pub mod history;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod sampling;
pub mod state;
pub mod tables;
pub mod telemetry;
pub mod ticker;
pub mod util;
pub mod watchdog;

pub use builder::{Afc, AfcBuilder, TriggerSide, build_afc};
pub use command::{BoardCommand, Command, Nudge};
pub use config::AfcCfg;
pub use controller::{AfcController, PollReport};
pub use error::{AfcError, BuildError, FatalReason};
pub use runner::{Devices, RunPlan, RunSummary, ScheduledCommand, SchedulingMode};
pub use state::ControlMode;
