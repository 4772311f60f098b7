//! The control loop: one exclusively owned record driving the mode machine,
//! post-pulse processing, direction decisions, cooldown and fault status.
//!
//! `poll` never blocks. Each call:
//! 1. runs the entry action of the current mode the first time it is seen,
//! 2. consumes the slow tick flag (idle time, cooldown, faults),
//! 3. consumes a completed capture, if any,
//! 4. applies the mode's per-pass target rule,
//! 5. evaluates `next_mode` and runs the entry action on a change.

use afc_traits::{AnalogScaler, BoxError, Transport};
use eyre::WrapErr;

use crate::actuator::ActuatorState;
use crate::command::{BoardCommand, Command, Nudge};
use crate::config::AfcCfg;
use crate::cooldown::IdleTracker;
use crate::direction::{Decision, DirectionEngine, TuneSpeed};
use crate::error::{AfcError, FatalReason, Report, Result};
use crate::faults::{FaultLatch, StatusBits};
use crate::handoff::{ActuatorControl, CaptureReader, RawCapture, SlowTickFlag, TakenCapture};
use crate::history::Sample;
use crate::sampling::{PostPulse, PowerReadings};
use crate::state::{ControlMode, ModeInputs, next_mode};
use crate::telemetry::{Telemetry, fast_log_records};
use crate::util::step_period;

/// One-shot peripheral bring-up run on entry to `Startup`.
pub type BringUp = Box<dyn FnOnce() -> std::result::Result<(), BoxError> + Send>;

/// What one `poll` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub mode: ControlMode,
    /// A slow tick was consumed.
    pub slow_tick: bool,
    /// A completed capture was consumed.
    pub sample: bool,
    /// The mode changed during this pass.
    pub transitioned: bool,
}

pub struct AfcController<R, F, T> {
    cfg: AfcCfg,
    mode: ControlMode,
    entered: bool,
    actuator: ActuatorControl,
    captures: CaptureReader,
    slow_tick: SlowTickFlag,
    post: PostPulse<R, F>,
    engine: DirectionEngine,
    idle: IdleTracker,
    faults: FaultLatch,
    transport: T,
    bring_up: Option<BringUp>,
    home_position: u16,
    manual_target: u16,
    not_configured: bool,
    manual_requested: bool,
    speed: TuneSpeed,
    last_capture: RawCapture,
    readings: PowerReadings,
    last_decision: Option<Decision>,
    status: StatusBits,
    telemetry: Telemetry,
}

impl<R, F, T> core::fmt::Debug for AfcController<R, F, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AfcController")
            .field("mode", &self.mode)
            .field("home_position", &self.home_position)
            .field("manual_target", &self.manual_target)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<R, F, T> AfcController<R, F, T>
where
    R: AnalogScaler,
    F: AnalogScaler,
    T: Transport,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: AfcCfg,
        actuator: ActuatorControl,
        captures: CaptureReader,
        slow_tick: SlowTickFlag,
        reverse: R,
        forward: F,
        transport: T,
        bring_up: Option<BringUp>,
    ) -> Self {
        let home = cfg.travel.max_position;
        Self {
            post: PostPulse::new(cfg.power.clone(), reverse, forward),
            engine: DirectionEngine::new(cfg.direction.clone()),
            idle: IdleTracker::new(cfg.cooldown.clone(), home),
            cfg,
            mode: ControlMode::Startup,
            entered: false,
            actuator,
            captures,
            slow_tick,
            faults: FaultLatch::new(),
            transport,
            bring_up,
            home_position: home,
            manual_target: home,
            not_configured: true,
            manual_requested: false,
            speed: TuneSpeed::Fast,
            last_capture: RawCapture::default(),
            readings: PowerReadings::default(),
            last_decision: None,
            status: StatusBits::default(),
            telemetry: Telemetry::default(),
        }
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn cfg(&self) -> &AfcCfg {
        &self.cfg
    }

    pub fn status(&self) -> StatusBits {
        self.status
    }

    pub fn actuator_state(&self) -> ActuatorState {
        self.actuator.state(self.home_position)
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn manual_target(&self) -> u16 {
        self.manual_target
    }

    pub fn home_position(&self) -> u16 {
        self.home_position
    }

    pub fn hot_position(&self) -> u16 {
        self.idle.hot_position()
    }

    pub fn readings(&self) -> PowerReadings {
        self.readings
    }

    pub fn last_capture(&self) -> RawCapture {
        self.last_capture
    }

    pub fn last_decision(&self) -> Option<Decision> {
        self.last_decision
    }

    pub fn engine(&self) -> &DirectionEngine {
        &self.engine
    }

    pub fn idle(&self) -> &IdleTracker {
        &self.idle
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── commands ─────────────────────────────────────────────────────────────

    /// Interpret one board command. Unknown indices are counted and returned
    /// as an error; they never change state.
    pub fn dispatch(&mut self, raw: BoardCommand) -> std::result::Result<Command, AfcError> {
        let cmd = match Command::try_from(raw) {
            Ok(cmd) => cmd,
            Err(e) => {
                self.telemetry.unknown_commands += 1;
                tracing::debug!(index = raw.index, "ignoring unknown command");
                return Err(e);
            }
        };
        match cmd {
            Command::SetHome(p) => {
                self.home_position = self.cfg.travel.clamp(p);
                if self.not_configured {
                    tracing::info!(home = self.home_position, "home position configured");
                }
                self.not_configured = false;
            }
            Command::SelectAuto => self.manual_requested = false,
            Command::SelectManual => self.manual_requested = true,
            Command::SetManualTarget(p) => self.manual_target = p,
            Command::NudgeManualTarget(n) => {
                let moved = match n {
                    Nudge::Up(d) => self.manual_target.saturating_add(d),
                    Nudge::Down(d) => self.manual_target.saturating_sub(d),
                };
                self.manual_target = self.cfg.travel.clamp(moved);
            }
        }
        tracing::debug!(?cmd, "command applied");
        Ok(cmd)
    }

    // ── loop ─────────────────────────────────────────────────────────────────

    /// One pass of the control loop.
    pub fn poll(&mut self) -> Result<PollReport> {
        if !self.entered {
            self.entered = true;
            self.enter(self.mode)?;
        }

        let slow_tick = self.slow_tick.take();
        if slow_tick {
            self.on_slow_tick();
        }

        let taken = self.captures.take();
        if let Some(t) = taken {
            self.on_capture(t);
        }

        match self.mode {
            ControlMode::RunManual => self.actuator.set_target(self.manual_target),
            ControlMode::RunAfc => self.manual_target = self.actuator.target(),
            _ => {}
        }

        let inputs = ModeInputs {
            current_position: self.actuator.position(),
            home_position: self.home_position,
            zero_tolerance: self.cfg.travel.zero_tolerance,
            not_configured: self.not_configured,
            manual_requested: self.manual_requested,
        };
        let next = next_mode(self.mode, &inputs);
        let transitioned = next != self.mode;
        if transitioned {
            tracing::info!(
                from = %self.mode,
                to = %next,
                position = inputs.current_position,
                "mode change"
            );
            self.mode = next;
            self.enter(next)?;
        }

        Ok(PollReport {
            mode: self.mode,
            slow_tick,
            sample: taken.is_some(),
            transitioned,
        })
    }

    /// Force the mode from a raw code, as after a corrupted state variable.
    pub fn force_mode_code(&mut self, code: u8) -> Result<()> {
        let mode = ControlMode::from_raw(code);
        if mode != self.mode {
            self.mode = mode;
            self.enter(mode)?;
        }
        Ok(())
    }

    fn enter(&mut self, mode: ControlMode) -> Result<()> {
        let max = self.cfg.travel.max_position;
        match mode {
            ControlMode::Startup => {
                if let Some(bring_up) = self.bring_up.take() {
                    bring_up()
                        .map_err(|e| Report::new(crate::hw_error::map_hw_error(&*e)))
                        .wrap_err(AfcError::Fatal(FatalReason::BringUp))?;
                }
                self.actuator.set_bounds(0, max);
                self.home_position = max;
                self.actuator
                    .set_step_period(step_period(self.cfg.actuator.fast_step_hz));
            }
            ControlMode::AutoZero => {
                self.actuator.request_preset(max);
                self.actuator.set_bounds(0, max);
                self.actuator.set_target(0);
                self.not_configured = true;
            }
            ControlMode::AutoHome => {
                let travel = &self.cfg.travel;
                self.actuator
                    .set_bounds(travel.min_position, travel.max_position);
                self.actuator.set_target(self.home_position);
                self.manual_target = self.home_position;
                self.idle.set_hot_position(self.home_position);
            }
            ControlMode::RunAfc | ControlMode::RunManual => {}
        }
        self.refresh_status();
        Ok(())
    }

    fn refresh_status(&mut self) {
        self.status = StatusBits::derive(
            self.faults.latched(),
            self.mode.homing_in_progress(),
            self.not_configured,
            self.manual_requested,
        );
    }

    fn on_slow_tick(&mut self) {
        let current = self.actuator.position();
        self.telemetry
            .record_positions(self.actuator.target(), current, self.home_position);

        self.faults
            .update(self.transport.com_fault(), self.transport.reset_requested());

        if self.engine.fast_done() {
            self.idle.set_hot_position(current);
        }
        if self.idle.tick() {
            self.engine.reset_run();
            if self.mode == ControlMode::RunAfc {
                let target = self.idle.target(self.home_position);
                self.actuator.set_target(target);
                tracing::trace!(time_off = self.idle.time_off(), target, "cooldown");
            }
        }
        self.refresh_status();
    }

    fn on_capture(&mut self, taken: TakenCapture) {
        if taken.missed > 0 {
            self.telemetry.missed_samples += u64::from(taken.missed);
            tracing::debug!(missed = taken.missed, "captures overwritten before processing");
        }
        // overwritten captures still fired a pulse each
        self.idle.on_pulses(taken.missed.saturating_add(1));
        self.last_capture = taken.capture;

        match self.mode {
            ControlMode::RunAfc => {
                self.post_pulse(&taken.capture);
                self.decide(&taken.capture);
            }
            ControlMode::RunManual => self.post_pulse(&taken.capture),
            _ => {}
        }
    }

    fn post_pulse(&mut self, capture: &RawCapture) {
        self.readings = self.post.process(capture);
        self.telemetry.record_pulse(capture, &self.readings);
        tracing::trace!(
            sample_index = capture.sample_index,
            position = capture.position_at_trigger,
            reverse_db = self.readings.reverse_db,
            forward_db = self.readings.forward_db,
            "post pulse"
        );

        if self.transport.fast_logging_enabled() {
            let records =
                fast_log_records(capture, self.actuator.target(), self.readings.reverse_db);
            for (register, words) in records {
                if let Err(e) = self.transport.log_pulse(register, words) {
                    self.telemetry.dropped_log_records += 1;
                    tracing::debug!(register, error = %e, "pulse log record dropped");
                }
            }
        }
    }

    fn decide(&mut self, capture: &RawCapture) {
        let sample = Sample {
            position: capture.position_at_trigger,
            reverse_db: self.readings.reverse_db,
            forward_db: self.readings.forward_db,
        };
        let decision = self.engine.decide(
            sample,
            self.actuator.position(),
            self.idle.pulses_on_this_run(),
        );
        self.actuator.set_target(decision.target);
        if decision.speed != self.speed {
            self.speed = decision.speed;
            let hz = match decision.speed {
                TuneSpeed::Fast => self.cfg.actuator.fast_step_hz,
                TuneSpeed::Slow => self.cfg.actuator.slow_step_hz,
            };
            self.actuator.set_step_period(step_period(hz));
            tracing::debug!(speed = ?decision.speed, hz, "step rate changed");
        }
        self.last_decision = Some(decision);
    }
}
