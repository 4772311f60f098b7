//! Schedulers that drive the controller and its trigger contexts.
//!
//! `run_virtual` is a deterministic discrete-event loop used by tests and the
//! simulator; `run_realtime` spawns one thread per trigger.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use afc_traits::clock::{Clock, ManualClock, MonotonicClock};
use afc_traits::{AnalogScaler, ExternalAdc, InternalAdc, PhaseOutput, PulseCounter, Transport};
use crossbeam_channel as xch;

use crate::actuator::ActuatorState;
use crate::builder::TriggerSide;
use crate::command::BoardCommand;
use crate::controller::AfcController;
use crate::error::{Report, Result};
use crate::faults::StatusBits;
use crate::sampling::PulseCapture;
use crate::state::ControlMode;
use crate::telemetry::Telemetry;
use crate::ticker::Ticker;
use crate::watchdog::SlowTickWatchdog;

/// How the trigger contexts are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingMode {
    /// Discrete-event simulation on a `ManualClock`; deterministic.
    Virtual,
    /// One thread per trigger on the wall clock.
    Realtime,
}

/// Devices the trigger contexts own.
#[derive(Debug)]
pub struct Devices<E, I, C, P> {
    pub external: E,
    pub internal: I,
    pub counter: C,
    pub phases: P,
}

/// Timing of a run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub duration: Duration,
    pub slow_tick: Duration,
    pub watchdog: Duration,
    /// Pulse repetition rate.
    pub pulse_hz: u32,
    /// Intervals during which the source is pulsing.
    pub pulse_windows: Vec<Range<Duration>>,
    /// Record a trace point every this often (slow ticks), if set.
    pub trace_every: Option<u32>,
}

impl RunPlan {
    fn pulsing_at(&self, t: Duration) -> bool {
        self.pulse_windows.iter().any(|w| w.contains(&t))
    }
}

/// A command delivered at a point in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledCommand {
    pub at: Duration,
    pub command: BoardCommand,
}

/// One trace point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracePoint {
    pub at_ms: u64,
    pub mode: ControlMode,
    pub current: u16,
    pub target: u16,
    pub reverse_db: u16,
}

/// End-of-run report.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub mode: ControlMode,
    pub actuator: ActuatorState,
    pub status: StatusBits,
    pub telemetry: Telemetry,
    pub pulses_fired: u64,
    pub step_ticks: u64,
    pub trace: Vec<TracePoint>,
}

fn as_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn summarize<R, F, T>(
    ctl: &AfcController<R, F, T>,
    elapsed: Duration,
    pulses_fired: u64,
    step_ticks: u64,
    trace: Vec<TracePoint>,
) -> RunSummary
where
    R: AnalogScaler,
    F: AnalogScaler,
    T: Transport,
{
    RunSummary {
        elapsed,
        mode: ctl.mode(),
        actuator: ctl.actuator_state(),
        status: ctl.status(),
        telemetry: ctl.telemetry().clone(),
        pulses_fired,
        step_ticks,
        trace,
    }
}

/// Bookkeeping shared by both schedulers after each control pass.
struct PassTracker {
    watchdog: SlowTickWatchdog,
    trace_every: Option<u32>,
    slow_ticks: u32,
    trace: Vec<TracePoint>,
}

impl PassTracker {
    fn new(plan: &RunPlan) -> Self {
        Self {
            watchdog: SlowTickWatchdog::new(plan.watchdog, Duration::ZERO),
            trace_every: plan.trace_every.map(|n| n.max(1)),
            slow_ticks: 0,
            trace: Vec::new(),
        }
    }

    fn after_poll<R, F, T>(
        &mut self,
        ctl: &AfcController<R, F, T>,
        slow_tick: bool,
        now: Duration,
    ) -> Result<()>
    where
        R: AnalogScaler,
        F: AnalogScaler,
        T: Transport,
    {
        if slow_tick {
            self.watchdog.kick(now);
            self.slow_ticks = self.slow_ticks.wrapping_add(1);
            if self.trace_every.is_some_and(|n| self.slow_ticks % n == 0) {
                let a = ctl.actuator_state();
                self.trace.push(TracePoint {
                    at_ms: as_ms(now),
                    mode: ctl.mode(),
                    current: a.current_position,
                    target: a.target_position,
                    reverse_db: ctl.readings().reverse_db,
                });
            }
        }
        self.watchdog.check(now).map_err(Report::new)
    }
}

/// Run on virtual time: step ticks, slow ticks and pulses are events on a
/// `ManualClock`, and the controller is polled after every event.
pub fn run_virtual<R, F, T, E, I, C, P>(
    ctl: &mut AfcController<R, F, T>,
    side: TriggerSide,
    devices: Devices<E, I, C, P>,
    plan: &RunPlan,
    commands: &[ScheduledCommand],
) -> Result<RunSummary>
where
    R: AnalogScaler,
    F: AnalogScaler,
    T: Transport,
    E: ExternalAdc,
    I: InternalAdc,
    C: PulseCounter,
    P: PhaseOutput,
{
    let TriggerSide {
        capture,
        position,
        mut step,
        slow_tick,
    } = side;
    let Devices {
        external,
        internal,
        counter,
        mut phases,
    } = devices;
    let mut pulse = PulseCapture::new(external, internal, counter, capture, position);

    let clock = ManualClock::new();
    let epoch = clock.now();
    let pulse_period = Duration::from_micros(crate::util::period_us(plan.pulse_hz));

    let mut commands: Vec<ScheduledCommand> = commands.to_vec();
    commands.sort_by_key(|c| c.at);
    let mut pending = commands.into_iter().peekable();

    let mut next_step = Duration::ZERO;
    let mut next_slow = plan.slow_tick;
    let mut next_pulse = Duration::ZERO;
    let mut pulses_fired = 0u64;
    let mut step_ticks = 0u64;
    let mut tracker = PassTracker::new(plan);

    tracing::info!(duration_ms = as_ms(plan.duration), mode = "virtual", "run start");

    loop {
        let next_cmd = pending.peek().map_or(Duration::MAX, |c| c.at);
        let next = next_step.min(next_slow).min(next_pulse).min(next_cmd);
        if next >= plan.duration {
            break;
        }
        let elapsed = clock.now().saturating_duration_since(epoch);
        clock.advance(next.saturating_sub(elapsed));
        let now = next;

        if now >= next_step {
            step.drive(&mut phases);
            step_ticks += 1;
            next_step += step.period();
        }
        if now >= next_slow {
            slow_tick.raise();
            next_slow += plan.slow_tick;
        }
        if now >= next_pulse {
            if plan.pulsing_at(now) {
                pulse.trigger();
                pulses_fired += 1;
            }
            next_pulse += pulse_period;
        }
        while let Some(c) = pending.next_if(|c| c.at <= now) {
            if let Err(e) = ctl.dispatch(c.command) {
                tracing::warn!(index = c.command.index, error = %e, "host command rejected");
            }
        }

        let report = ctl.poll()?;
        tracker.after_poll(ctl, report.slow_tick, now)?;
    }

    tracing::info!(
        mode = %ctl.mode(),
        position = ctl.actuator_state().current_position,
        pulses_fired,
        "run finished"
    );
    Ok(summarize(
        ctl,
        plan.duration,
        pulses_fired,
        step_ticks,
        tracker.trace,
    ))
}

/// Run on the wall clock: one `Ticker` thread each for the step tick, the
/// slow tick and the pulse trigger; the control loop runs on the calling
/// thread and drains `commands` every pass. Returns early when `stop` is set.
pub fn run_realtime<R, F, T, E, I, C, P>(
    ctl: &mut AfcController<R, F, T>,
    side: TriggerSide,
    devices: Devices<E, I, C, P>,
    plan: &RunPlan,
    commands: &xch::Receiver<BoardCommand>,
    stop: &Arc<AtomicBool>,
) -> Result<RunSummary>
where
    R: AnalogScaler,
    F: AnalogScaler,
    T: Transport,
    E: ExternalAdc + Send + 'static,
    I: InternalAdc + Send + 'static,
    C: PulseCounter + Send + 'static,
    P: PhaseOutput + Send + 'static,
{
    let TriggerSide {
        capture,
        position,
        mut step,
        slow_tick,
    } = side;
    let Devices {
        external,
        internal,
        counter,
        mut phases,
    } = devices;
    let mut pulse = PulseCapture::new(external, internal, counter, capture, position);

    let start = Instant::now();
    let step_ticker = Ticker::spawn(
        "step",
        move || {
            step.drive(&mut phases);
            step.period()
        },
        MonotonicClock::new(),
    );
    let slow_period = plan.slow_tick;
    let slow_ticker = Ticker::spawn(
        "slow",
        move || {
            slow_tick.raise();
            slow_period
        },
        MonotonicClock::new(),
    );
    let pulse_period = Duration::from_micros(crate::util::period_us(plan.pulse_hz));
    let windows = plan.clone();
    let fired = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let fired_clone = fired.clone();
    let pulse_ticker = Ticker::spawn(
        "pulse",
        move || {
            if windows.pulsing_at(start.elapsed()) {
                pulse.trigger();
                fired_clone.fetch_add(1, Ordering::Relaxed);
            }
            pulse_period
        },
        MonotonicClock::new(),
    );

    let mut tracker = PassTracker::new(plan);
    tracing::info!(duration_ms = as_ms(plan.duration), mode = "realtime", "run start");

    let result = loop {
        let now = start.elapsed();
        if now >= plan.duration {
            break Ok(());
        }
        if stop.load(Ordering::Relaxed) {
            tracing::info!("run interrupted");
            break Ok(());
        }
        for cmd in commands.try_iter() {
            if let Err(e) = ctl.dispatch(cmd) {
                tracing::warn!(index = cmd.index, error = %e, "host command rejected");
            }
        }
        let report = match ctl.poll() {
            Ok(r) => r,
            Err(e) => break Err(e),
        };
        if let Err(e) = tracker.after_poll(ctl, report.slow_tick, now) {
            break Err(e);
        }
        if !report.sample && !report.slow_tick {
            // avoid busy spin between triggers
            std::thread::sleep(Duration::from_micros(50));
        }
    };

    let step_ticks = step_ticker.ticks();
    drop(pulse_ticker);
    drop(slow_ticker);
    drop(step_ticker);
    result?;

    let pulses_fired = fired.load(Ordering::Relaxed);
    tracing::info!(
        mode = %ctl.mode(),
        position = ctl.actuator_state().current_position,
        pulses_fired,
        "run finished"
    );
    Ok(summarize(
        ctl,
        start.elapsed(),
        pulses_fired,
        step_ticks,
        tracker.trace,
    ))
}
