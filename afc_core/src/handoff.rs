//! Lock-free single-writer handoffs between the trigger contexts and the
//! control loop.
//!
//! - `capture_slot()`: the pulse-trigger side publishes a `RawCapture`
//!   snapshot; the control loop observes it as "sample complete". Sequence
//!   counted, so the reader never sees a half-written snapshot.
//! - `actuator_link()`: the control loop publishes bounds, target, step rate
//!   and preset requests; the step tick publishes position and power mode.
//! - `SlowTickFlag`: raised by the housekeeping timer, consumed by `poll`.
//!
//! Every field has exactly one writer. Handles are not `Clone` where cloning
//! would create a second writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering, fence};
use std::time::Duration;

use crate::actuator::{ActuatorState, Limits, PowerMode, StepReport, Stepper};

// ── Capture ──────────────────────────────────────────────────────────────────

/// Everything the pulse trigger captures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCapture {
    pub position_at_trigger: u16,
    /// Internal converter, channel A, left-justified.
    pub internal_a: u16,
    /// Internal converter, channel B, left-justified.
    pub internal_b: u16,
    /// External converter, channel A (0 if not responding).
    pub external_a: u16,
    /// External converter, channel B (0 if not responding).
    pub external_b: u16,
    /// External pulse counter at capture time.
    pub sample_index: u16,
}

impl RawCapture {
    fn pack(&self) -> (u64, u64) {
        let w0 = u64::from(self.position_at_trigger)
            | u64::from(self.internal_a) << 16
            | u64::from(self.internal_b) << 32
            | u64::from(self.external_a) << 48;
        let w1 = u64::from(self.external_b) | u64::from(self.sample_index) << 16;
        (w0, w1)
    }

    fn unpack(w0: u64, w1: u64) -> Self {
        let half = |w: u64, shift: u32| (w >> shift) as u16;
        Self {
            position_at_trigger: half(w0, 0),
            internal_a: half(w0, 16),
            internal_b: half(w0, 32),
            external_a: half(w0, 48),
            external_b: half(w1, 0),
            sample_index: half(w1, 16),
        }
    }
}

#[derive(Debug, Default)]
struct CaptureCell {
    seq: AtomicU32,
    w0: AtomicU64,
    w1: AtomicU64,
}

/// Producer half of the capture handoff.
#[derive(Debug)]
pub struct CaptureWriter {
    cell: Arc<CaptureCell>,
}

/// Consumer half of the capture handoff.
#[derive(Debug)]
pub struct CaptureReader {
    cell: Arc<CaptureCell>,
    last_seq: u32,
}

/// A snapshot taken by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakenCapture {
    pub capture: RawCapture,
    /// Captures overwritten before the consumer got to them.
    pub missed: u32,
}

pub fn capture_slot() -> (CaptureWriter, CaptureReader) {
    let cell = Arc::new(CaptureCell::default());
    (
        CaptureWriter { cell: cell.clone() },
        CaptureReader { cell, last_seq: 0 },
    )
}

impl CaptureWriter {
    /// Mark the slot busy. The consumer sees no new sample until `publish`.
    #[inline]
    pub fn begin(&mut self) {
        let s = self.cell.seq.load(Ordering::Relaxed);
        if s % 2 == 0 {
            self.cell.seq.store(s.wrapping_add(1), Ordering::Relaxed);
            fence(Ordering::Release);
        }
    }

    /// Store the snapshot and mark the sample complete.
    pub fn publish(&mut self, capture: RawCapture) {
        self.begin();
        let (w0, w1) = capture.pack();
        self.cell.w0.store(w0, Ordering::Relaxed);
        self.cell.w1.store(w1, Ordering::Relaxed);
        let s = self.cell.seq.load(Ordering::Relaxed);
        self.cell.seq.store(s.wrapping_add(1), Ordering::Release);
    }
}

impl CaptureReader {
    const READ_ATTEMPTS: usize = 4;

    /// True when a complete capture newer than the last one taken is waiting.
    pub fn is_complete(&self) -> bool {
        let s = self.cell.seq.load(Ordering::Acquire);
        s % 2 == 0 && s != self.last_seq
    }

    /// Take the newest complete capture, if any.
    ///
    /// Returns `None` when nothing new was published or the writer kept
    /// interrupting the read; the capture is then picked up on a later pass.
    pub fn take(&mut self) -> Option<TakenCapture> {
        for _ in 0..Self::READ_ATTEMPTS {
            let s1 = self.cell.seq.load(Ordering::Acquire);
            if s1 == self.last_seq {
                return None;
            }
            if s1 % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let w0 = self.cell.w0.load(Ordering::Relaxed);
            let w1 = self.cell.w1.load(Ordering::Relaxed);
            fence(Ordering::Acquire);
            let s2 = self.cell.seq.load(Ordering::Relaxed);
            if s1 != s2 {
                continue;
            }
            let published = s1.wrapping_sub(self.last_seq) / 2;
            self.last_seq = s1;
            return Some(TakenCapture {
                capture: RawCapture::unpack(w0, w1),
                missed: published.saturating_sub(1),
            });
        }
        None
    }
}

// ── Actuator ─────────────────────────────────────────────────────────────────

const NO_PRESET: u32 = u32::MAX;

#[derive(Debug)]
struct ActuatorCell {
    // written by the control loop
    limits: AtomicU64,
    step_period_us: AtomicU32,
    preset: AtomicU32,
    // written by the step tick
    position: AtomicU16,
    stopped: AtomicU16,
    low_power: AtomicBool,
}

fn pack_limits(l: Limits) -> u64 {
    u64::from(l.min) << 32 | u64::from(l.max) << 16 | u64::from(l.target)
}

fn unpack_limits(w: u64) -> Limits {
    Limits {
        min: (w >> 32) as u16,
        max: (w >> 16) as u16,
        target: w as u16,
    }
}

/// Control-loop half of the actuator link.
#[derive(Debug)]
pub struct ActuatorControl {
    cell: Arc<ActuatorCell>,
    limits: Limits,
}

/// Step-tick half of the actuator link; owns the `Stepper`.
#[derive(Debug)]
pub struct StepTick {
    cell: Arc<ActuatorCell>,
    stepper: Stepper,
}

/// Read-only view of the published position, for the capture side.
#[derive(Debug, Clone)]
pub struct PositionTap {
    cell: Arc<ActuatorCell>,
}

/// Build both halves of the actuator link.
///
/// Bounds start at `[0, initial]` with the target at `initial`.
pub fn actuator_link(
    initial: u16,
    low_power_after: u16,
    step_period: Duration,
) -> (ActuatorControl, StepTick) {
    let limits = Limits {
        min: 0,
        max: initial,
        target: initial,
    };
    let cell = Arc::new(ActuatorCell {
        limits: AtomicU64::new(pack_limits(limits)),
        step_period_us: AtomicU32::new(duration_to_us(step_period)),
        preset: AtomicU32::new(NO_PRESET),
        position: AtomicU16::new(initial),
        stopped: AtomicU16::new(0),
        low_power: AtomicBool::new(false),
    });
    (
        ActuatorControl {
            cell: cell.clone(),
            limits,
        },
        StepTick {
            cell,
            stepper: Stepper::new(initial, low_power_after),
        },
    )
}

fn duration_to_us(d: Duration) -> u32 {
    u32::try_from(d.as_micros()).unwrap_or(u32::MAX).max(1)
}

impl ActuatorControl {
    fn publish(&mut self, limits: Limits) {
        self.limits = limits;
        self.cell
            .limits
            .store(pack_limits(limits), Ordering::Release);
    }

    /// Bounds and target as last published.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Target as last published (always inside the bounds).
    pub fn target(&self) -> u16 {
        self.limits.target
    }

    /// Set new bounds and re-clamp the target into them.
    pub fn set_bounds(&mut self, min: u16, max: u16) {
        let mut next = Limits {
            min,
            max,
            target: self.limits.target,
        };
        next.target = next.clamped_target();
        self.publish(next);
    }

    /// Set a new target, clamped into the current bounds.
    pub fn set_target(&mut self, target: u16) {
        let mut next = Limits {
            target,
            ..self.limits
        };
        next.target = next.clamped_target();
        self.publish(next);
    }

    /// Ask the step tick to overwrite its believed position on its next tick.
    pub fn request_preset(&mut self, position: u16) {
        self.cell
            .preset
            .store(u32::from(position), Ordering::Release);
    }

    pub fn set_step_period(&mut self, period: Duration) {
        self.cell
            .step_period_us
            .store(duration_to_us(period), Ordering::Release);
    }

    pub fn step_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.cell.step_period_us.load(Ordering::Acquire)))
    }

    /// Current position as published by the step tick.
    pub fn position(&self) -> u16 {
        self.cell.position.load(Ordering::Acquire)
    }

    pub fn position_tap(&self) -> PositionTap {
        PositionTap {
            cell: self.cell.clone(),
        }
    }

    /// Combined snapshot of both halves.
    pub fn state(&self, home_position: u16) -> ActuatorState {
        ActuatorState {
            current_position: self.position(),
            target_position: self.limits.target,
            min_position: self.limits.min,
            max_position: self.limits.max,
            home_position,
            time_steps_stopped: self.cell.stopped.load(Ordering::Acquire),
            power: if self.cell.low_power.load(Ordering::Acquire) {
                PowerMode::Low
            } else {
                PowerMode::High
            },
        }
    }
}

impl StepTick {
    /// Period the control loop currently asks for.
    pub fn period(&self) -> Duration {
        Duration::from_micros(u64::from(self.cell.step_period_us.load(Ordering::Acquire)))
    }

    pub fn position(&self) -> u16 {
        self.stepper.position()
    }

    /// One step tick: apply any preset, step, publish.
    pub fn tick(&mut self) -> StepReport {
        let preset = self.cell.preset.swap(NO_PRESET, Ordering::AcqRel);
        if let Ok(p) = u16::try_from(preset) {
            self.stepper.preset(p);
        }
        let limits = unpack_limits(self.cell.limits.load(Ordering::Acquire));
        let report = self.stepper.tick(limits);
        self.cell
            .stopped
            .store(self.stepper.time_steps_stopped(), Ordering::Relaxed);
        self.cell
            .low_power
            .store(report.power == PowerMode::Low, Ordering::Relaxed);
        self.cell.position.store(report.position, Ordering::Release);
        report
    }

    /// Tick and drive the phase outputs. Output errors are logged.
    pub fn drive<P: afc_traits::PhaseOutput + ?Sized>(&mut self, out: &mut P) -> StepReport {
        let report = self.tick();
        if let Err(e) = out.set_duties(report.duties) {
            tracing::warn!(error = %e, position = report.position, "phase output failed");
        }
        report
    }
}

impl PositionTap {
    pub fn position(&self) -> u16 {
        self.cell.position.load(Ordering::Acquire)
    }
}

// ── Slow tick ────────────────────────────────────────────────────────────────

/// Housekeeping tick flag: raised by the timer, taken by the control loop.
#[derive(Debug, Clone, Default)]
pub struct SlowTickFlag(Arc<AtomicBool>);

impl SlowTickFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag; true if it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
