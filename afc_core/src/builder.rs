//! Type-state builder for the controller and generic `build_afc` constructor.
//!
//! The builder enforces at compile time that both scalers and the transport
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks. Building also creates the lock-free
//! handoffs and returns their producer halves as a `TriggerSide`.

use std::marker::PhantomData;

use afc_traits::{AnalogScaler, Transport};

use crate::config::AfcCfg;
use crate::controller::{AfcController, BringUp};
use crate::error::{BuildError, Result};
use crate::handoff::{
    CaptureWriter, PositionTap, SlowTickFlag, StepTick, actuator_link, capture_slot,
};
use crate::util::step_period;

/// Boxed controller used by the CLI and anywhere the concrete devices vary
/// at run time.
pub type Afc = AfcController<
    Box<dyn AnalogScaler + Send>,
    Box<dyn AnalogScaler + Send>,
    Box<dyn Transport + Send>,
>;

/// Producer halves of the handoffs, handed to the trigger contexts.
#[derive(Debug)]
pub struct TriggerSide {
    /// Pulse-trigger context: capture publisher.
    pub capture: CaptureWriter,
    /// Pulse-trigger context: position read at the trigger.
    pub position: PositionTap,
    /// Step-tick context.
    pub step: StepTick,
    /// Raised by the slow tick timer.
    pub slow_tick: SlowTickFlag,
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Afc`. The configuration is validated on `build()`.
pub struct AfcBuilder<R, F, T> {
    cfg: Option<AfcCfg>,
    reverse: Option<Box<dyn AnalogScaler + Send>>,
    forward: Option<Box<dyn AnalogScaler + Send>>,
    transport: Option<Box<dyn Transport + Send>>,
    bring_up: Option<BringUp>,
    _r: PhantomData<R>,
    _f: PhantomData<F>,
    _t: PhantomData<T>,
}

impl Default for AfcBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            cfg: None,
            reverse: None,
            forward: None,
            transport: None,
            bring_up: None,
            _r: PhantomData,
            _f: PhantomData,
            _t: PhantomData,
        }
    }
}

impl Afc {
    /// Start building a controller.
    pub fn builder() -> AfcBuilder<Missing, Missing, Missing> {
        AfcBuilder::default()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Check the cross-field constraints the controller relies on.
pub fn validate(cfg: &AfcCfg) -> Result<()> {
    let t = &cfg.travel;
    if t.min_position >= t.max_position {
        return Err(invalid("min_position must be < max_position"));
    }
    if t.zero_tolerance >= t.max_position {
        return Err(invalid("zero_tolerance must be < max_position"));
    }
    let a = &cfg.actuator;
    if a.fast_step_hz == 0 || a.slow_step_hz == 0 {
        return Err(invalid("step rates must be > 0"));
    }
    let d = &cfg.direction;
    if d.rev_power_bands.is_empty() {
        return Err(invalid("at least one reverse power band is required"));
    }
    if d.fast_move_delta == 0 || d.slow_move_delta == 0 {
        return Err(invalid("move deltas must be > 0"));
    }
    if d.min_fast_pulses > d.max_fast_pulses {
        return Err(invalid("min_fast_pulses must be <= max_fast_pulses"));
    }
    let c = &cfg.cooldown;
    if c.bucket_shift >= 32 {
        return Err(invalid("bucket_shift must be < 32"));
    }
    if c.start_after_ticks > c.idle_ceiling_ticks {
        return Err(invalid("cooldown must start below the idle ceiling"));
    }
    let p = &cfg.power;
    if p.min_reading >= p.max_reading {
        return Err(invalid("min_reading must be < max_reading"));
    }
    if p.db_factor_q15 == 0 {
        return Err(invalid("db factor must be > 0"));
    }
    let tm = &cfg.timing;
    if tm.slow_tick_ms == 0 {
        return Err(invalid("slow_tick_ms must be > 0"));
    }
    if tm.watchdog_ms <= tm.slow_tick_ms {
        return Err(invalid("watchdog_ms must exceed slow_tick_ms"));
    }
    Ok(())
}

/// Validate `cfg` and construct a controller plus its trigger side.
///
/// Single source of truth for construction, used by both
/// `AfcBuilder::try_build()` and callers that want static dispatch.
pub fn build_afc<R, F, T>(
    cfg: AfcCfg,
    reverse: R,
    forward: F,
    transport: T,
    bring_up: Option<BringUp>,
) -> Result<(AfcController<R, F, T>, TriggerSide)>
where
    R: AnalogScaler,
    F: AnalogScaler,
    T: Transport,
{
    validate(&cfg)?;

    let (capture, reader) = capture_slot();
    let (control, step) = actuator_link(
        cfg.travel.max_position,
        cfg.actuator.low_power_after_ticks,
        step_period(cfg.actuator.fast_step_hz),
    );
    let position = control.position_tap();
    let slow_tick = SlowTickFlag::new();

    let controller = AfcController::new(
        cfg,
        control,
        reader,
        slow_tick.clone(),
        reverse,
        forward,
        transport,
        bring_up,
    );
    Ok((
        controller,
        TriggerSide {
            capture,
            position,
            step,
            slow_tick,
        },
    ))
}

impl<R, F, T> AfcBuilder<R, F, T> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<(Afc, TriggerSide)> {
        let reverse = self
            .reverse
            .ok_or_else(|| eyre::Report::new(BuildError::MissingReverseScaler))?;
        let forward = self
            .forward
            .ok_or_else(|| eyre::Report::new(BuildError::MissingForwardScaler))?;
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        build_afc(
            self.cfg.unwrap_or_default(),
            reverse,
            forward,
            transport,
            self.bring_up,
        )
    }

    pub fn with_config(mut self, cfg: AfcCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// One-shot peripheral bring-up, run when the controller enters `Startup`.
    pub fn with_bring_up<B>(mut self, f: B) -> Self
    where
        B: FnOnce() -> std::result::Result<(), afc_traits::BoxError> + Send + 'static,
    {
        self.bring_up = Some(Box::new(f));
        self
    }
}

impl AfcBuilder<Set, Set, Set> {
    /// Infallible in type-state; the configuration can still be rejected.
    pub fn build(self) -> Result<(Afc, TriggerSide)> {
        self.try_build()
    }
}

// Setters that advance type-state
impl<F, T> AfcBuilder<Missing, F, T> {
    pub fn with_reverse_scaler(
        self,
        s: impl AnalogScaler + Send + 'static,
    ) -> AfcBuilder<Set, F, T> {
        AfcBuilder {
            cfg: self.cfg,
            reverse: Some(Box::new(s)),
            forward: self.forward,
            transport: self.transport,
            bring_up: self.bring_up,
            _r: PhantomData,
            _f: PhantomData,
            _t: PhantomData,
        }
    }
}

impl<R, T> AfcBuilder<R, Missing, T> {
    pub fn with_forward_scaler(
        self,
        s: impl AnalogScaler + Send + 'static,
    ) -> AfcBuilder<R, Set, T> {
        AfcBuilder {
            cfg: self.cfg,
            reverse: self.reverse,
            forward: Some(Box::new(s)),
            transport: self.transport,
            bring_up: self.bring_up,
            _r: PhantomData,
            _f: PhantomData,
            _t: PhantomData,
        }
    }
}

impl<R, F> AfcBuilder<R, F, Missing> {
    pub fn with_transport(self, t: impl Transport + Send + 'static) -> AfcBuilder<R, F, Set> {
        AfcBuilder {
            cfg: self.cfg,
            reverse: self.reverse,
            forward: self.forward,
            transport: Some(Box::new(t)),
            bring_up: self.bring_up,
            _r: PhantomData,
            _f: PhantomData,
            _t: PhantomData,
        }
    }
}
