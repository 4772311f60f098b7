//! Boundary traits between the AFC control core and the board.
//!
//! Every collaborator the core talks to (converters, phase PWM, the command
//! transport, analog scaling) is reached through one of these traits so the
//! core stays hardware-agnostic and can be driven by simulated devices.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Boxed error type used at trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Input channel of the external converter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdcChannel {
    A,
    B,
}

/// External converter read over a synchronous serial link.
///
/// `transfer` returns the raw link word. A converter that does not answer
/// shows up either as an `Err` or as the platform's "not responding" word;
/// the core treats both as a zero reading.
pub trait ExternalAdc {
    fn transfer(&mut self, channel: AdcChannel) -> Result<u32, BoxError>;
}

/// On-chip converter, sampled in hardware at the pulse trigger.
///
/// Returns `(a, b)` right-justified conversion results.
pub trait InternalAdc {
    fn read_pair(&mut self) -> Result<(u16, u16), BoxError>;
}

/// Four-phase stepper drive (A+, A-, B+, B- duty cycles).
pub trait PhaseOutput {
    fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), BoxError>;
}

/// The command/telemetry transport as seen from the control core.
pub trait Transport {
    /// True while the transport currently sees a communication fault.
    fn com_fault(&self) -> bool;
    /// Level of the externally driven fault reset signal.
    fn reset_requested(&self) -> bool;
    /// True when the host asked for per-pulse logging.
    fn fast_logging_enabled(&self) -> bool;
    /// Publish one pulse log record.
    fn log_pulse(&mut self, register: u16, words: [u16; 4]) -> Result<(), BoxError>;
}

/// Monotonically increasing pulse counter kept by the transport, read at
/// the pulse trigger to tag each capture.
pub trait PulseCounter {
    fn pulse_count(&self) -> u16;
}

/// Calibration/scale applied to a raw converter reading.
///
/// Treated as a pure function by the core.
pub trait AnalogScaler {
    fn scale(&self, raw: u16) -> u16;
}

impl<T: ExternalAdc + ?Sized> ExternalAdc for Box<T> {
    fn transfer(&mut self, channel: AdcChannel) -> Result<u32, BoxError> {
        (**self).transfer(channel)
    }
}

impl<T: InternalAdc + ?Sized> InternalAdc for Box<T> {
    fn read_pair(&mut self) -> Result<(u16, u16), BoxError> {
        (**self).read_pair()
    }
}

impl<T: PhaseOutput + ?Sized> PhaseOutput for Box<T> {
    fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), BoxError> {
        (**self).set_duties(duties)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn com_fault(&self) -> bool {
        (**self).com_fault()
    }
    fn reset_requested(&self) -> bool {
        (**self).reset_requested()
    }
    fn fast_logging_enabled(&self) -> bool {
        (**self).fast_logging_enabled()
    }
    fn log_pulse(&mut self, register: u16, words: [u16; 4]) -> Result<(), BoxError> {
        (**self).log_pulse(register, words)
    }
}

impl<T: AnalogScaler + ?Sized> AnalogScaler for Box<T> {
    fn scale(&self, raw: u16) -> u16 {
        (**self).scale(raw)
    }
}

impl<T: PulseCounter + ?Sized> PulseCounter for Box<T> {
    fn pulse_count(&self) -> u16 {
        (**self).pulse_count()
    }
}
