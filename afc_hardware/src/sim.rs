//! Simulated board devices.
//!
//! The RF load is a single resonance: reflected power dips to a minimum at
//! `resonance` with a Lorentzian shape of half width `width`. The reverse
//! detector has a negative slope, so the dip shows up as a peak in the raw
//! reading.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use afc_traits::{
    AdcChannel, BoxError, ExternalAdc, InternalAdc, PhaseOutput, PulseCounter, Transport,
};

use crate::error::HwError;

/// Link word the external converter answers when it is not responding.
pub const NOT_RESPONDING_WORD: u32 = 0x1111_0000;

/// Full scale of the 10-bit internal converter.
const INTERNAL_FULL_SCALE: u16 = 0x03FF;

/// Reads the actuator position the load is tuned by.
pub type PositionFn = Arc<dyn Fn() -> u16 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimParams {
    pub resonance: u16,
    pub width: u16,
    pub off_resonance_reading: u16,
    pub on_resonance_reading: u16,
    /// Peak-to-peak uniform noise.
    pub noise: u16,
    /// Every Nth external transfer answers "not responding"; 0 disables.
    pub not_responding_every: u32,
    pub forward_reading: u16,
    pub seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            resonance: 17_500,
            width: 3_000,
            off_resonance_reading: 9_000,
            on_resonance_reading: 33_000,
            noise: 160,
            not_responding_every: 0,
            forward_reading: 800,
            seed: 0x5EED,
        }
    }
}

impl SimParams {
    /// Noise-free reverse detector reading at `position`.
    pub fn reverse_reading(&self, position: u16) -> u16 {
        let d = f64::from(position) - f64::from(self.resonance);
        let w = f64::from(self.width.max(1));
        let dip = (w * w) / (w * w + d * d);
        let off = f64::from(self.off_resonance_reading);
        let on = f64::from(self.on_resonance_reading);
        let r = (on - off).mul_add(dip, off);
        r.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

/// xorshift64* generator; deterministic per seed.
#[derive(Debug, Clone)]
struct Noise {
    state: u64,
    span: u16,
}

impl Noise {
    fn new(seed: u64, span: u16) -> Self {
        Self {
            state: seed | 1,
            span,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Apply uniform noise in `[-span/2, span/2]`.
    fn apply(&mut self, value: u16) -> u16 {
        if self.span == 0 {
            return value;
        }
        let span = u64::from(self.span) + 1;
        let offset = (self.next_u64() % span) as i32 - i32::from(self.span / 2);
        (i32::from(value) + offset).clamp(0, i32::from(u16::MAX)) as u16
    }
}

/// External converter pair watching the simulated load: channel A is the
/// reverse detector, channel B the incident detector.
pub struct SimExternalAdc {
    params: SimParams,
    position: PositionFn,
    noise: Noise,
    transfers: u32,
}

impl core::fmt::Debug for SimExternalAdc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimExternalAdc")
            .field("params", &self.params)
            .field("transfers", &self.transfers)
            .finish_non_exhaustive()
    }
}

impl SimExternalAdc {
    pub fn new(params: SimParams, position: PositionFn) -> Self {
        Self {
            noise: Noise::new(params.seed, params.noise),
            params,
            position,
            transfers: 0,
        }
    }

    pub const fn transfers(&self) -> u32 {
        self.transfers
    }
}

impl ExternalAdc for SimExternalAdc {
    fn transfer(&mut self, channel: AdcChannel) -> Result<u32, BoxError> {
        self.transfers = self.transfers.wrapping_add(1);
        let every = self.params.not_responding_every;
        if every != 0 && self.transfers % every == 0 {
            tracing::trace!(transfer = self.transfers, "simulated converter silent");
            return Ok(NOT_RESPONDING_WORD);
        }
        let clean = match channel {
            AdcChannel::A => self.params.reverse_reading((self.position)()),
            AdcChannel::B => self.params.off_resonance_reading,
        };
        Ok(u32::from(self.noise.apply(clean)))
    }
}

/// On-chip converter pair sampling the forward detector on both inputs.
#[derive(Debug, Clone)]
pub struct SimInternalAdc {
    reading: u16,
    noise: Noise,
}

impl SimInternalAdc {
    pub fn new(params: &SimParams) -> Self {
        Self {
            reading: params.forward_reading.min(INTERNAL_FULL_SCALE),
            // internal converter noise is a few LSB
            noise: Noise::new(params.seed.rotate_left(17), 4),
        }
    }
}

impl InternalAdc for SimInternalAdc {
    fn read_pair(&mut self) -> Result<(u16, u16), BoxError> {
        let a = self.noise.apply(self.reading).min(INTERNAL_FULL_SCALE);
        let b = self.noise.apply(self.reading).min(INTERNAL_FULL_SCALE);
        Ok((a, b))
    }
}

/// Observer for `SimPhases`.
#[derive(Debug, Clone, Default)]
pub struct PhaseProbe {
    last: Arc<Mutex<[u16; 4]>>,
    writes: Arc<AtomicU64>,
}

impl PhaseProbe {
    pub fn last(&self) -> [u16; 4] {
        self.last.lock().map_or([0; 4], |g| *g)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Phase driver that records what it is told.
#[derive(Debug, Clone, Default)]
pub struct SimPhases {
    probe: PhaseProbe,
}

impl SimPhases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> PhaseProbe {
        self.probe.clone()
    }
}

impl PhaseOutput for SimPhases {
    fn set_duties(&mut self, duties: [u16; 4]) -> Result<(), BoxError> {
        let mut last = self
            .probe
            .last
            .lock()
            .map_err(|_| HwError::Pwm("phase state poisoned".into()))?;
        *last = duties;
        self.probe.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Externally driven lines of the simulated transport.
#[derive(Debug, Clone, Default)]
pub struct TransportLines {
    pub com_fault: Arc<AtomicBool>,
    pub reset: Arc<AtomicBool>,
    pub fast_logging: Arc<AtomicBool>,
}

/// Command transport stand-in: fault lines are atomics the test or CLI
/// drives, and pulse log records are buffered up to a capacity.
#[derive(Debug, Clone)]
pub struct SimTransport {
    lines: TransportLines,
    records: Arc<Mutex<Vec<(u16, [u16; 4])>>>,
    capacity: usize,
}

impl SimTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: TransportLines::default(),
            records: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    pub fn lines(&self) -> TransportLines {
        self.lines.clone()
    }

    /// Take the buffered log records.
    pub fn drain(&self) -> Vec<(u16, [u16; 4])> {
        self.records
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }
}

impl Transport for SimTransport {
    fn com_fault(&self) -> bool {
        self.lines.com_fault.load(Ordering::Relaxed)
    }

    fn reset_requested(&self) -> bool {
        self.lines.reset.load(Ordering::Relaxed)
    }

    fn fast_logging_enabled(&self) -> bool {
        self.lines.fast_logging.load(Ordering::Relaxed)
    }

    fn log_pulse(&mut self, register: u16, words: [u16; 4]) -> Result<(), BoxError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| HwError::Io(std::io::Error::other("log buffer poisoned")))?;
        if records.len() >= self.capacity {
            return Err(HwError::Full("pulse log buffer").into());
        }
        records.push((register, words));
        Ok(())
    }
}

/// Pulse counter that advances on every read; read once per pulse.
#[derive(Debug, Clone, Default)]
pub struct SimPulseCounter {
    count: Arc<AtomicU16>,
}

impl SimPulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulses counted so far, without advancing.
    pub fn peek(&self) -> u16 {
        self.count.load(Ordering::Relaxed)
    }
}

impl PulseCounter for SimPulseCounter {
    fn pulse_count(&self) -> u16 {
        self.count.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_reading_peaks_at_resonance() {
        let p = SimParams::default();
        assert_eq!(p.reverse_reading(p.resonance), p.on_resonance_reading);
        let near = p.reverse_reading(p.resonance + 500);
        let far = p.reverse_reading(p.resonance + 8_000);
        assert!(near > far);
        assert!(far > p.off_resonance_reading);
    }

    #[test]
    fn noise_stays_within_span() {
        let mut n = Noise::new(7, 100);
        for _ in 0..1_000 {
            let v = n.apply(1_000);
            assert!((950..=1_050).contains(&v), "{v}");
        }
    }

    #[test]
    fn counter_advances_per_read_and_wraps() {
        let c = SimPulseCounter::new();
        c.count.store(u16::MAX - 1, Ordering::Relaxed);
        assert_eq!(c.pulse_count(), u16::MAX);
        assert_eq!(c.pulse_count(), 0);
    }
}
