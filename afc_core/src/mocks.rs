//! Test doubles for the board traits.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use afc_traits::{
    AdcChannel, AnalogScaler, BoxError, ExternalAdc, InternalAdc, PhaseOutput, PulseCounter,
    Transport,
};

/// Passes readings through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl AnalogScaler for IdentityScaler {
    fn scale(&self, raw: u16) -> u16 {
        raw
    }
}

/// Transport with no faults and no logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn com_fault(&self) -> bool {
        false
    }
    fn reset_requested(&self) -> bool {
        false
    }
    fn fast_logging_enabled(&self) -> bool {
        false
    }
    fn log_pulse(&mut self, _register: u16, _words: [u16; 4]) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Transport whose lines are driven through shared flags.
#[derive(Debug, Clone, Default)]
pub struct FlagTransport {
    pub com_fault: Arc<AtomicBool>,
    pub reset: Arc<AtomicBool>,
    pub fast_logging: Arc<AtomicBool>,
    pub records: Vec<(u16, [u16; 4])>,
}

impl Transport for FlagTransport {
    fn com_fault(&self) -> bool {
        self.com_fault.load(Ordering::Relaxed)
    }
    fn reset_requested(&self) -> bool {
        self.reset.load(Ordering::Relaxed)
    }
    fn fast_logging_enabled(&self) -> bool {
        self.fast_logging.load(Ordering::Relaxed)
    }
    fn log_pulse(&mut self, register: u16, words: [u16; 4]) -> Result<(), BoxError> {
        self.records.push((register, words));
        Ok(())
    }
}

/// External converter answering from a script, then repeating `fallback`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdc {
    pub script: VecDeque<Result<u32, String>>,
    pub fallback: u32,
}

impl ScriptedAdc {
    pub fn constant(word: u32) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: word,
        }
    }
}

impl ExternalAdc for ScriptedAdc {
    fn transfer(&mut self, _channel: AdcChannel) -> Result<u32, BoxError> {
        match self.script.pop_front() {
            Some(Ok(w)) => Ok(w),
            Some(Err(e)) => Err(e.into()),
            None => Ok(self.fallback),
        }
    }
}

/// Internal converter returning a fixed pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInternalAdc(pub u16, pub u16);

impl InternalAdc for FixedInternalAdc {
    fn read_pair(&mut self) -> Result<(u16, u16), BoxError> {
        Ok((self.0, self.1))
    }
}

/// Phase driver that discards its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPhases;

impl PhaseOutput for NullPhases {
    fn set_duties(&mut self, _duties: [u16; 4]) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Pulse counter advancing once per read.
#[derive(Debug, Clone, Default)]
pub struct StepCounter(pub Arc<AtomicU16>);

impl PulseCounter for StepCounter {
    fn pulse_count(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}
