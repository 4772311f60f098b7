//! Debug and log registers exposed to the transport.

use crate::handoff::RawCapture;
use crate::sampling::{INTERNAL_JUSTIFY_SHIFT, PowerReadings};

/// Pulse log register: sample index, trigger position, target, reverse dB.
pub const FAST_LOG_0: u16 = 0x0;
/// Pulse log register: sample index only.
pub const FAST_LOG_1: u16 = 0x1;

pub const DEBUG_REGISTERS: usize = 8;
pub const LOG_WORDS: usize = 12;

/// Register snapshot, refreshed by post-pulse processing and the slow tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Telemetry {
    /// Per-pulse debug registers 0..8.
    pub debug: [u16; DEBUG_REGISTERS],
    /// Slow-tick log words: `[1]` target, `[2]` current, `[11]` home.
    pub log_data: [u16; LOG_WORDS],
    /// Completed samples observed.
    pub samples: u64,
    /// Captures overwritten before the control loop saw them.
    pub missed_samples: u64,
    /// Commands with an unknown index.
    pub unknown_commands: u64,
    /// Pulse log records the transport refused.
    pub dropped_log_records: u64,
}

impl Telemetry {
    pub fn record_pulse(&mut self, capture: &RawCapture, readings: &PowerReadings) {
        self.debug = [
            capture.internal_a >> INTERNAL_JUSTIFY_SHIFT,
            capture.internal_b >> INTERNAL_JUSTIFY_SHIFT,
            capture.internal_a,
            capture.internal_b,
            capture.external_a,
            capture.external_b,
            readings.reverse_db,
            readings.forward_db,
        ];
        self.samples += 1;
    }

    pub fn record_positions(&mut self, target: u16, current: u16, home: u16) {
        self.log_data[0] = 0;
        self.log_data[1] = target;
        self.log_data[2] = current;
        self.log_data[11] = home;
    }
}

/// The two pulse log records for one capture.
pub fn fast_log_records(
    capture: &RawCapture,
    target: u16,
    reverse_db: u16,
) -> [(u16, [u16; 4]); 2] {
    [
        (
            FAST_LOG_0,
            [
                capture.sample_index,
                capture.position_at_trigger,
                target,
                reverse_db,
            ],
        ),
        (FAST_LOG_1, [capture.sample_index, 0, 0, 0]),
    ]
}
