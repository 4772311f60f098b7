//! Pulse capture and post-pulse processing.
//!
//! `PulseCapture` runs in the pulse-trigger context: it reads the position
//! and both converter pairs and publishes one `RawCapture`. `PostPulse` runs
//! on the control loop once a capture is observed: channel routing, analog
//! scaling and conversion to dB units.

use afc_traits::{AdcChannel, AnalogScaler, BoxError, ExternalAdc, InternalAdc, PulseCounter};

use crate::config::{ChannelSource, PowerCfg};
use crate::fixed_point::scale_q15;
use crate::handoff::{CaptureWriter, PositionTap, RawCapture};

/// Link word returned by an external converter that does not answer.
pub const ADC_NOT_RESPONDING: u32 = 0x1111_0000;

/// Internal conversions are stored left-justified by this many bits.
pub const INTERNAL_JUSTIFY_SHIFT: u32 = 6;

/// Reading of one external transfer. Errors and the not-responding word
/// become 0, the "no data" value.
pub fn external_reading(result: Result<u32, BoxError>, channel: AdcChannel) -> u16 {
    match result {
        Ok(ADC_NOT_RESPONDING) => {
            tracing::trace!(?channel, "external converter not responding");
            0
        }
        Ok(word) => (word & 0xFFFF) as u16,
        Err(e) => {
            tracing::debug!(?channel, error = %e, "external converter read failed");
            0
        }
    }
}

/// Pulse-trigger half of sampling.
pub struct PulseCapture<E, I, C> {
    external: E,
    internal: I,
    counter: C,
    writer: CaptureWriter,
    position: PositionTap,
}

impl<E, I, C> core::fmt::Debug for PulseCapture<E, I, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseCapture")
            .field("position", &self.position.position())
            .finish_non_exhaustive()
    }
}

impl<E, I, C> PulseCapture<E, I, C>
where
    E: ExternalAdc,
    I: InternalAdc,
    C: PulseCounter,
{
    pub fn new(
        external: E,
        internal: I,
        counter: C,
        writer: CaptureWriter,
        position: PositionTap,
    ) -> Self {
        Self {
            external,
            internal,
            counter,
            writer,
            position,
        }
    }

    /// Capture one pulse and publish it.
    pub fn trigger(&mut self) -> RawCapture {
        self.writer.begin();
        let position_at_trigger = self.position.position();

        let (a, b) = self.internal.read_pair().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "internal converter read failed");
            (0, 0)
        });
        let external_a = external_reading(self.external.transfer(AdcChannel::A), AdcChannel::A);
        let external_b = external_reading(self.external.transfer(AdcChannel::B), AdcChannel::B);

        let capture = RawCapture {
            position_at_trigger,
            internal_a: a << INTERNAL_JUSTIFY_SHIFT,
            internal_b: b << INTERNAL_JUSTIFY_SHIFT,
            external_a,
            external_b,
            sample_index: self.counter.pulse_count(),
        };
        self.writer.publish(capture);
        capture
    }
}

/// Calibrated reading in 100 uV units to 0.01 dB below `max_reading`.
///
/// Monotonic non-increasing; saturates at both clamp bounds.
#[inline]
pub fn to_db(reading: u16, cfg: &PowerCfg) -> u16 {
    let clamped = reading.clamp(cfg.min_reading, cfg.max_reading);
    scale_q15(cfg.max_reading - clamped, cfg.db_factor_q15)
}

/// Pick the captured reading a power channel is routed to.
#[inline]
pub fn select(capture: &RawCapture, source: ChannelSource) -> u16 {
    match source {
        ChannelSource::InternalA => capture.internal_a,
        ChannelSource::InternalB => capture.internal_b,
        ChannelSource::ExternalA => capture.external_a,
        ChannelSource::ExternalB => capture.external_b,
    }
}

/// Result of post-pulse processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerReadings {
    pub reverse_raw: u16,
    pub forward_raw: u16,
    pub reverse_calibrated: u16,
    pub forward_calibrated: u16,
    pub reverse_db: u16,
    pub forward_db: u16,
}

/// Control-loop half of sampling.
pub struct PostPulse<R, F> {
    cfg: PowerCfg,
    reverse: R,
    forward: F,
}

impl<R, F> core::fmt::Debug for PostPulse<R, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PostPulse")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl<R: AnalogScaler, F: AnalogScaler> PostPulse<R, F> {
    pub fn new(cfg: PowerCfg, reverse: R, forward: F) -> Self {
        Self {
            cfg,
            reverse,
            forward,
        }
    }

    pub fn cfg(&self) -> &PowerCfg {
        &self.cfg
    }

    pub fn process(&self, capture: &RawCapture) -> PowerReadings {
        let reverse_raw = select(capture, self.cfg.reverse_source);
        let forward_raw = select(capture, self.cfg.forward_source);
        let reverse_calibrated = self.reverse.scale(reverse_raw);
        let forward_calibrated = self.forward.scale(forward_raw);
        PowerReadings {
            reverse_raw,
            forward_raw,
            reverse_calibrated,
            forward_calibrated,
            reverse_db: to_db(reverse_calibrated, &self.cfg),
            forward_db: to_db(forward_calibrated, &self.cfg),
        }
    }
}

/// Gain and offset calibration: `raw * gain + offset`, saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearScaler {
    /// Q1.15 gain.
    pub gain_q15: u16,
    pub offset: i16,
}

impl Default for LinearScaler {
    fn default() -> Self {
        Self {
            gain_q15: 20_480,
            offset: 0,
        }
    }
}

impl AnalogScaler for LinearScaler {
    fn scale(&self, raw: u16) -> u16 {
        let scaled = i32::from(scale_q15(raw, self.gain_q15)) + i32::from(self.offset);
        u16::try_from(scaled.max(0)).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_saturates_at_bounds() {
        let cfg = PowerCfg::default();
        assert_eq!(to_db(0, &cfg), to_db(cfg.min_reading, &cfg));
        assert_eq!(to_db(u16::MAX, &cfg), 0);
        assert_eq!(to_db(cfg.max_reading, &cfg), 0);
        // 18000 * 0.4
        assert_eq!(to_db(cfg.min_reading, &cfg), 7_199);
    }

    #[test]
    fn sentinel_and_errors_read_as_zero() {
        assert_eq!(external_reading(Ok(ADC_NOT_RESPONDING), AdcChannel::A), 0);
        assert_eq!(external_reading(Ok(0xABCD_1234), AdcChannel::A), 0x1234);
        let err: BoxError = "bus".into();
        assert_eq!(external_reading(Err(err), AdcChannel::B), 0);
    }

    #[test]
    fn routing_selects_configured_channels() {
        let cap = RawCapture {
            internal_a: 1,
            internal_b: 2,
            external_a: 3,
            external_b: 4,
            ..RawCapture::default()
        };
        assert_eq!(select(&cap, ChannelSource::InternalA), 1);
        assert_eq!(select(&cap, ChannelSource::InternalB), 2);
        assert_eq!(select(&cap, ChannelSource::ExternalA), 3);
        assert_eq!(select(&cap, ChannelSource::ExternalB), 4);
    }

    #[test]
    fn linear_scaler_saturates() {
        let s = LinearScaler {
            gain_q15: 0x8000,
            offset: -10,
        };
        assert_eq!(s.scale(5), 0);
        assert_eq!(s.scale(100), 90);
        let s = LinearScaler {
            gain_q15: u16::MAX,
            offset: i16::MAX,
        };
        assert_eq!(s.scale(u16::MAX), u16::MAX);
    }
}
