//! Q1.15 fixed-point helpers.
//!
//! Multipliers are unsigned Q1.15: `0x8000` is exactly 1.0, so a factor can
//! express the closed range `[0.0, ~2.0)`. Products use 32-bit intermediates
//! and saturate to `u16`.

/// 1.0 in Q1.15.
pub const Q15_ONE: u16 = 0x8000;

const Q15_SHIFT: u32 = 15;

/// Multiply `value` by a Q1.15 `factor`, truncating, saturating at `u16::MAX`.
#[inline]
pub fn scale_q15(value: u16, factor: u16) -> u16 {
    let product = (u32::from(value) * u32::from(factor)) >> Q15_SHIFT;
    u16::try_from(product).unwrap_or(u16::MAX)
}

/// Quantize a real factor to Q1.15, rounding to nearest.
///
/// Non-finite and negative inputs map to 0; inputs at or above 2.0 clamp to
/// the largest representable factor.
#[inline]
pub fn q15_from_f32(x: f32) -> u16 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    let scaled = (x * f32::from(Q15_ONE)).round();
    if scaled >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        scaled as u16
    }
}
