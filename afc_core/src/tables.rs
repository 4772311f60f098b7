//! Static lookup tables: stepper phase duty curves and the cooldown curve.
//!
//! The values are generated offline and are the definition of the control
//! behavior; do not replace them with a formula evaluated at run time.

/// Entries in each PWM duty table (one electrical cycle, four full steps).
pub const PWM_TABLE_LEN: usize = 128;

/// Mask applied to a position to index a PWM table.
pub const PWM_INDEX_MASK: u16 = 0x007F;

/// Table offsets for the A+, A-, B+ and B- outputs.
pub const PHASE_OFFSETS: [u16; 4] = [0, 64, 32, 96];

/// Entries in the cooldown table.
pub const COOLDOWN_TABLE_LEN: usize = 256;

/// Full-current duty cycles, used while the motor is moving.
#[rustfmt::skip]
pub static PWM_HIGH_POWER: [u16; PWM_TABLE_LEN] = [
    0, 49, 98, 147, 195, 243, 290, 337, 383, 428, 471, 514, 556, 596, 634, 672,
    707, 741, 773, 803, 831, 858, 882, 904, 924, 942, 957, 970, 981, 989, 995, 999,
    1000, 999, 995, 989, 981, 970, 957, 942, 924, 904, 882, 858, 831, 803, 773, 741,
    707, 672, 634, 596, 556, 514, 471, 428, 383, 337, 290, 243, 195, 147, 98, 49,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Reduced-current duty cycles, used to hold a stationary motor.
#[rustfmt::skip]
pub static PWM_LOW_POWER: [u16; PWM_TABLE_LEN] = [
    0, 20, 39, 59, 78, 97, 116, 135, 153, 171, 189, 206, 222, 238, 254, 269,
    283, 296, 309, 321, 333, 343, 353, 362, 370, 377, 383, 388, 392, 396, 398, 400,
    400, 400, 398, 396, 392, 388, 383, 377, 370, 362, 353, 343, 333, 321, 309, 296,
    283, 269, 254, 238, 222, 206, 189, 171, 153, 135, 116, 97, 78, 59, 39, 20,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Q1.15 blend of the hot position toward home, one entry per 512 slow ticks
/// (5.12 s at 10 ms). Starts at 1.0 and reaches 0 after 20 minutes.
#[rustfmt::skip]
pub static COOLDOWN: [u16; COOLDOWN_TABLE_LEN] = [
    32768, 32215, 31672, 31137, 30611, 30094, 29585, 29085, 28593, 28109, 27634, 27166,
    26705, 26253, 25808, 25370, 24939, 24516, 24100, 23690, 23287, 22891, 22502, 22119,
    21742, 21371, 21007, 20648, 20296, 19949, 19608, 19273, 18943, 18619, 18300, 17986,
    17678, 17375, 17076, 16783, 16494, 16210, 15931, 15657, 15387, 15121, 14860, 14603,
    14351, 14102, 13858, 13618, 13382, 13149, 12921, 12696, 12475, 12258, 12044, 11834,
    11627, 11423, 11223, 11027, 10833, 10643, 10456, 10272, 10091, 9913, 9738, 9566,
    9396, 9230, 9066, 8905, 8747, 8591, 8438, 8287, 8139, 7993, 7850, 7709,
    7570, 7434, 7300, 7168, 7039, 6911, 6786, 6662, 6541, 6422, 6304, 6189,
    6075, 5964, 5854, 5746, 5640, 5536, 5433, 5332, 5233, 5135, 5039, 4944,
    4851, 4760, 4670, 4582, 4495, 4409, 4325, 4243, 4161, 4081, 4003, 3925,
    3849, 3774, 3701, 3629, 3557, 3487, 3419, 3351, 3284, 3219, 3154, 3091,
    3029, 2968, 2907, 2848, 2790, 2733, 2676, 2621, 2566, 2513, 2460, 2408,
    2357, 2307, 2258, 2209, 2161, 2114, 2068, 2023, 1978, 1934, 1891, 1849,
    1807, 1766, 1726, 1686, 1647, 1608, 1571, 1534, 1497, 1461, 1426, 1391,
    1357, 1323, 1290, 1258, 1226, 1194, 1163, 1133, 1103, 1074, 1045, 1016,
    988, 961, 934, 907, 881, 855, 830, 805, 780, 756, 733, 709,
    686, 664, 642, 620, 598, 577, 557, 536, 516, 496, 477, 458,
    439, 421, 403, 385, 367, 350, 333, 316, 300, 284, 268, 252,
    237, 222, 207, 192, 178, 164, 150, 136, 123, 110, 97, 84,
    71, 59, 47, 35, 23, 11, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0,
];

/// Index into a PWM table for `position` shifted by `offset`, modulo the
/// table length.
#[inline]
pub fn shift_index(position: u16, offset: u16) -> usize {
    usize::from(((position & PWM_INDEX_MASK) + offset) & PWM_INDEX_MASK)
}
