//! OPM lookup tables
//!
//! The log-sine, exponent and phase step curves are generated on first use and never
//! change afterwards. The routing, detune and envelope increment tables are small enough
//! to be spelled out.

use std::f64::consts::PI;
use std::sync::LazyLock;

/// Quarter-wave log-sine table, attenuation in 4.8 fixed point.
static LOG_SINE: LazyLock<[u16; 256]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        let sine = (((i << 1) | 1) as f64 * PI / 1024.0).sin();
        (-sine.log2() * 256.0).round() as u16
    })
});

/// Fractional part of 2^-x, 11 bits with the implicit leading one included.
static POW2: LazyLock<[u16; 256]> = LazyLock::new(|| {
    std::array::from_fn(|i| (2048.0 * 2f64.powf(-((i + 1) as f64) / 256.0)).round() as u16)
});

/// Phase step for each of the 768 fractional positions inside one octave (octave 7).
static PHASE_STEP: LazyLock<[u32; 768]> =
    LazyLock::new(|| std::array::from_fn(|i| (41568.0 * 2f64.powf(i as f64 / 768.0)).round() as u32));

/// DT1 adjustment per 5-bit keycode for detune values 0-3.
const DETUNE1: [[u8; 4]; 32] = [
    [0, 0, 1, 2],
    [0, 0, 1, 2],
    [0, 0, 1, 2],
    [0, 0, 1, 2],
    [0, 1, 2, 2],
    [0, 1, 2, 3],
    [0, 1, 2, 3],
    [0, 1, 2, 3],
    [0, 1, 2, 4],
    [0, 1, 3, 4],
    [0, 1, 3, 4],
    [0, 1, 3, 5],
    [0, 2, 4, 5],
    [0, 2, 4, 6],
    [0, 2, 4, 6],
    [0, 2, 5, 7],
    [0, 2, 5, 8],
    [0, 3, 6, 8],
    [0, 3, 6, 9],
    [0, 3, 7, 10],
    [0, 4, 8, 11],
    [0, 4, 8, 12],
    [0, 4, 9, 13],
    [0, 5, 10, 14],
    [0, 5, 11, 16],
    [0, 6, 12, 17],
    [0, 6, 13, 19],
    [0, 7, 14, 20],
    [0, 8, 16, 22],
    [0, 8, 16, 22],
    [0, 8, 16, 22],
    [0, 8, 16, 22],
];

/// DT2 coarse detune in 1/64 semitone steps (0, +600, +781, +950 cents).
pub const DETUNE2_DELTA: [i32; 4] = [0, 384, 500, 608];

/// Envelope increments, eight 4-bit steps per rate packed into one word.
const EG_INCREMENTS: [u32; 64] = [
    0x0000_0000, 0x0000_0000, 0x1010_1010, 0x1010_1010, // 0-3
    0x1010_1010, 0x1010_1010, 0x1110_1110, 0x1110_1110, // 4-7
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 8-11
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 12-15
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 16-19
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 20-23
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 24-27
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 28-31
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 32-35
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 36-39
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 40-43
    0x1010_1010, 0x1011_1010, 0x1110_1110, 0x1111_1110, // 44-47
    0x1111_1111, 0x2111_2111, 0x2121_2121, 0x2221_2221, // 48-51
    0x2222_2222, 0x4222_4222, 0x4242_4242, 0x4442_4442, // 52-55
    0x4444_4444, 0x8444_8444, 0x8484_8484, 0x8884_8884, // 56-59
    0x8888_8888, 0x8888_8888, 0x8888_8888, 0x8888_8888, // 60-63
];

/// Operator routing per algorithm.
///
/// Bit 0 selects the modulation source of op2, bits 1-3 of op3, bits 4-6 of op4 (index
/// into the per-sample output slots); bits 7-9 mark op1-op3 as carriers. Op4 is always a
/// carrier.
pub const ALGORITHM_ROUTING: [u16; 8] = [
    routing(1, 2, 3, false, false, false),
    routing(0, 5, 3, false, false, false),
    routing(0, 2, 6, false, false, false),
    routing(1, 0, 7, false, false, false),
    routing(1, 0, 3, false, true, false),
    routing(1, 1, 1, false, true, true),
    routing(1, 0, 0, false, true, true),
    routing(0, 0, 0, true, true, true),
];

const fn routing(op2in: u16, op3in: u16, op4in: u16, op1out: bool, op2out: bool, op3out: bool) -> u16 {
    op2in | (op3in << 1) | (op4in << 4) | ((op1out as u16) << 7) | ((op2out as u16) << 8) | ((op3out as u16) << 9)
}

/// Attenuation of |sin| for a 10-bit phase, ignoring the sign half.
#[inline]
pub fn abs_sin_attenuation(phase: u32) -> u32 {
    let mut index = phase & 0x1ff;
    if index & 0x100 != 0 {
        index = !index;
    }
    LOG_SINE[(index & 0xff) as usize] as u32
}

/// Convert a 4.8 attenuation into a linear 13-bit magnitude.
#[inline]
pub fn attenuation_to_volume(attenuation: u32) -> u32 {
    let shift = attenuation >> 8;
    if shift >= 13 {
        return 0;
    }
    ((POW2[(attenuation & 0xff) as usize] as u32) << 2) >> shift
}

/// Signed DT1 adjustment for a 3-bit detune value at the given keycode.
#[inline]
pub fn detune1_adjustment(detune: u8, keycode: u32) -> i32 {
    let value = DETUNE1[(keycode & 0x1f) as usize][(detune & 3) as usize] as i32;
    if detune & 4 != 0 {
        -value
    } else {
        value
    }
}

/// Envelope step for `rate` at position `index` (0-7) of its increment pattern.
#[inline]
pub fn attenuation_increment(rate: u32, index: u32) -> u32 {
    (EG_INCREMENTS[(rate & 0x3f) as usize] >> (4 * (index & 7))) & 0xf
}

/// Phase step for a 13-bit block/key code/fraction value plus a signed 1/64 semitone delta.
///
/// The note field skips every fourth value, so the 16 codes map onto 12 semitones and a
/// delta can carry the result into a neighbouring octave.
pub fn key_code_to_phase_step(block_freq: u32, delta: i32) -> u32 {
    let mut block = ((block_freq >> 10) & 7) as i32;
    let code = (block_freq >> 6) & 0xf;
    let adjusted = code - ((code >> 2) & 3);
    let mut position = ((adjusted << 6) | (block_freq & 0x3f)) as i32 + delta;

    if position < 0 {
        position += 768;
        if block == 0 {
            return PHASE_STEP[0] >> 7;
        }
        block -= 1;
    } else if position >= 768 {
        position -= 768;
        if position >= 768 {
            block += 1;
            position -= 768;
        }
        if block >= 7 {
            return PHASE_STEP[767];
        }
        block += 1;
    }

    PHASE_STEP[position as usize] >> (block ^ 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sine_endpoints() {
        // Peak of the quarter wave is (almost) zero attenuation, the zero crossing is large.
        assert_eq!(LOG_SINE[255], 0);
        assert!(LOG_SINE[0] > 2000);
        for pair in LOG_SINE.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn sine_is_mirrored_within_half_period() {
        for phase in 0..256 {
            assert_eq!(abs_sin_attenuation(phase), abs_sin_attenuation(0x1ff - phase));
        }
    }

    #[test]
    fn volume_curve() {
        assert_eq!(attenuation_to_volume(0), 8168);
        assert!(attenuation_to_volume(256) < attenuation_to_volume(255));
        assert_eq!(attenuation_to_volume(13 << 8), 0);
        assert_eq!(attenuation_to_volume(0xfff), 0);
    }

    #[test]
    fn phase_step_tracks_concert_pitch() {
        // KC 0x4A (A4, octave 4 note 10) at 3.579545 MHz / 64 samples per second
        let sample_rate = 3_579_545.0 / 64.0;
        let step = key_code_to_phase_step(0x4A << 6, 0);
        let hz = step as f64 * sample_rate / (1u32 << 20) as f64;
        assert!((hz - 440.0).abs() < 2.0, "got {hz}");
    }

    #[test]
    fn delta_crosses_octaves() {
        let base = key_code_to_phase_step(0x4A << 6, 0);
        // one octave is 768 fractional steps
        let up = key_code_to_phase_step(0x4A << 6, 768);
        assert!((up as i64 - 2 * base as i64).abs() <= 1);
        let down = key_code_to_phase_step(0x4A << 6, -768);
        assert!((2 * down as i64 - base as i64).abs() <= 1);
        // extremes saturate instead of wrapping
        assert_eq!(key_code_to_phase_step(0x7E << 6, 1500), PHASE_STEP[767]);
        assert_eq!(key_code_to_phase_step(0, -100), PHASE_STEP[0] >> 7);
    }

    #[test]
    fn detune1_sign_bit() {
        assert_eq!(detune1_adjustment(3, 31), 22);
        assert_eq!(detune1_adjustment(7, 31), -22);
        assert_eq!(detune1_adjustment(4, 31), 0);
    }

    #[test]
    fn increment_patterns() {
        assert_eq!(attenuation_increment(0, 0), 0);
        assert_eq!(attenuation_increment(2, 0), 0);
        assert_eq!(attenuation_increment(2, 1), 1);
        assert_eq!(attenuation_increment(63, 5), 8);
    }

    #[test]
    fn algorithm_seven_is_all_carriers() {
        assert_eq!(ALGORITHM_ROUTING[7] & 0x380, 0x380);
        assert_eq!(ALGORITHM_ROUTING[0] & 0x380, 0);
    }
}
