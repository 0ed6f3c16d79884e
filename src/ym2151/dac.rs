//! YM3012 floating-point DAC format
//!
//! The chip ships each side as a 10-bit signed mantissa with a 3-bit exponent over a
//! serial line. Quantizing through that format is what gives the chip its reduced
//! resolution at high amplitudes.

/// Mantissa bits of a serial word.
const MANTISSA_BITS: u32 = 10;

/// Split a sample into (mantissa, exponent). The exponent ranges 1-7.
fn split(value: i32) -> (i32, u32) {
    let value = value.clamp(i16::MIN as i32, i16::MAX as i32);
    let scan = value ^ (value >> 31);
    let bits = 32 - scan.leading_zeros();
    let exponent = bits.saturating_sub(8).max(1);
    (value >> (exponent - 1), exponent)
}

/// Clamp to 16 bits and round-trip through the DAC format.
pub fn quantize(value: i32) -> i16 {
    let (mantissa, exponent) = split(value);
    (mantissa << (exponent - 1)) as i16
}

/// Encode a sample as the 13 significant bits of a serial word (mantissa in bits 0-9,
/// exponent in bits 10-12).
pub fn encode(value: i32) -> u16 {
    let (mantissa, exponent) = split(value);
    ((mantissa as u16) & ((1 << MANTISSA_BITS) - 1)) | ((exponent as u16) << MANTISSA_BITS)
}

/// Decode a serial word back into a 16-bit sample.
pub fn decode(word: u16) -> i16 {
    let exponent = ((word >> MANTISSA_BITS) & 7).max(1) as u32;
    // sign-extend the 10-bit mantissa
    let mantissa = (((word & 0x3ff) << 6) as i16 >> 6) as i32;
    (mantissa << (exponent - 1)) as i16
}
