//! Linear calibration and user scaling.
//!
//! Calibration coefficients live in the device's `MR_CAL` EEPROM region as
//! consecutive little-endian `f64` pairs: `slope` followed by `offset`.
//! They are applied in the code domain (`raw * slope + offset`), before
//! engineering-unit scaling. A [`CustomScale`] is the user's transform on top
//! of the engineering value.

use tracing::warn;

use crate::endian::read_f64_le;
use crate::error::{Result, UlError};

/// Bytes per stored coefficient pair.
pub const CAL_COEF_SIZE: usize = 16;

/// Device calibration for one `(channel, mode, range)` slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalCoef {
    /// Gain correction
    pub slope: f64,
    /// Offset correction in codes
    pub offset: f64,
}

impl CalCoef {
    /// No correction.
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        offset: 0.0,
    };

    /// Build a coefficient pair.
    pub fn new(slope: f64, offset: f64) -> Self {
        Self { slope, offset }
    }

    /// `value * slope + offset`
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.slope + self.offset
    }

    /// Inverse of [`apply`](Self::apply).
    #[inline]
    pub fn invert(&self, value: f64) -> f64 {
        (value - self.offset) / self.slope
    }
}

impl Default for CalCoef {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// User transform applied to engineering values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomScale {
    /// Gain
    pub slope: f64,
    /// Offset in output units
    pub offset: f64,
}

impl CustomScale {
    /// Leave values unchanged.
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        offset: 0.0,
    };

    /// Build a scale, rejecting a zero or non-finite slope.
    pub fn new(slope: f64, offset: f64) -> Result<Self> {
        if slope == 0.0 || !slope.is_finite() || !offset.is_finite() {
            return Err(UlError::BadConfigVal);
        }
        Ok(Self { slope, offset })
    }

    /// `value * slope + offset`
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.slope + self.offset
    }

    /// Inverse of [`apply`](Self::apply), used for output channels.
    #[inline]
    pub fn invert(&self, value: f64) -> f64 {
        (value - self.offset) / self.slope
    }

    /// True when the scale leaves values unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for CustomScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Decode `count` coefficient pairs from an EEPROM image.
///
/// A slot whose slope is zero or not finite (erased or corrupt memory) is
/// replaced with [`CalCoef::IDENTITY`].
pub fn decode_cal_coefs(bytes: &[u8], count: usize) -> Result<Vec<CalCoef>> {
    if bytes.len() < count * CAL_COEF_SIZE {
        return Err(UlError::BadBufferSize);
    }

    let mut coefs = Vec::with_capacity(count);
    for idx in 0..count {
        let base = idx * CAL_COEF_SIZE;
        let slope = read_f64_le(bytes, base)?;
        let offset = read_f64_le(bytes, base + 8)?;

        if slope == 0.0 || !slope.is_finite() || !offset.is_finite() {
            warn!(index = idx, slope, offset, "Invalid calibration slot, using identity");
            coefs.push(CalCoef::IDENTITY);
        } else {
            coefs.push(CalCoef { slope, offset });
        }
    }
    Ok(coefs)
}

/// Encode coefficient pairs in EEPROM layout.
pub fn encode_cal_coefs(coefs: &[CalCoef]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(coefs.len() * CAL_COEF_SIZE);
    for coef in coefs {
        bytes.extend_from_slice(&coef.slope.to_le_bytes());
        bytes.extend_from_slice(&coef.offset.to_le_bytes());
    }
    bytes
}

/// Sign-extend the low `bits` of `raw`.
#[inline]
pub fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

/// 24-bit two's complement to `i32`.
#[inline]
pub fn i24_to_i32(raw: u32) -> i32 {
    sign_extend(raw & 0x00FF_FFFF, 24)
}

/// Signed value to offset binary, clamped to `[0, 2^bits - 1]`.
#[inline]
pub fn signed_to_unsigned(value: f64, bits: u32) -> f64 {
    let half = (1u64 << (bits - 1)) as f64;
    let max = ((1u64 << bits) - 1) as f64;
    (value + half).clamp(0.0, max)
}

/// Integer form of [`signed_to_unsigned`] for 32-bit samples.
#[inline]
pub fn i32_to_u32(value: i32, bits: u32) -> u32 {
    signed_to_unsigned(f64::from(value), bits) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_cal_coef_apply_invert() {
        let coef = CalCoef::new(1.002, -3.5);
        let raw = 30_000.0;
        assert!(approx_eq!(f64, coef.invert(coef.apply(raw)), raw, epsilon = 1e-9));
        assert_eq!(CalCoef::IDENTITY.apply(42.0), 42.0);
    }

    #[test]
    fn test_custom_scale_rejects_zero_slope() {
        assert_eq!(CustomScale::new(0.0, 1.0), Err(UlError::BadConfigVal));
        assert_eq!(CustomScale::new(f64::NAN, 1.0), Err(UlError::BadConfigVal));
        assert!(CustomScale::new(2.0, 1.0).is_ok());
    }

    #[test]
    fn test_decode_cal_coefs() {
        let coefs = vec![CalCoef::new(1.01, -2.0), CalCoef::new(0.99, 4.0)];
        let bytes = encode_cal_coefs(&coefs);
        assert_eq!(decode_cal_coefs(&bytes, 2).unwrap(), coefs);
    }

    #[test]
    fn test_decode_replaces_erased_slots() {
        // erased EEPROM reads back as all ones (NaN)
        let mut bytes = vec![0xFF; CAL_COEF_SIZE];
        bytes.extend(encode_cal_coefs(&[CalCoef::new(0.0, 1.0)]));
        let coefs = decode_cal_coefs(&bytes, 2).unwrap();
        assert_eq!(coefs, vec![CalCoef::IDENTITY, CalCoef::IDENTITY]);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert_eq!(
            decode_cal_coefs(&[0u8; 20], 2),
            Err(UlError::BadBufferSize)
        );
    }

    #[test]
    fn test_sign_extension() {
        assert_eq!(i24_to_i32(0x7F_FFFF), 8_388_607);
        assert_eq!(i24_to_i32(0x80_0000), -8_388_608);
        assert_eq!(i24_to_i32(0xFF_FFFF), -1);
        // tag byte above bit 23 is ignored
        assert_eq!(i24_to_i32(0xAB00_0001), 1);
        assert_eq!(sign_extend(0x3FFFF, 18), -1);
    }

    #[test]
    fn test_signed_round_trip() {
        for raw in [0u32, 1, 0x7F_FFFF, 0x80_0000, 0x80_0001, 0xFF_FFFF, 0x12_3456] {
            let signed = i24_to_i32(raw);
            let unsigned = i32_to_u32(signed, 24);
            // offset binary is two's complement with the sign bit flipped
            assert_eq!(unsigned, raw ^ 0x80_0000);
        }
    }

    #[test]
    fn test_signed_to_unsigned_clamps() {
        assert_eq!(signed_to_unsigned(-9_000_000.0, 24), 0.0);
        assert_eq!(signed_to_unsigned(9_000_000.0, 24), 16_777_215.0);
    }
}
