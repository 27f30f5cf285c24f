//! Value decoding: turn an extracted byte block into a scaled number.

use crate::hex;
use crate::rule::{DecodeRule, Endian};
use serde::Serialize;

/// Result of applying one rule to one advertisement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedField {
    pub available: bool,
    pub value: Option<f64>,
    /// Lower-case hex of the exact bytes the value was read from.
    pub raw_hex: Option<String>,
}

impl DecodedField {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            value: None,
            raw_hex: None,
        }
    }
}

/// Decode the rule's chunk out of `source`.
///
/// Never fails: a missing, empty or too short source yields
/// [`DecodedField::unavailable`], as does a value too large for `f64`.
pub fn decode(source: Option<&[u8]>, rule: &DecodeRule) -> DecodedField {
    let Some(source) = source.filter(|s| !s.is_empty()) else {
        return DecodedField::unavailable();
    };

    let Some(end) = rule.offset().checked_add(rule.length()) else {
        return DecodedField::unavailable();
    };
    let Some(chunk) = source.get(rule.offset()..end).filter(|c| !c.is_empty()) else {
        return DecodedField::unavailable();
    };

    let value = read_integer(chunk, rule.endian(), rule.signed()) * rule.scale();
    if !value.is_finite() {
        return DecodedField::unavailable();
    }

    DecodedField {
        available: true,
        value: Some(value),
        raw_hex: Some(hex::encode(chunk)),
    }
}

/// Two's complement integer of `chunk.len()` bytes.
///
/// Up to 16 bytes are read exactly; longer chunks are accumulated in `f64`.
fn read_integer(chunk: &[u8], endian: Endian, signed: bool) -> f64 {
    let len = chunk.len();
    // i-th byte counting from the most significant one, whatever the wire order.
    let byte = |i: usize| match endian {
        Endian::Big => chunk[i],
        Endian::Little => chunk[len - 1 - i],
    };

    if len <= 16 {
        let unsigned = (0..len).fold(0u128, |acc, i| (acc << 8) | u128::from(byte(i)));
        if !signed {
            return unsigned as f64;
        }
        let bits = len as u32 * 8;
        let shift = 128 - bits;
        // Sign-extend by moving the chunk's top bit to bit 127.
        return (((unsigned << shift) as i128) >> shift) as f64;
    }

    let unsigned = (0..len).fold(0f64, |acc, i| acc * 256.0 + f64::from(byte(i)));
    if signed && byte(0) & 0x80 != 0 {
        unsigned - 2f64.powi(8 * len as i32)
    } else {
        unsigned
    }
}
