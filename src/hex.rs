//! Hex helpers for payload bytes.

use std::fmt::Write;
use thiserror::Error;

/// Error returned by [`decode`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("odd number of hex digits ({0})")]
    OddLength(usize),
    #[error("invalid hex digit at position {0}")]
    InvalidDigit(usize),
}

/// Lower-case hex encoding without separators.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Decode a hex string, accepting either case and an optional `0x` prefix.
pub fn decode(src: &str) -> Result<Vec<u8>, HexError> {
    let src = src.trim();
    let digits = src
        .strip_prefix("0x")
        .or_else(|| src.strip_prefix("0X"))
        .unwrap_or(src)
        .as_bytes();

    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength(digits.len()));
    }

    digits
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            let hi = nibble(pair[0]).ok_or(HexError::InvalidDigit(i * 2))?;
            let lo = nibble(pair[1]).ok_or(HexError::InvalidDigit(i * 2 + 1))?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_lowercase() {
        assert_eq!(encode(&[0xAB, 0xCD, 0x01]), "abcd01");
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn test_decode_mixed_case_and_prefix() {
        assert_eq!(decode("0xABcd").unwrap(), vec![0xAB, 0xCD]);
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode("abc"), Err(HexError::OddLength(3)));
        assert_eq!(decode("zz"), Err(HexError::InvalidDigit(0)));
        assert_eq!(decode("0g"), Err(HexError::InvalidDigit(1)));
    }
}
