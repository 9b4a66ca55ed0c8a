use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::interfaces::error::DecodeError;

/// Parses a `0x`-prefixed hex quantity of any width.
pub fn parse_hex_quantity(field: &'static str, text: &str) -> Result<BigUint, DecodeError> {
    let invalid = || DecodeError::InvalidHex {
        field,
        value: text.to_string(),
    };

    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(invalid)
}

pub fn parse_hex_u64(field: &'static str, text: &str) -> Result<u64, DecodeError> {
    parse_hex_quantity(field, text)?
        .to_u64()
        .ok_or_else(|| DecodeError::OutOfRange {
            field,
            value: text.to_string(),
        })
}

/// A quantity that fits the signed 64-bit columns of the mirror.
pub fn parse_hex_bigint(field: &'static str, text: &str) -> Result<u64, DecodeError> {
    let value = parse_hex_u64(field, text)?;
    if i64::try_from(value).is_err() {
        return Err(DecodeError::OutOfRange {
            field,
            value: text.to_string(),
        });
    }
    Ok(value)
}

pub fn to_hex_quantity(value: u64) -> String {
    format!("{value:#x}")
}
