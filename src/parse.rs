//! Numeric token conversions.
//!
//! Every conversion consumes the full token as base-10: trailing
//! non-numeric characters fail the parse. Range semantics mirror the
//! kernel text formats these tokens come from: 32-bit-and-narrower
//! destinations treat the type maximum itself as a range sentinel and
//! reject it, while 64-bit destinations accept their full range and only
//! reject genuine overflow.

use thiserror::Error;

#[derive(Error, Debug, Eq, PartialEq)]
pub enum ParseError {
    #[error("not a base-10 number")]
    NotNumeric,
    #[error("value out of range for the destination field")]
    OutOfRange,
    #[error("exit code token must be exactly two characters")]
    ExitCodeWidth,
}

pub fn parse_u64(token: &str) -> Result<u64, ParseError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NotNumeric);
    }
    token.parse().map_err(|_| ParseError::OutOfRange)
}

pub fn parse_i64(token: &str) -> Result<i64, ParseError> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NotNumeric);
    }
    token.parse().map_err(|_| ParseError::OutOfRange)
}

pub fn parse_u32(token: &str) -> Result<u32, ParseError> {
    let value = parse_u64(token)?;
    if value >= u64::from(u32::MAX) {
        return Err(ParseError::OutOfRange);
    }
    Ok(value as u32)
}

pub fn parse_i32(token: &str) -> Result<i32, ParseError> {
    let value = parse_i64(token)?;
    if value >= i64::from(i32::MAX) || value < i64::from(i32::MIN) {
        return Err(ParseError::OutOfRange);
    }
    Ok(value as i32)
}
