//! Time codec for persisted timestamps
//!
//! Timestamps are written as a signed decimal number of seconds since the
//! Unix epoch with a fixed nine-digit fraction:
//!
//! ```text
//! 2024-01-01T00:00:00.25Z  →  1704067200.250000000
//! 1969-12-31T23:59:58.5Z   →  -1.500000000
//! ```
//!
//! Read as a decimal number the encoding orders exactly like the timestamps
//! it encodes. [`as_number`] gives that value exactly, scaled to integer
//! nanoseconds. SQLite compares the columns as `REAL`, which near the present
//! day only resolves about a quarter of a microsecond; the database backend
//! widens its numeric bounds and filters the candidates exactly.

use chrono::{DateTime, Utc};
use thiserror::Error;

const NANOS_PER_SEC: u32 = 1_000_000_000;
const FRACTION_DIGITS: usize = 9;

/// Errors produced while decoding an encoded timestamp
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty timestamp")]
    Empty,

    #[error("malformed timestamp {0:?}")]
    Malformed(String),

    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

/// Encode a timestamp into its canonical textual form
pub fn encode(time: &DateTime<Utc>) -> String {
    let secs = time.timestamp();
    // Leap-second representations carry nanos >= 1e9; fold them into the second.
    let nanos = time.timestamp_subsec_nanos().min(NANOS_PER_SEC - 1);

    if secs < 0 && nanos > 0 {
        // -1.5s is stored by chrono as secs = -2, nanos = 0.5e9
        let whole = (secs + 1).unsigned_abs();
        let frac = NANOS_PER_SEC - nanos;
        format!("-{}.{:0width$}", whole, frac, width = FRACTION_DIGITS)
    } else if secs < 0 {
        format!("-{}.{:0width$}", secs.unsigned_abs(), 0, width = FRACTION_DIGITS)
    } else {
        format!("{}.{:0width$}", secs, nanos, width = FRACTION_DIGITS)
    }
}

/// Decode a timestamp from its textual form
///
/// Accepts an optional sign, integral seconds and an optional fraction of at
/// most nine digits. Anything else is rejected rather than approximated.
pub fn decode(bytes: &[u8]) -> Result<DateTime<Utc>, CodecError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CodecError::Malformed(String::from_utf8_lossy(bytes).into_owned()))?;

    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let malformed = || CodecError::Malformed(text.to_string());

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (whole, frac) = match unsigned.split_once('.') {
        Some((_, "")) => return Err(malformed()),
        Some((whole, frac)) => (whole, frac),
        None => (unsigned, ""),
    };

    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || frac.len() > FRACTION_DIGITS
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let whole: i64 = whole
        .parse()
        .map_err(|_| CodecError::OutOfRange(text.to_string()))?;

    let mut nanos: u32 = 0;
    for (i, digit) in frac.bytes().enumerate() {
        nanos += u32::from(digit - b'0') * 10u32.pow((FRACTION_DIGITS - 1 - i) as u32);
    }

    let (secs, nanos) = if negative && nanos > 0 {
        (-whole - 1, NANOS_PER_SEC - nanos)
    } else if negative {
        (-whole, 0)
    } else {
        (whole, nanos)
    };

    DateTime::from_timestamp(secs, nanos).ok_or_else(|| CodecError::OutOfRange(text.to_string()))
}

/// Encode an optional timestamp; unset is written as an empty field
pub fn encode_opt(time: Option<&DateTime<Utc>>) -> String {
    time.map(encode).unwrap_or_default()
}

/// Decode an optional timestamp; an empty field means unset
pub fn decode_opt(bytes: &[u8]) -> Result<Option<DateTime<Utc>>, CodecError> {
    if bytes.is_empty() {
        Ok(None)
    } else {
        decode(bytes).map(Some)
    }
}

/// Numeric value of an encoded timestamp, in nanoseconds
pub fn as_number(time: &DateTime<Utc>) -> i128 {
    let nanos = time.timestamp_subsec_nanos().min(NANOS_PER_SEC - 1);
    i128::from(time.timestamp()) * i128::from(NANOS_PER_SEC) + i128::from(nanos)
}

/// Approximate value of an encoded timestamp as SQLite reads it with `CAST(... AS REAL)`
pub fn as_real(time: &DateTime<Utc>) -> f64 {
    // The canonical encoding is always a valid decimal literal.
    encode(time).parse().unwrap_or_default()
}
