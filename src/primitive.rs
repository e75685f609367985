//! Fixed-width little-endian integer/float codec plus the ASCII integer and
//! float parsers used by the text result protocol.
//!
//! Every reader takes the remaining buffer and returns `(value, rest)`; the
//! packet cursor in [`crate::packet`] is the only thing that tracks an
//! absolute offset.

use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{
    F32 as F32LE, F64 as F64LE, U16 as U16LE, U32 as U32LE, U64 as U64LE,
};

pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }
    Ok((data[0], &data[1..]))
}

pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    if data.len() < 2 {
        return Err(Error::UnexpectedEof);
    }
    let value = U16LE::ref_from_bytes(&data[..2])
        .map_err(|_| Error::MalformedFrame("int16"))?
        .get();
    Ok((value, &data[2..]))
}

pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(Error::UnexpectedEof);
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], 0]);
    Ok((value, &data[3..]))
}

pub fn read_int_4(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let value = U32LE::ref_from_bytes(&data[..4])
        .map_err(|_| Error::MalformedFrame("int32"))?
        .get();
    Ok((value, &data[4..]))
}

pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof);
    }
    let value = U64LE::ref_from_bytes(&data[..8])
        .map_err(|_| Error::MalformedFrame("int64"))?
        .get();
    Ok((value, &data[8..]))
}

pub fn read_float_4(data: &[u8]) -> Result<(f32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let value = F32LE::ref_from_bytes(&data[..4])
        .map_err(|_| Error::MalformedFrame("float32"))?
        .get();
    Ok((value, &data[4..]))
}

pub fn read_float_8(data: &[u8]) -> Result<(f64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof);
    }
    let value = F64LE::ref_from_bytes(&data[..8])
        .map_err(|_| Error::MalformedFrame("float64"))?
        .get();
    Ok((value, &data[8..]))
}

pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

pub fn write_int_4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_double(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// The three ways a 64-bit integer read off the wire can be rendered. The
/// *ifPossible* family picks between `Number`/`String` at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Int64Repr {
    Number(i64),
    String(String),
}

/// Exact-double range: integers in `[-2^53, 2^53]` round-trip through `f64`.
const MAX_EXACT_DOUBLE: i128 = 1 << 53;
const MIN_EXACT_DOUBLE: i128 = -(1 << 53);

/// Renders a signed 64-bit value as a `Number` when it's exactly
/// representable as an `f64`, otherwise as a decimal `String`.
pub fn int64_number_if_possible(value: i64) -> Int64Repr {
    let v = i128::from(value);
    if v >= MIN_EXACT_DOUBLE && v <= MAX_EXACT_DOUBLE {
        Int64Repr::Number(value)
    } else {
        Int64Repr::String(value.to_string())
    }
}

/// Renders an unsigned 64-bit value as a `Number` when it's exactly
/// representable as an `f64`, otherwise as a decimal `String`.
pub fn uint64_number_if_possible(value: u64) -> Int64Repr {
    let v = i128::from(value);
    if v <= MAX_EXACT_DOUBLE {
        Int64Repr::Number(value as i64)
    } else {
        Int64Repr::String(value.to_string())
    }
}

/// Parses an ASCII (possibly signed) floating-point literal:
/// `[sign] digits [. digits] [(e|E) [sign] digits]`. Returns `NaN` for an
/// empty slice, matching the text-protocol decoder's contract for absent
/// content (NULL cells are filtered out before this is ever called).
pub fn float_ascii(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return f64::NAN;
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Parses an ASCII signed decimal integer with MySQL's "drop to string
/// outside the exact-double range" rule (spec.md §4.1 `intAscii`).
///
/// - empty input: `NaN`
/// - digit count (excluding a leading sign) `<= 15`: always a number
/// - digit count `== 16` and the first digit is `< 9`: a number
/// - digit count `== 16` and the first digit is `9`: a number only if
///   `round_trips_exactly`, else a string
/// - otherwise: a string, sign included
#[derive(Debug, Clone, PartialEq)]
pub enum AsciiInt {
    Nan,
    Number(i64),
    Str(String),
}

pub fn int_ascii(bytes: &[u8]) -> AsciiInt {
    if bytes.is_empty() {
        return AsciiInt::Nan;
    }
    let s = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => return AsciiInt::Nan,
    };
    let digits = match s.as_bytes().first() {
        Some(b'-') | Some(b'+') => &s[1..],
        _ => s,
    };
    let num_digits = digits.len();

    let is_number = if num_digits <= 15 {
        true
    } else if num_digits == 16 {
        match digits.as_bytes().first() {
            Some(b) if *b < b'9' => true,
            Some(b'9') => digits
                .parse::<f64>()
                .map(|f| format!("{f:.0}") == digits)
                .unwrap_or(false),
            _ => false,
        }
    } else {
        false
    };

    if is_number {
        match s.parse::<i64>() {
            Ok(n) => AsciiInt::Number(n),
            Err(_) => AsciiInt::Str(s.to_string()),
        }
    } else {
        AsciiInt::Str(s.to_string())
    }
}

/// As [`int_ascii`] but without the big-number guard: used both where the
/// caller has already proved the value fits in an `i64` (TINY/SHORT/LONG/
/// INT24, which can never produce more than 11 ASCII digits) and as the
/// default LONGLONG decoder when `supportBigNumbers` is off. In the latter
/// case a digit string can legitimately exceed `i64::MAX` (e.g. an UNSIGNED
/// BIGINT column), so an `i64` overflow falls back to a lossy `f64`
/// conversion rather than `NaN`, matching the "number" rendering
/// [`uint64_number_if_possible`] uses for values outside its exact range.
pub fn int_ascii_small(bytes: &[u8]) -> AsciiInt {
    if bytes.is_empty() {
        return AsciiInt::Nan;
    }
    let Some(s) = std::str::from_utf8(bytes).ok() else {
        return AsciiInt::Nan;
    };
    match s.parse::<i64>() {
        Ok(n) => AsciiInt::Number(n),
        Err(_) => match s.parse::<f64>() {
            Ok(f) => AsciiInt::Number(f as i64),
            Err(_) => AsciiInt::Nan,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_int_2_little_endian() {
        let (v, rest) = read_int_2(&[0x10, 0x27, 0xff]).unwrap();
        assert_eq!(v, 10000);
        assert_eq!(rest, &[0xff]);
    }

    #[test]
    fn test_read_int_truncated_is_eof() {
        assert!(matches!(read_int_4(&[0, 0]), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_float_ascii_empty_is_nan() {
        assert!(float_ascii(&[]).is_nan());
    }

    #[test]
    fn test_float_ascii_parses_exponent() {
        assert_eq!(float_ascii(b"1.5e2"), 150.0);
    }

    // S4 — intAscii at the exact-double boundary.
    #[test]
    fn test_int_ascii_boundary_scenarios() {
        assert_eq!(int_ascii(b"9007199254740992"), AsciiInt::Number(9007199254740992));
        assert_eq!(
            int_ascii(b"9007199254740993"),
            AsciiInt::Str("9007199254740993".to_string())
        );
        assert_eq!(
            int_ascii(b"90071992547409921"),
            AsciiInt::Str("90071992547409921".to_string())
        );
    }

    #[test]
    fn test_int_ascii_empty_is_nan() {
        assert_eq!(int_ascii(b""), AsciiInt::Nan);
    }

    #[test]
    fn test_int_ascii_small_trusts_caller() {
        assert_eq!(int_ascii_small(b"-128"), AsciiInt::Number(-128));
    }

    // Regression: an UNSIGNED BIGINT textual value past i64::MAX must
    // still decode as a (lossy) number, not be discarded as NaN.
    #[test]
    fn test_int_ascii_small_overflow_falls_back_to_lossy_number() {
        match int_ascii_small(b"18446744073709551615") {
            AsciiInt::Number(n) => assert_eq!(n as f64, 18446744073709551615.0f64 as i64 as f64),
            other => panic!("expected lossy number, got {other:?}"),
        }
    }

    #[test]
    fn test_int64_number_if_possible_boundary() {
        assert_eq!(int64_number_if_possible(1 << 53), Int64Repr::Number(1 << 53));
        assert_eq!(
            uint64_number_if_possible((1u64 << 53) + 1),
            Int64Repr::String(((1u64 << 53) + 1).to_string())
        );
    }
}
