//! Binary and text decoding of MySQL DATE/DATETIME/TIMESTAMP/TIME values.
//!
//! Binary DATE/DATETIME/TIMESTAMP layout (spec.md §4.1 `dateTime`):
//! `len in {0,4,7,11}`, `year:u16le, month:u8, day:u8`, then when `len>6`
//! `hour:u8, min:u8, sec:u8`, then when `len>10` `micros:u32le`.
//!
//! `dateTimeString` reads `day` from the same offset (+3) as `dateTime` —
//! see the Open Question resolution in DESIGN.md; the `+4` asymmetry some
//! client libraries carry is not reproduced here.

use crate::error::{Error, Result};
use color_eyre::eyre::eyre;
use time::{Date, Month, PrimitiveDateTime, Time};

/// A decoded temporal value, or `Invalid` when every binary field was zero
/// (MySQL's "zero date") or the layout couldn't be parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum DateTimeValue {
    Invalid,
    Instant(PrimitiveDateTime),
}

fn read_u16le(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn read_u32le(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

struct RawDateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    min: u8,
    sec: u8,
    micros: u32,
}

fn parse_raw(buf: &[u8]) -> Result<Option<RawDateTime>> {
    match buf.len() {
        0 => Ok(None),
        4 | 7 | 11 => {
            let year = read_u16le(buf, 0);
            let month = buf[2];
            let day = buf[3];
            let (hour, min, sec) = if buf.len() > 6 {
                (buf[4], buf[5], buf[6])
            } else {
                (0, 0, 0)
            };
            let micros = if buf.len() > 10 { read_u32le(buf, 7) } else { 0 };
            Ok(Some(RawDateTime {
                year,
                month,
                day,
                hour,
                min,
                sec,
                micros,
            }))
        }
        other => Err(Error::LibraryBug(eyre!("invalid datetime length: {other}"))),
    }
}

/// Decodes a binary DATE/DATETIME/TIMESTAMP payload into an instant, or
/// `Invalid` for the zero-length and all-zero-fields forms.
pub fn date_time(buf: &[u8]) -> Result<DateTimeValue> {
    let Some(raw) = parse_raw(buf)? else {
        return Ok(DateTimeValue::Invalid);
    };
    if raw.year == 0 && raw.month == 0 && raw.day == 0 && raw.hour == 0 && raw.min == 0 && raw.sec == 0 {
        return Ok(DateTimeValue::Invalid);
    }
    let month = Month::try_from(raw.month).map_err(|_| Error::MalformedFrame("month"))?;
    let date = Date::from_calendar_date(i32::from(raw.year), month, raw.day)
        .map_err(|_| Error::MalformedFrame("day"))?;
    let millis = raw.micros / 1000;
    let time = Time::from_hms_milli(raw.hour, raw.min, raw.sec, millis as u16)
        .map_err(|_| Error::MalformedFrame("time"))?;
    Ok(DateTimeValue::Instant(PrimitiveDateTime::new(date, time)))
}

/// Decodes a binary DATE/DATETIME/TIMESTAMP payload into its MySQL textual
/// rendering (`YYYY-MM-DD HH:MM:SS[.ffffff]`, truncated to `decimals`
/// fractional digits).
pub fn date_time_string(buf: &[u8], decimals: u8) -> Result<String> {
    let Some(raw) = parse_raw(buf)? else {
        return Ok(String::new());
    };
    let mut s = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        raw.year, raw.month, raw.day, raw.hour, raw.min, raw.sec
    );
    if decimals > 0 {
        let frac = format!("{:06}", raw.micros);
        let take = usize::from(decimals).min(frac.len());
        s.push('.');
        s.push_str(&frac[..take]);
    }
    Ok(s)
}

/// Encodes `d` as the 11-byte binary MySQL DATETIME form (spec.md §4.2
/// `writeDate`): `year:u16le, month:u8, day:u8, hour:u8, min:u8, sec:u8,
/// micros:u32le`, with `micros = milliseconds * 1000`.
pub fn encode_date_time(out: &mut Vec<u8>, d: PrimitiveDateTime) {
    out.extend_from_slice(&(d.year() as u16).to_le_bytes());
    out.push(u8::from(d.month()));
    out.push(d.day());
    out.push(d.hour());
    out.push(d.minute());
    out.push(d.second());
    let micros = u32::from(d.millisecond()) * 1000;
    out.extend_from_slice(&micros.to_le_bytes());
}

/// Decodes the text-protocol DATE/DATETIME/TIMESTAMP layout:
/// `YYYY-MM-DD[ HH:MM:SS[.ffffff]]` at fixed column offsets.
pub fn date_ascii(buf: &[u8]) -> Result<DateTimeValue> {
    if buf.len() < 10 {
        return Err(Error::MalformedFrame("date string too short"));
    }
    let field = |start: usize, len: usize| -> Result<u32> {
        std::str::from_utf8(&buf[start..start + len])
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or(Error::MalformedFrame("date field"))
    };
    let year = field(0, 4)?;
    let month = field(5, 2)?;
    let day = field(8, 2)?;
    let (hour, min, sec) = if buf.len() >= 19 {
        (field(11, 2)?, field(14, 2)?, field(17, 2)?)
    } else {
        (0, 0, 0)
    };
    let millis = if buf.len() > 20 {
        let frac = &buf[20..];
        let mut padded = [b'0'; 6];
        let take = frac.len().min(6);
        padded[..take].copy_from_slice(&frac[..take]);
        std::str::from_utf8(&padded)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0)
            / 1000
    } else {
        0
    };
    if year == 0 && month == 0 && day == 0 {
        return Ok(DateTimeValue::Invalid);
    }
    let month = Month::try_from(month as u8).map_err(|_| Error::MalformedFrame("month"))?;
    let date = Date::from_calendar_date(year as i32, month, day as u8)
        .map_err(|_| Error::MalformedFrame("day"))?;
    let time = Time::from_hms_milli(hour as u8, min as u8, sec as u8, millis as u16)
        .map_err(|_| Error::MalformedFrame("time"))?;
    Ok(DateTimeValue::Instant(PrimitiveDateTime::new(date, time)))
}

/// A decoded TIME value: a signed offset from midnight, potentially beyond
/// 24 hours (MySQL TIME ranges over `-838:59:59 .. 838:59:59`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MysqlDuration {
    pub negative: bool,
    pub hours: u32,
    pub minutes: u8,
    pub seconds: u8,
    pub micros: u32,
}

impl MysqlDuration {
    /// Total signed milliseconds, with microseconds floored to millisecond
    /// precision (spec.md §4.1 `_time` numeric form).
    pub fn as_millis(&self) -> i64 {
        let magnitude = i64::from(self.hours) * 3_600_000
            + i64::from(self.minutes) * 60_000
            + i64::from(self.seconds) * 1000
            + i64::from(self.micros / 1000);
        if self.negative { -magnitude } else { magnitude }
    }

    /// `"-HH:MM:SS[.ffffff]"` where `HH = days*24 + hour`.
    pub fn as_string(&self) -> String {
        let mut s = String::new();
        if self.negative {
            s.push('-');
        }
        s.push_str(&format!("{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds));
        if self.micros > 0 {
            s.push_str(&format!(".{:06}", self.micros));
        }
        s
    }
}

/// Decodes a binary TIME payload. Layout: `sign:u8, days:u32le, hour:u8,
/// min:u8, sec:u8[, micros:u32le]` in the 8- or 12-byte forms, or
/// `00:00:00` for the zero-length form.
pub fn time_binary(buf: &[u8]) -> Result<MysqlDuration> {
    if buf.is_empty() {
        return Ok(MysqlDuration {
            negative: false,
            hours: 0,
            minutes: 0,
            seconds: 0,
            micros: 0,
        });
    }
    if buf.len() != 8 && buf.len() != 12 {
        return Err(Error::LibraryBug(eyre!("invalid time length: {}", buf.len())));
    }
    let negative = buf[0] != 0;
    let days = read_u32le(buf, 1);
    let hour = buf[5];
    let min = buf[6];
    let sec = buf[7];
    let micros = if buf.len() == 12 { read_u32le(buf, 8) } else { 0 };
    Ok(MysqlDuration {
        negative,
        hours: days * 24 + u32::from(hour),
        minutes: min,
        seconds: sec,
        micros,
    })
}
