//! The packet cursor (C2): a windowed view over a shared buffer plus a
//! read/write offset and sequence id, offering typed reads/writes over the
//! primitive (C1) and length-coded (C3) codecs.

use crate::constant;
use crate::error::{Error, Result, ServerError};
use crate::lenenc::{self, LenEncValue};
use crate::primitive;
use crate::temporal;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// MySQL frame header, zero-copy over the first four bytes of a packet's
/// window: `length:u24le | sequence_id:u8`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}

/// A read/write cursor over `buffer[start..end)`. The first four bytes of
/// the window are the frame header; `offset` starts at `start + 4`.
///
/// Invariant: `end - start >= 4` on construction; every successful read or
/// write leaves `offset` in `[start, end]`.
pub struct Packet<'a> {
    buffer: &'a [u8],
    start: usize,
    end: usize,
    offset: usize,
    sequence_id: u8,
}

impl<'a> Packet<'a> {
    pub fn new(sequence_id: u8, buffer: &'a [u8], start: usize, end: usize) -> Result<Self> {
        if end < start || end - start < 4 || end > buffer.len() {
            return Err(Error::MalformedFrame("packet window shorter than header"));
        }
        Ok(Self {
            buffer,
            start,
            end,
            offset: start + 4,
            sequence_id,
        })
    }

    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    pub fn reset(&mut self) {
        self.offset = self.start + 4;
    }

    pub fn length(&self) -> usize {
        self.end - self.start
    }

    pub fn slice(&self) -> &'a [u8] {
        &self.buffer[self.start..self.end]
    }

    pub fn have_more_data(&self) -> bool {
        self.offset < self.end
    }

    fn remaining(&self) -> &'a [u8] {
        &self.buffer[self.offset..self.end]
    }

    fn advance(&mut self, consumed_rest: &[u8]) {
        self.offset = self.end - consumed_rest.len();
    }

    pub fn read_int_1(&mut self) -> Result<u8> {
        let (v, rest) = primitive::read_int_1(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_int_2(&mut self) -> Result<u16> {
        let (v, rest) = primitive::read_int_2(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_int_3(&mut self) -> Result<u32> {
        let (v, rest) = primitive::read_int_3(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_int_4(&mut self) -> Result<u32> {
        let (v, rest) = primitive::read_int_4(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_int_8(&mut self) -> Result<u64> {
        let (v, rest) = primitive::read_int_8(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_float_4(&mut self) -> Result<f32> {
        let (v, rest) = primitive::read_float_4(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_float_8(&mut self) -> Result<f64> {
        let (v, rest) = primitive::read_float_8(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    pub fn read_bytes_fixed(&mut self, len: usize) -> Result<&'a [u8]> {
        let data = self.remaining();
        if data.len() < len {
            return Err(Error::UnexpectedEof);
        }
        let (value, rest) = data.split_at(len);
        self.advance(rest);
        Ok(value)
    }

    pub fn read_null_terminated_bytes(&mut self) -> Result<&'a [u8]> {
        let data = self.remaining();
        let nul = data.iter().position(|&b| b == 0).ok_or(Error::UnexpectedEof)?;
        let (value, rest_with_nul) = data.split_at(nul);
        self.advance(&rest_with_nul[1..]);
        Ok(value)
    }

    /// Reads a length-coded integer/NULL marker. See [`lenenc::decode_len`].
    pub fn read_length_coded_number(&mut self) -> Result<LenEncValue> {
        let (v, rest) = lenenc::decode_len(self.remaining())?;
        self.advance(rest);
        Ok(v)
    }

    /// Reads a length-coded length followed by that many raw bytes. A NULL
    /// length prefix yields `None`.
    pub fn read_length_coded_buffer(&mut self) -> Result<Option<&'a [u8]>> {
        match self.read_length_coded_number()? {
            LenEncValue::Null => Ok(None),
            LenEncValue::Int(n) => Ok(Some(self.read_bytes_fixed(n as usize)?)),
            LenEncValue::BigDecimal(_) => Err(Error::MalformedFrame("non-integer length prefix")),
        }
    }

    /// As [`Self::read_length_coded_buffer`], decoded as text under `encoding`
    /// (`None` encoding is treated as raw/binary: bytes pass through as Latin-1).
    pub fn read_length_coded_string(&mut self, encoding: Option<&'static encoding_rs::Encoding>) -> Result<Option<String>> {
        let Some(bytes) = self.read_length_coded_buffer()? else {
            return Ok(None);
        };
        Ok(Some(decode_with(encoding, bytes)))
    }

    pub fn read_null_terminated_string(&mut self, encoding: Option<&'static encoding_rs::Encoding>) -> Result<String> {
        let bytes = self.read_null_terminated_bytes()?;
        Ok(decode_with(encoding, bytes))
    }

    /// Reads a one-byte length prefix followed by a binary DATE/DATETIME/
    /// TIMESTAMP payload.
    pub fn read_date_time(&mut self) -> Result<temporal::DateTimeValue> {
        let len = self.read_int_1()? as usize;
        let buf = self.read_bytes_fixed(len)?;
        temporal::date_time(buf)
    }

    pub fn read_date_time_string(&mut self, decimals: u8) -> Result<String> {
        let len = self.read_int_1()? as usize;
        let buf = self.read_bytes_fixed(len)?;
        temporal::date_time_string(buf, decimals)
    }

    pub fn read_time_binary(&mut self) -> Result<temporal::MysqlDuration> {
        let len = self.read_int_1()? as usize;
        let buf = self.read_bytes_fixed(len)?;
        temporal::time_binary(buf)
    }

    /// `0xFE` with an overall frame length `< 13` marks EOF.
    pub fn is_eof(&self) -> bool {
        self.buffer.get(self.offset) == Some(&0xFE) && self.length() < 13
    }

    pub fn is_error(&self) -> bool {
        self.buffer.get(self.offset) == Some(&0xFF)
    }

    /// `0xFE` also marks an AuthSwitch packet; disambiguated from EOF the
    /// same way (by overall frame length) at the call site.
    pub fn is_alt(&self) -> bool {
        self.buffer.get(self.offset) == Some(&0xFE)
    }

    pub fn kind(&self) -> &'static str {
        match self.buffer.get(self.offset) {
            Some(0xFE) if self.length() < 13 => "EOF",
            Some(0xFF) => "Error",
            Some(0) => "maybeOK",
            _ => "",
        }
    }

    /// Decodes an error frame: `field_count:u8 | errno:u16le | ['#' |
    /// sql_state:ascii[5]] | message:bytes`. The SQL-state marker is
    /// optional; when the sixth byte isn't `#`, the remainder from the
    /// error code onward is treated as the message.
    pub fn as_error(&mut self, encoding: Option<&'static encoding_rs::Encoding>) -> Result<ServerError> {
        let _field_count = self.read_int_1()?;
        let errno = self.read_int_2()?;
        tracing::debug!(errno, "decoding server error frame");
        let has_sql_state = self.remaining().first() == Some(&b'#');
        let sql_state = if has_sql_state {
            self.read_int_1()?;
            let state = self.read_bytes_fixed(5)?;
            Some(decode_with(encoding, state))
        } else {
            None
        };
        let message_bytes = self.remaining();
        self.advance(&[]);
        let message = decode_with(encoding, message_bytes);
        let code = constant::errno_to_symbol(errno).map(str::to_string).unwrap_or_else(|| errno.to_string());
        Ok(ServerError {
            errno,
            code,
            sql_state,
            message,
        })
    }
}

fn decode_with(encoding: Option<&'static encoding_rs::Encoding>, bytes: &[u8]) -> String {
    match encoding {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// An owned, growable buffer for the write path: a `PacketHeader`-shaped
/// placeholder is reserved up front and patched in by [`PacketBuf::write_header`].
#[derive(Debug, Default)]
pub struct PacketBuf {
    data: Vec<u8>,
}

impl PacketBuf {
    pub fn new() -> Self {
        Self { data: vec![0u8; 4] }
    }

    pub fn write_int_1(&mut self, value: u8) {
        primitive::write_int_1(&mut self.data, value);
    }

    pub fn write_int_2(&mut self, value: u16) {
        primitive::write_int_2(&mut self.data, value);
    }

    pub fn write_int_3(&mut self, value: u32) {
        primitive::write_int_3(&mut self.data, value);
    }

    pub fn write_int_4(&mut self, value: u32) {
        primitive::write_int_4(&mut self.data, value);
    }

    pub fn write_double(&mut self, value: f64) {
        primitive::write_double(&mut self.data, value);
    }

    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_null(&mut self) {
        self.data.push(0xFB);
    }

    pub fn write_string(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    pub fn write_length_coded_number(&mut self, value: &lenenc::LenEncInput) -> Result<()> {
        lenenc::encode_len(&mut self.data, value)
    }

    pub fn write_length_coded_string(&mut self, s: &str) -> Result<()> {
        lenenc::encode_len(&mut self.data, &lenenc::LenEncInput::Int(s.len() as u64))?;
        self.data.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_length_coded_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        lenenc::encode_len(&mut self.data, &lenenc::LenEncInput::Int(bytes.len() as u64))?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Always emits the 11-byte binary MySQL DATETIME form (spec.md §4.2
    /// `writeDate`), regardless of whether `d` carries a sub-second part.
    pub fn write_date(&mut self, d: time::PrimitiveDateTime) {
        temporal::encode_date_time(&mut self.data, d);
    }

    /// Writes `(buffer.len() - 4):u24le | sequence_id:u8` over the reserved
    /// header bytes at offset 0.
    pub fn write_header(&mut self, sequence_id: u8) {
        let header = PacketHeader::encode(self.data.len() - 4, sequence_id);
        self.data[0..3].copy_from_slice(&header.length);
        self.data[3] = header.sequence_id;
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Byte length a future `write_length_coded_number(n)` would consume.
pub fn length_coded_number_length(n: u64) -> usize {
    lenenc::length_coded_number_length(n)
}

/// Byte length a future `write_length_coded_string(s)` would consume under
/// `encoding` (string byte length after re-encoding, plus its length prefix).
pub fn length_coded_string_length(s: &str, encoding: Option<&'static encoding_rs::Encoding>) -> usize {
    let byte_len = match encoding {
        Some(enc) => enc.encode(s).0.len(),
        None => s.len(),
    };
    lenenc::length_coded_string_length(byte_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_starts_after_header() {
        let buf = [0u8; 8];
        let p = Packet::new(0, &buf, 0, 8).unwrap();
        assert_eq!(p.offset, 4);
    }

    #[test]
    fn test_reset_restores_offset() {
        let buf = [0u8, 0, 0, 0, 5, 6, 7, 8];
        let mut p = Packet::new(0, &buf, 0, 8).unwrap();
        p.read_int_1().unwrap();
        p.reset();
        assert_eq!(p.offset, 4);
    }

    #[test]
    fn test_window_shorter_than_header_errors() {
        let buf = [0u8; 2];
        assert!(Packet::new(0, &buf, 0, 2).is_err());
    }

    #[test]
    fn test_have_more_data() {
        let buf = [0u8, 0, 0, 0, 9];
        let mut p = Packet::new(0, &buf, 0, 5).unwrap();
        assert!(p.have_more_data());
        p.read_int_1().unwrap();
        assert!(!p.have_more_data());
    }

    #[test]
    fn test_is_eof_short_frame() {
        let buf = [0u8, 0, 0, 0, 0xFE];
        let p = Packet::new(0, &buf, 0, 5).unwrap();
        assert!(p.is_eof());
    }

    // S7 — error frame.
    #[test]
    fn test_as_error_scenario() {
        let mut body = vec![0u8, 0, 0, 0]; // header placeholder
        body.extend_from_slice(&[0xFF, 0x48, 0x04, b'#', b'2', b'8', b'0', b'0', b'0', b'B', b'a', b'd']);
        let mut p = Packet::new(0, &body, 0, body.len()).unwrap();
        assert!(p.is_error());
        let err = p.as_error(Some(encoding_rs::UTF_8)).unwrap();
        assert_eq!(err.errno, 1096);
        assert_eq!(err.code, "ER_NO_TABLES_USED");
        assert_eq!(err.sql_state.as_deref(), Some("28000"));
        assert_eq!(err.message, "Bad");
    }

    #[test]
    fn test_as_error_without_sql_state_marker() {
        let mut body = vec![0u8, 0, 0, 0];
        body.extend_from_slice(&[0xFF, 0x01, 0x00, b'o', b'o', b'p', b's']);
        let mut p = Packet::new(0, &body, 0, body.len()).unwrap();
        let err = p.as_error(Some(encoding_rs::UTF_8)).unwrap();
        assert_eq!(err.sql_state, None);
        assert_eq!(err.message, "oops");
    }

    #[test]
    fn test_write_header_roundtrip() {
        let mut buf = PacketBuf::new();
        buf.write_int_1(0x16);
        buf.write_string("SELECT 1");
        buf.write_header(0);
        let data = buf.into_vec();
        assert_eq!(&data[0..3], &[9, 0, 0]);
        assert_eq!(data[3], 0);
        assert_eq!(&data[4..], b"\x16SELECT 1");
    }

    #[test]
    fn test_write_date_emits_eleven_byte_form() {
        let date = time::Date::from_calendar_date(2020, time::Month::January, 2).unwrap();
        let t = time::Time::from_hms_milli(3, 4, 5, 1).unwrap();
        let mut buf = PacketBuf::new();
        buf.write_date(time::PrimitiveDateTime::new(date, t));
        buf.write_header(0);
        let data = buf.into_vec();
        assert_eq!(&data[4..], &[0xE4, 0x07, 0x01, 0x02, 0x03, 0x04, 0x05, 0x40, 0x42, 0x0F, 0x00]);
    }

    #[test]
    fn test_length_coded_number_length_matches_writer() {
        for n in [0u64, 250, 251, 0xFFFF, 0x1_0000, u64::MAX] {
            let mut buf = PacketBuf::new();
            buf.write_length_coded_number(&lenenc::LenEncInput::Int(n)).unwrap();
            assert_eq!(length_coded_number_length(n), buf.data.len() - 4);
        }
    }
}
