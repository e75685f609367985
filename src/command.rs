//! Byte-level command framing (§6 "External Interfaces") and the response
//! payloads a caller needs to drive a result set to completion: OK, error,
//! and EOF frames, plus COM_QUERY / COM_STMT_PREPARE encoding.
//!
//! The statement lifecycle (caching prepared statements, COM_STMT_EXECUTE
//! parameter binding, cursors) is the enclosing driver's concern, not this
//! crate's.

use crate::constant::{CommandByte, ServerStatusFlags};
use crate::error::{Error, Result};
use crate::lenenc::LenEncValue;
use crate::packet::PacketBuf;
use crate::primitive::{read_int_1, read_int_2};
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Writes a COM_QUERY frame body: `0x03 | sql bytes` (no null terminator).
pub fn write_query(sql: &str) -> PacketBuf {
    let mut buf = PacketBuf::new();
    buf.write_int_1(CommandByte::Query as u8);
    buf.write_string(sql);
    buf
}

/// Writes a COM_STMT_PREPARE frame body: `0x16 | sql bytes`.
///
/// S6 — `write_prepare("SELECT 1")` yields body
/// `[0x16, 'S','E','L','E','C','T',' ','1']`.
pub fn write_prepare(sql: &str) -> PacketBuf {
    let mut buf = PacketBuf::new();
    buf.write_int_1(CommandByte::StmtPrepare as u8);
    buf.write_string(sql);
    buf
}

/// Text-protocol result-set header: just the column count.
#[derive(Debug, Clone, Copy)]
pub struct ResultSetHeader {
    pub column_count: u64,
}

pub fn read_text_resultset_header(payload: &[u8]) -> Result<ResultSetHeader> {
    let (value, _rest) = crate::lenenc::decode_len(payload)?;
    match value {
        LenEncValue::Int(column_count) => Ok(ResultSetHeader { column_count }),
        _ => Err(Error::MalformedFrame("resultset header is not an integer")),
    }
}

/// COM_STMT_PREPARE response, zero-copy over the fixed 11-byte OK body
/// (after the leading `0x00` status byte).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PrepareOk {
    statement_id: U32LE,
    num_columns: U16LE,
    num_params: U16LE,
    _reserved: u8,
    warning_count: U16LE,
}

impl PrepareOk {
    pub fn statement_id(&self) -> u32 {
        self.statement_id.get()
    }

    pub fn num_columns(&self) -> u16 {
        self.num_columns.get()
    }

    pub fn num_params(&self) -> u16 {
        self.num_params.get()
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count.get()
    }
}

pub fn read_prepare_ok(payload: &[u8]) -> Result<&PrepareOk> {
    let (status, data) = read_int_1(payload)?;
    if status != 0x00 {
        return Err(Error::MalformedFrame("prepare response missing OK status byte"));
    }
    if data.len() < 11 {
        return Err(Error::UnexpectedEof);
    }
    PrepareOk::ref_from_bytes(&data[..11]).map_err(|_| Error::MalformedFrame("prepare OK body"))
}

/// A decoded OK packet.
#[derive(Debug, Clone)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
}

pub fn read_ok_payload(payload: &[u8]) -> Result<OkPayload> {
    let (header, data) = read_int_1(payload)?;
    if header != 0x00 && header != 0xFE {
        return Err(Error::MalformedFrame("OK packet missing header byte"));
    }
    let (affected_rows, data) = read_len_int(data)?;
    let (last_insert_id, data) = read_len_int(data)?;
    let (status_flags, data) = read_int_2(data)?;
    let (warnings, _data) = read_int_2(data)?;
    Ok(OkPayload {
        affected_rows,
        last_insert_id,
        status_flags: ServerStatusFlags::from_bits_truncate(status_flags),
        warnings,
    })
}

fn read_len_int(data: &[u8]) -> Result<(u64, &[u8])> {
    match crate::lenenc::decode_len(data)? {
        (LenEncValue::Int(n), rest) => Ok((n, rest)),
        _ => Err(Error::MalformedFrame("expected integer length-coded value")),
    }
}

/// EOF packet: `0xFE | warnings:u16le | status_flags:u16le`, present only
/// when the overall frame is shorter than 9 bytes.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    warnings: U16LE,
    status_flags: U16LE,
}

impl EofPacket {
    pub fn warnings(&self) -> u16 {
        self.warnings.get()
    }

    pub fn status_flags(&self) -> ServerStatusFlags {
        ServerStatusFlags::from_bits_truncate(self.status_flags.get())
    }
}

pub fn read_eof_packet(payload: &[u8]) -> Result<&EofPacket> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::MalformedFrame("EOF packet missing 0xFE marker"));
    }
    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    EofPacket::ref_from_bytes(&data[..4]).map_err(|_| Error::MalformedFrame("EOF packet body"))
}

/// Binary-protocol result-set header (column count, same framing as text).
pub fn read_binary_resultset_header(payload: &[u8]) -> Result<ResultSetHeader> {
    read_text_resultset_header(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    // S6 — COM_STMT_PREPARE.
    #[test]
    fn test_write_prepare_scenario() {
        let mut buf = write_prepare("SELECT 1");
        buf.write_header(0);
        let data = buf.into_vec();
        assert_eq!(&data[0..3], &[9, 0, 0]);
        assert_eq!(data[3], 0);
        assert_eq!(&data[4..], &[0x16, 0x53, 0x45, 0x4C, 0x45, 0x43, 0x54, 0x20, 0x31]);
    }

    #[test]
    fn test_write_query_command_byte() {
        let buf = write_query("SELECT 1");
        assert_eq!(buf.as_slice()[4], CommandByte::Query as u8);
    }

    #[test]
    fn test_read_prepare_ok() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&7u32.to_le_bytes()); // statement_id
        payload.extend_from_slice(&2u16.to_le_bytes()); // num_columns
        payload.extend_from_slice(&1u16.to_le_bytes()); // num_params
        payload.push(0); // reserved
        payload.extend_from_slice(&0u16.to_le_bytes()); // warning_count
        let ok = read_prepare_ok(&payload).unwrap();
        assert_eq!(ok.statement_id(), 7);
        assert_eq!(ok.num_columns(), 2);
        assert_eq!(ok.num_params(), 1);
    }

    #[test]
    fn test_read_eof_packet() {
        let payload = [0xFE, 0x00, 0x00, 0x02, 0x00];
        let eof = read_eof_packet(&payload).unwrap();
        assert_eq!(eof.warnings(), 0);
        assert!(eof.status_flags().contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }

    #[test]
    fn test_read_ok_payload() {
        let mut payload = vec![0x00, 5, 0]; // header, affected_rows=5, last_insert_id=0
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        let ok = read_ok_payload(&payload).unwrap();
        assert_eq!(ok.affected_rows, 5);
        assert!(ok.status_flags.contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }
}
