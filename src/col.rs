//! Column definition records (spec.md §3 "Column definition").

use crate::charset;
use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::lenenc::{self, LenEncValue};
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Fixed-size tail of a column-definition packet, following the six
/// length-coded string fields (catalog, schema, table, org_table, name,
/// org_name) and the length-coded `0x0c` fixed-length-fields marker.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct ColumnDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

impl ColumnDefinitionTail {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        if data.len() < 12 {
            return Err(Error::UnexpectedEof);
        }
        Self::ref_from_bytes(&data[..12]).map_err(|_| Error::MalformedFrame("column definition tail"))
    }
}

/// A decoded column definition, owned. Carries `r#type`/`length` alongside
/// the canonical `column_type`/`column_length` fields as the spec's legacy
/// aliases — both refer to the same underlying bytes.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub column_type: ColumnType,
    pub column_length: u32,
    pub character_set: u16,
    pub encoding: Option<&'static encoding_rs::Encoding>,
    pub flags: ColumnFlags,
    pub decimals: u8,

    /// Legacy alias for `column_type`, as a string.
    pub r#type: String,
    /// Legacy alias for `column_length`.
    pub length: u32,
}

impl ColumnDefinition {
    /// Parses a column-definition packet body: six length-coded strings,
    /// a length-coded `0x0c` marker, then the 12-byte fixed tail.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (catalog, data) = read_lenenc_string(data)?;
        let (schema, data) = read_lenenc_string(data)?;
        let (table, data) = read_lenenc_string(data)?;
        let (org_table, data) = read_lenenc_string(data)?;
        let (name, data) = read_lenenc_string(data)?;
        let (org_name, data) = read_lenenc_string(data)?;

        let (_fixed_len, data) = lenenc::decode_len(data)?;

        let tail = ColumnDefinitionTail::from_bytes(data)?;
        let character_set = tail.charset.get();
        let column_type =
            ColumnType::from_u8(tail.column_type).ok_or(Error::InvalidColumnType(tail.column_type))?;
        let flags = ColumnFlags::from_bits_truncate(tail.flags.get());

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            column_type,
            column_length: tail.column_length.get(),
            character_set,
            encoding: charset::encoding_for_charset(character_set),
            flags,
            decimals: tail.decimals,
            r#type: format!("{column_type:?}"),
            length: tail.column_length.get(),
        })
    }

    pub fn unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }
}

fn read_lenenc_string(data: &[u8]) -> Result<(String, &[u8])> {
    let (len, rest) = match lenenc::decode_len(data)? {
        (LenEncValue::Int(n), rest) => (n, rest),
        (LenEncValue::Null, _) => return Err(Error::MalformedFrame("column definition string must not be NULL")),
        (LenEncValue::BigDecimal(_), _) => return Err(Error::MalformedFrame("column definition string too long")),
    };
    let len = len as usize;
    if rest.len() < len {
        return Err(Error::UnexpectedEof);
    }
    let (value, rest) = rest.split_at(len);
    Ok((String::from_utf8_lossy(value).into_owned(), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_definition_tail_size() {
        assert_eq!(std::mem::size_of::<ColumnDefinitionTail>(), 12);
    }

    #[test]
    fn test_column_definition_tail_parsing() {
        let data: [u8; 12] = [0x21, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFD, 0x00, 0x00, 0x00, 0x00, 0x00];
        let tail = ColumnDefinitionTail::from_bytes(&data).unwrap();
        assert_eq!(tail.charset.get(), 33);
        assert_eq!(tail.column_length.get(), 255);
        assert_eq!(ColumnType::from_u8(tail.column_type), Some(ColumnType::MYSQL_TYPE_VAR_STRING));
    }

    #[test]
    fn test_column_definition_tail_with_part_key_flag() {
        // regression: PART_KEY_FLAG (0x4000) must survive from_bits_truncate
        let data: [u8; 12] = [0x21, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x00, 0x40, 0x00, 0x00, 0x00];
        let tail = ColumnDefinitionTail::from_bytes(&data).unwrap();
        let flags = ColumnFlags::from_bits_truncate(tail.flags.get());
        assert!(flags.contains(ColumnFlags::PART_KEY_FLAG));
    }

    fn lenenc_str(s: &str) -> Vec<u8> {
        let mut out = vec![s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_column_definition_parse_roundtrip() {
        let mut body = Vec::new();
        for field in ["def", "db", "tbl", "tbl", "col", "col"] {
            body.extend(lenenc_str(field));
        }
        body.push(0x0c);
        body.extend_from_slice(&[0x21, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFD, 0x20, 0x00, 0x00, 0x00, 0x00]);
        let def = ColumnDefinition::parse(&body).unwrap();
        assert_eq!(def.schema, "db");
        assert_eq!(def.name, "col");
        assert_eq!(def.column_type, ColumnType::MYSQL_TYPE_VAR_STRING);
        assert!(def.unsigned());
        assert_eq!(def.length, def.column_length);
    }

    // Regression: column-definition strings must use the real 5-form
    // length-coded table (via lenenc::decode_len), not a hand-rolled
    // decoder that misreads the 0xFE form and mistakes 0xFB/0xFF for
    // literal lengths.
    #[test]
    fn test_read_lenenc_string_uses_full_tag_table() {
        let mut data = vec![0xFC, 0x03, 0x00]; // 2-byte form, length 3
        data.extend_from_slice(b"abc");
        data.extend_from_slice(b"rest");
        let (s, rest) = read_lenenc_string(&data).unwrap();
        assert_eq!(s, "abc");
        assert_eq!(rest, b"rest");
    }

    #[test]
    fn test_read_lenenc_string_rejects_null_tag() {
        assert!(read_lenenc_string(&[0xFB]).is_err());
    }

    #[test]
    fn test_read_lenenc_string_rejects_invalid_tag() {
        assert!(read_lenenc_string(&[0xFF]).is_err());
    }
}
