//! The row parser compiler (C5): given column definitions and row options,
//! decodes text- and binary-protocol result rows into [`Cell`]s and
//! assembles them into the shape `RowOptions` selects.

use crate::cast::{FieldView, TypeCast};
use crate::col::ColumnDefinition;
use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::lenenc::LenEncValue;
use crate::primitive::{self, AsciiInt, Int64Repr};
use crate::temporal::{self, DateTimeValue, MysqlDuration};
use std::collections::BTreeMap;

/// The dynamic return type for a decoded cell (Design Notes §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int64(i64),
    UInt64(u64),
    Double(f64),
    BigDecimalStr(String),
    Bytes(Vec<u8>),
    Text(String),
    Date(DateTimeValue),
    Time(MysqlDuration),
    Geometry(Option<Geometry>),
    JsonValue(serde_json::Value),
    /// A per-type decoder could not interpret the cell bytes; recorded
    /// in-band per spec.md §7 (`MalformedValue` never throws).
    Nan,
    InvalidDate,
}

/// `nestTables` row-assembly mode (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NestTables {
    #[default]
    Off,
    Nested,
    Flat(String),
}

/// Row decoding configuration (spec.md §3 "Row options").
pub struct RowOptions<'a> {
    pub rows_as_array: bool,
    pub nest_tables: NestTables,
    pub support_big_numbers: bool,
    pub big_number_strings: bool,
    pub date_strings: bool,
    pub decimal_numbers: bool,
    pub type_cast: Option<TypeCast<'a>>,
    pub binary_cast: bool,
}

impl Default for RowOptions<'_> {
    fn default() -> Self {
        Self {
            rows_as_array: false,
            nest_tables: NestTables::Off,
            support_big_numbers: false,
            big_number_strings: false,
            date_strings: false,
            decimal_numbers: false,
            type_cast: None,
            binary_cast: false,
        }
    }
}

/// The assembled row, shaped per `RowOptions`.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutput {
    Array(Vec<Cell>),
    Map(BTreeMap<String, Cell>),
    /// `table -> column -> value`.
    Nested(BTreeMap<String, BTreeMap<String, Cell>>),
    /// `table<sep>column -> value`.
    FlatNested(BTreeMap<String, Cell>),
}

/// NULL bitmap for the binary row protocol. Result-set rows reserve the
/// first two bits (`offset = 2`); statement parameter bitmaps have no
/// reserved bits (`offset = 0`).
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    pub fn for_parameters(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 0 }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        let byte_pos = bit_pos >> 3;
        let bit_offset = bit_pos & 7;
        byte_pos < self.bitmap.len() && (self.bitmap[byte_pos] & (1 << bit_offset)) != 0
    }
}

/// Number of bytes a binary-row null bitmap occupies for `n` columns:
/// `ceil((n+9)/8)` per spec.md §6 (2 reserved bits folded in).
pub fn null_bitmap_len(num_columns: usize) -> usize {
    (num_columns + 9).div_ceil(8)
}

/// The per-column dispatch key a `RowShape` fingerprints on: everything
/// that changes which decoder runs for a column (spec.md §4.5
/// "Compilation discipline").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ColumnDispatchKey {
    column_type: u8,
    unsigned: bool,
    has_encoding: bool,
    decimals: u8,
}

/// A pure fingerprint of `(protocol, column-shape, dispatch-options)`. Two
/// `RowShape`s compare equal iff they would compile to the same decoder;
/// the enclosing driver is expected to cache by this key (spec.md §3
/// Lifecycle) — this crate only guarantees the fingerprint's purity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowShape {
    binary_protocol: bool,
    columns: Vec<ColumnDispatchKey>,
    support_big_numbers: bool,
    big_number_strings: bool,
    date_strings: bool,
    decimal_numbers: bool,
    cast_active: bool,
}

impl RowShape {
    pub fn compute(fields: &[ColumnDefinition], options: &RowOptions, binary_protocol: bool) -> Self {
        let cast_active = options.type_cast.is_some() && (!binary_protocol || options.binary_cast);
        Self {
            binary_protocol,
            columns: fields
                .iter()
                .map(|f| ColumnDispatchKey {
                    column_type: f.column_type as u8,
                    unsigned: f.unsigned(),
                    has_encoding: f.encoding.is_some(),
                    decimals: f.decimals,
                })
                .collect(),
            support_big_numbers: options.support_big_numbers,
            big_number_strings: options.big_number_strings,
            date_strings: options.date_strings,
            decimal_numbers: options.decimal_numbers,
            cast_active,
        }
    }
}

fn int64_cell(repr: Int64Repr) -> Cell {
    match repr {
        Int64Repr::Number(n) => Cell::Int64(n),
        Int64Repr::String(s) => Cell::BigDecimalStr(s),
    }
}

/// As [`int64_cell`], but for an UNSIGNED column: an in-range value stays
/// `Cell::UInt64` instead of collapsing to `Cell::Int64` (the `Number`
/// variant holds `value as i64`, which round-trips losslessly back to `u64`
/// for every magnitude `uint64_number_if_possible` renders as a number).
fn uint64_cell(repr: Int64Repr) -> Cell {
    match repr {
        Int64Repr::Number(n) => Cell::UInt64(n as u64),
        Int64Repr::String(s) => Cell::BigDecimalStr(s),
    }
}

fn decode_text_cell(field: &ColumnDefinition, buf: &[u8], options: &RowOptions) -> Cell {
    use ColumnType::*;
    match field.column_type {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 | MYSQL_TYPE_YEAR => {
            match primitive::int_ascii_small(buf) {
                AsciiInt::Number(n) => Cell::Int64(n),
                AsciiInt::Str(s) => Cell::BigDecimalStr(s),
                AsciiInt::Nan => Cell::Nan,
            }
        }
        MYSQL_TYPE_LONGLONG => {
            if options.big_number_strings {
                Cell::Text(String::from_utf8_lossy(buf).into_owned())
            } else if options.support_big_numbers {
                match primitive::int_ascii(buf) {
                    AsciiInt::Number(n) => Cell::Int64(n),
                    AsciiInt::Str(s) => Cell::BigDecimalStr(s),
                    AsciiInt::Nan => Cell::Nan,
                }
            } else {
                match primitive::int_ascii_small(buf) {
                    AsciiInt::Number(n) => Cell::Int64(n),
                    AsciiInt::Str(s) => Cell::BigDecimalStr(s),
                    AsciiInt::Nan => Cell::Nan,
                }
            }
        }
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => Cell::Double(primitive::float_ascii(buf)),
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
            if options.decimal_numbers {
                Cell::Double(primitive::float_ascii(buf))
            } else {
                Cell::Text(String::from_utf8_lossy(buf).into_owned())
            }
        }
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP => {
            if options.date_strings {
                Cell::Text(String::from_utf8_lossy(buf).into_owned())
            } else {
                match temporal::date_ascii(buf) {
                    Ok(v) => Cell::Date(v),
                    Err(_) => Cell::InvalidDate,
                }
            }
        }
        MYSQL_TYPE_TIME => Cell::Text(String::from_utf8_lossy(buf).into_owned()),
        MYSQL_TYPE_GEOMETRY => Cell::Geometry(crate::geometry::parse(buf).unwrap_or(None)),
        MYSQL_TYPE_JSON => match serde_json::from_slice(buf) {
            Ok(v) => Cell::JsonValue(v),
            Err(_) => Cell::Nan,
        },
        MYSQL_TYPE_NULL => Cell::Null,
        _ => match field.encoding {
            None => Cell::Bytes(buf.to_vec()),
            Some(enc) => Cell::Text(enc.decode(buf).0.into_owned()),
        },
    }
}

/// Decodes one text-protocol row: every cell is a length-coded buffer.
pub fn decode_text_row(data: &[u8], fields: &[ColumnDefinition], options: &RowOptions) -> Result<RowOutput> {
    let mut rest = data;
    let mut cells = Vec::with_capacity(fields.len());
    for field in fields {
        let (value, after_len) = crate::lenenc::decode_len(rest)?;
        let cell = match value {
            LenEncValue::Null => {
                rest = after_len;
                Cell::Null
            }
            LenEncValue::BigDecimal(_) => return Err(Error::MalformedFrame("non-integer cell length")),
            LenEncValue::Int(len) => {
                let len = len as usize;
                if after_len.len() < len {
                    return Err(Error::UnexpectedEof);
                }
                let (buf, after_value) = after_len.split_at(len);
                rest = after_value;
                let default = decode_text_cell(field, buf, options);
                if let Some(cast) = &options.type_cast {
                    let view = FieldView::new(field, Some(buf));
                    cast(&view, default)
                } else {
                    default
                }
            }
        };
        cells.push(cell);
    }
    Ok(assemble(cells, fields, options))
}

fn decode_binary_cell(field: &ColumnDefinition, buf: &[u8], options: &RowOptions) -> Result<(Cell, &[u8])> {
    use ColumnType::*;
    let unsigned = field.unsigned();
    Ok(match field.column_type {
        MYSQL_TYPE_TINY => {
            let (v, rest) = primitive::read_int_1(buf)?;
            (if unsigned { Cell::UInt64(u64::from(v)) } else { Cell::Int64(i64::from(v as i8)) }, rest)
        }
        MYSQL_TYPE_SHORT | MYSQL_TYPE_YEAR => {
            let (v, rest) = primitive::read_int_2(buf)?;
            (if unsigned { Cell::UInt64(u64::from(v)) } else { Cell::Int64(i64::from(v as i16)) }, rest)
        }
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 => {
            let (v, rest) = primitive::read_int_4(buf)?;
            (if unsigned { Cell::UInt64(u64::from(v)) } else { Cell::Int64(i64::from(v as i32)) }, rest)
        }
        MYSQL_TYPE_FLOAT => {
            let (v, rest) = primitive::read_float_4(buf)?;
            (Cell::Double(f64::from(v)), rest)
        }
        MYSQL_TYPE_DOUBLE => {
            let (v, rest) = primitive::read_float_8(buf)?;
            (Cell::Double(v), rest)
        }
        MYSQL_TYPE_LONGLONG => {
            let (v, rest) = primitive::read_int_8(buf)?;
            let cell = if options.big_number_strings {
                if unsigned {
                    Cell::BigDecimalStr(v.to_string())
                } else {
                    Cell::BigDecimalStr((v as i64).to_string())
                }
            } else if unsigned {
                uint64_cell(primitive::uint64_number_if_possible(v))
            } else {
                int64_cell(primitive::int64_number_if_possible(v as i64))
            };
            (cell, rest)
        }
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP => {
            let (tag_len, after_tag) = primitive::read_int_1(buf)?;
            let len = tag_len as usize;
            if after_tag.len() < len {
                return Err(Error::UnexpectedEof);
            }
            let (payload, rest) = after_tag.split_at(len);
            let cell = if options.date_strings {
                Cell::Text(temporal::date_time_string(payload, field.decimals)?)
            } else {
                match temporal::date_time(payload)? {
                    v @ DateTimeValue::Instant(_) => Cell::Date(v),
                    DateTimeValue::Invalid => Cell::InvalidDate,
                }
            };
            (cell, rest)
        }
        MYSQL_TYPE_TIME => {
            let (tag_len, after_tag) = primitive::read_int_1(buf)?;
            let len = tag_len as usize;
            if after_tag.len() < len {
                return Err(Error::UnexpectedEof);
            }
            let (payload, rest) = after_tag.split_at(len);
            (Cell::Text(temporal::time_binary(payload)?.as_string()), rest)
        }
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
            let (cell_buf, rest) = read_lenenc_buf(buf)?;
            let cell = match cell_buf {
                None => Cell::Null,
                Some(b) if options.decimal_numbers => Cell::Double(primitive::float_ascii(b)),
                Some(b) => Cell::Text(String::from_utf8_lossy(b).into_owned()),
            };
            (cell, rest)
        }
        MYSQL_TYPE_GEOMETRY => {
            let (cell_buf, rest) = read_lenenc_buf(buf)?;
            let cell = match cell_buf {
                None => Cell::Null,
                Some(b) => Cell::Geometry(crate::geometry::parse(b).unwrap_or(None)),
            };
            (cell, rest)
        }
        MYSQL_TYPE_JSON => {
            let (cell_buf, rest) = read_lenenc_buf(buf)?;
            let cell = match cell_buf {
                None => Cell::Null,
                Some(b) => serde_json::from_slice(b).map(Cell::JsonValue).unwrap_or(Cell::Nan),
            };
            (cell, rest)
        }
        _ => {
            let (cell_buf, rest) = read_lenenc_buf(buf)?;
            let cell = match cell_buf {
                None => Cell::Null,
                Some(b) => match field.encoding {
                    None => Cell::Bytes(b.to_vec()),
                    Some(enc) => Cell::Text(enc.decode(b).0.into_owned()),
                },
            };
            (cell, rest)
        }
    })
}

fn read_lenenc_buf(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    match crate::lenenc::decode_len(data)? {
        (LenEncValue::Null, rest) => Ok((None, rest)),
        (LenEncValue::Int(n), rest) => {
            let len = n as usize;
            if rest.len() < len {
                return Err(Error::UnexpectedEof);
            }
            let (buf, rest) = rest.split_at(len);
            Ok((Some(buf), rest))
        }
        (LenEncValue::BigDecimal(_), _) => Err(Error::MalformedFrame("non-integer cell length")),
    }
}

/// Decodes one binary-protocol row: `0x00 | nullBitmap | cells...`.
#[tracing::instrument(level = "trace", skip(data, fields, options))]
pub fn decode_binary_row(data: &[u8], fields: &[ColumnDefinition], options: &RowOptions) -> Result<RowOutput> {
    let (status, rest) = data.split_first().ok_or(Error::UnexpectedEof)?;
    if *status != 0 {
        return Err(Error::MalformedFrame("binary row missing status byte"));
    }
    let bitmap_len = null_bitmap_len(fields.len());
    if rest.len() < bitmap_len {
        return Err(Error::UnexpectedEof);
    }
    let (bitmap_bytes, mut rest) = rest.split_at(bitmap_len);
    let bitmap = NullBitmap::for_result_set(bitmap_bytes);

    let mut cells = Vec::with_capacity(fields.len());
    for (idx, field) in fields.iter().enumerate() {
        let cell = if bitmap.is_null(idx) {
            Cell::Null
        } else {
            let (raw_cell, after) = decode_binary_cell(field, rest, options)?;
            rest = after;
            if options.binary_cast {
                if let Some(cast) = &options.type_cast {
                    let view = FieldView::new(field, None);
                    cast(&view, raw_cell)
                } else {
                    raw_cell
                }
            } else {
                raw_cell
            }
        };
        cells.push(cell);
    }
    Ok(assemble(cells, fields, options))
}

fn assemble(cells: Vec<Cell>, fields: &[ColumnDefinition], options: &RowOptions) -> RowOutput {
    if options.rows_as_array {
        return RowOutput::Array(cells);
    }
    match &options.nest_tables {
        NestTables::Off => {
            let mut map = BTreeMap::new();
            for (field, cell) in fields.iter().zip(cells) {
                map.insert(field.name.clone(), cell);
            }
            RowOutput::Map(map)
        }
        NestTables::Nested => {
            let mut outer: BTreeMap<String, BTreeMap<String, Cell>> = BTreeMap::new();
            for (field, cell) in fields.iter().zip(cells) {
                outer.entry(field.table.clone()).or_default().insert(field.name.clone(), cell);
            }
            RowOutput::Nested(outer)
        }
        NestTables::Flat(sep) => {
            let mut map = BTreeMap::new();
            for (field, cell) in fields.iter().zip(cells) {
                map.insert(format!("{}{}{}", field.table, sep, field.name), cell);
            }
            RowOutput::FlatNested(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ColumnFlags;

    fn field(column_type: ColumnType, unsigned: bool, name: &str) -> ColumnDefinition {
        let mut flags = ColumnFlags::empty();
        if unsigned {
            flags |= ColumnFlags::UNSIGNED_FLAG;
        }
        ColumnDefinition {
            catalog: String::new(),
            schema: "db".into(),
            table: "t".into(),
            org_table: "t".into(),
            name: name.into(),
            org_name: name.into(),
            column_type,
            column_length: 10,
            character_set: 45,
            encoding: Some(encoding_rs::UTF_8),
            flags,
            decimals: 0,
            r#type: format!("{column_type:?}"),
            length: 10,
        }
    }

    #[test]
    fn test_null_bitmap_result_set_bit_offset() {
        // S8 — two columns, second NULL, bitmap 0x08 (bit 3 = column 1's bit, offset 2).
        let bitmap = NullBitmap::for_result_set(&[0x08]);
        assert!(!bitmap.is_null(0));
        assert!(bitmap.is_null(1));
    }

    #[test]
    fn test_null_bitmap_parameters_offset_zero() {
        let bitmap = NullBitmap::for_parameters(&[0x01]);
        assert!(bitmap.is_null(0));
    }

    #[test]
    fn test_null_bitmap_len() {
        assert_eq!(null_bitmap_len(2), 2);
        assert_eq!(null_bitmap_len(7), 2);
    }

    // S8 — binary row decode.
    #[test]
    fn test_decode_binary_row_scenario() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_TINY, true, "col0"), field(ColumnType::MYSQL_TYPE_VARCHAR, false, "col1")];
        let options = RowOptions::default();
        let data = [0x00, 0x08, 0x2A];
        let row = decode_binary_row(&data, &fields, &options).unwrap();
        match row {
            RowOutput::Map(m) => {
                assert_eq!(m.get("col0"), Some(&Cell::UInt64(42)));
                assert_eq!(m.get("col1"), Some(&Cell::Null));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn test_decode_text_row_integers_and_strings() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_LONG, false, "n"), field(ColumnType::MYSQL_TYPE_VARCHAR, false, "s")];
        let options = RowOptions::default();
        let mut data = vec![3];
        data.extend_from_slice(b"123");
        data.push(5);
        data.extend_from_slice(b"hello");
        let row = decode_text_row(&data, &fields, &options).unwrap();
        match row {
            RowOutput::Map(m) => {
                assert_eq!(m.get("n"), Some(&Cell::Int64(123)));
                assert_eq!(m.get("s"), Some(&Cell::Text("hello".to_string())));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn test_rows_as_array() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_LONG, false, "n")];
        let options = RowOptions {
            rows_as_array: true,
            ..Default::default()
        };
        let mut data = vec![1];
        data.extend_from_slice(b"7");
        let row = decode_text_row(&data, &fields, &options).unwrap();
        assert_eq!(row, RowOutput::Array(vec![Cell::Int64(7)]));
    }

    // Regression: the text-protocol length-coded tag dispatch must reuse
    // lenenc::decode_len so 0xFF is rejected as MalformedFrame instead of
    // being accepted as the literal one-byte value 255.
    #[test]
    fn test_decode_text_row_rejects_0xff_tag() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_LONG, false, "n")];
        let options = RowOptions::default();
        let data = [0xFFu8];
        assert!(matches!(decode_text_row(&data, &fields, &options), Err(Error::MalformedFrame(_))));
    }

    #[test]
    fn test_row_shape_is_pure() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_LONG, false, "n")];
        let options = RowOptions::default();
        let a = RowShape::compute(&fields, &options, true);
        let b = RowShape::compute(&fields, &options, true);
        assert_eq!(a, b);
    }

    // Regression: a `typeCast` that maps a non-NULL cell to `Cell::Null`
    // must not rewind `rest` past the bytes that cell already consumed.
    #[test]
    fn test_type_cast_to_null_does_not_corrupt_following_columns() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_VARCHAR, false, "a"), field(ColumnType::MYSQL_TYPE_LONG, false, "b")];
        let mut data = vec![2];
        data.extend_from_slice(b"ab");
        data.push(3);
        data.extend_from_slice(b"123");
        let options = RowOptions {
            type_cast: Some(Box::new(|_field, _default| Cell::Null)),
            ..Default::default()
        };
        let row = decode_text_row(&data, &fields, &options).unwrap();
        match row {
            RowOutput::Map(m) => {
                assert_eq!(m.get("a"), Some(&Cell::Null));
                assert_eq!(m.get("b"), Some(&Cell::Null));
            }
            _ => panic!("expected map"),
        }
    }

    // Regression: a column declared MYSQL_TYPE_NULL with non-empty wire
    // bytes (decode_text_cell's always-null arm) must not rewind `rest`.
    #[test]
    fn test_null_typed_column_with_nonempty_bytes_does_not_corrupt_following_columns() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_NULL, false, "a"), field(ColumnType::MYSQL_TYPE_LONG, false, "b")];
        let mut data = vec![2];
        data.extend_from_slice(b"ab");
        data.push(3);
        data.extend_from_slice(b"123");
        let options = RowOptions::default();
        let row = decode_text_row(&data, &fields, &options).unwrap();
        match row {
            RowOutput::Map(m) => {
                assert_eq!(m.get("a"), Some(&Cell::Null));
                assert_eq!(m.get("b"), Some(&Cell::Int64(123)));
            }
            _ => panic!("expected map"),
        }
    }

    // Regression: an UNSIGNED LONGLONG that's exactly representable as an
    // f64 must decode as Cell::UInt64, matching the TINY/SHORT/LONG/INT24
    // arms, not collapse to Cell::Int64.
    #[test]
    fn test_unsigned_longlong_decodes_as_uint64() {
        let fields = vec![field(ColumnType::MYSQL_TYPE_LONGLONG, true, "n")];
        let options = RowOptions::default();
        let mut data = vec![0x00, 0x00, 0x00]; // status byte + 2-byte null bitmap (1 col, none null)
        data.extend_from_slice(&42u64.to_le_bytes());
        let row = decode_binary_row(&data, &fields, &options).unwrap();
        match row {
            RowOutput::Map(m) => assert_eq!(m.get("n"), Some(&Cell::UInt64(42))),
            _ => panic!("expected map"),
        }
    }
}
