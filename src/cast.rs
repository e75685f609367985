//! The cast field adapter (C4): the stable, read-only view of a column plus
//! a raw cell buffer that the user's `typeCast` hook is invoked against.

use crate::col::ColumnDefinition;
use crate::constant::{ColumnFlags, ColumnType};
use crate::geometry;
use crate::row::Cell;

/// The read-only properties exposed to a `typeCast` callback for one cell.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    def: &'a ColumnDefinition,
    buffer: Option<&'a [u8]>,
}

impl<'a> FieldView<'a> {
    pub fn new(def: &'a ColumnDefinition, buffer: Option<&'a [u8]>) -> Self {
        Self { def, buffer }
    }

    pub fn db(&self) -> &str {
        &self.def.schema
    }

    pub fn schema(&self) -> &str {
        &self.def.schema
    }

    pub fn table(&self) -> &str {
        &self.def.table
    }

    pub fn org_table(&self) -> &str {
        &self.def.org_table
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn org_name(&self) -> &str {
        &self.def.org_name
    }

    /// Legacy string alias for `column_type`.
    pub fn r#type(&self) -> &str {
        &self.def.r#type
    }

    /// Legacy alias for `column_length`.
    pub fn length(&self) -> u32 {
        self.def.length
    }

    pub fn column_type(&self) -> ColumnType {
        self.def.column_type
    }

    pub fn column_length(&self) -> u32 {
        self.def.column_length
    }

    pub fn character_set(&self) -> u16 {
        self.def.character_set
    }

    pub fn flags(&self) -> ColumnFlags {
        self.def.flags
    }

    pub fn decimals(&self) -> u8 {
        self.def.decimals
    }

    /// `None` when the cell is NULL (forced, regardless of the column's
    /// configured encoding) or the column's charset is binary.
    pub fn encoding(&self) -> Option<&'static encoding_rs::Encoding> {
        if self.buffer.is_none() {
            None
        } else {
            self.def.encoding
        }
    }

    /// The decoded string for this cell (for binary rows, equivalent to
    /// `default_read().to_string()` except NULL maps to `None` here too).
    pub fn string(&self) -> Option<String> {
        let bytes = self.buffer?;
        Some(match self.def.encoding {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => bytes.iter().map(|&b| b as char).collect(),
        })
    }

    pub fn buffer(&self) -> Option<&'a [u8]> {
        self.buffer
    }

    pub fn geometry(&self) -> Option<geometry::Geometry> {
        self.buffer.and_then(|b| geometry::parse(b).ok().flatten())
    }

    /// The value the row parser would have produced absent a `typeCast`
    /// override. See spec.md §4.4 `defaultRead`: NULL cells yield
    /// `Cell::Null`; binary/null-encoding cells yield raw bytes; otherwise
    /// the decoded string.
    pub fn default_read(&self) -> Cell {
        match self.buffer {
            None => Cell::Null,
            Some(bytes) => {
                if self.def.encoding.is_none() {
                    Cell::Bytes(bytes.to_vec())
                } else {
                    Cell::Text(self.string().unwrap_or_default())
                }
            }
        }
    }

    /// Invokes a user `typeCast` hook with this view and its default
    /// decode, returning whatever the hook produces.
    pub fn run(&self, type_cast: &dyn Fn(&FieldView<'a>, Cell) -> Cell) -> Cell {
        let default = self.default_read();
        type_cast(self, default)
    }
}

/// A boxed `typeCast` callback, installed via `RowOptions::type_cast`.
pub type TypeCast<'a> = Box<dyn Fn(&FieldView<'a>, Cell) -> Cell + 'a>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ColumnType;

    fn def() -> ColumnDefinition {
        ColumnDefinition {
            catalog: String::new(),
            schema: "db".into(),
            table: "t".into(),
            org_table: "t".into(),
            name: "c".into(),
            org_name: "c".into(),
            column_type: ColumnType::MYSQL_TYPE_VARCHAR,
            column_length: 10,
            character_set: 45,
            encoding: Some(encoding_rs::UTF_8),
            flags: ColumnFlags::empty(),
            decimals: 0,
            r#type: "VARCHAR".into(),
            length: 10,
        }
    }

    #[test]
    fn test_default_read_null() {
        let d = def();
        let view = FieldView::new(&d, None);
        assert_eq!(view.default_read(), Cell::Null);
        assert_eq!(view.encoding(), None);
    }

    #[test]
    fn test_default_read_text() {
        let d = def();
        let view = FieldView::new(&d, Some(b"hello"));
        assert_eq!(view.default_read(), Cell::Text("hello".to_string()));
    }

    #[test]
    fn test_default_read_binary_charset() {
        let mut d = def();
        d.encoding = None;
        let view = FieldView::new(&d, Some(b"\x01\x02"));
        assert_eq!(view.default_read(), Cell::Bytes(vec![1, 2]));
    }

    #[test]
    fn test_run_invokes_type_cast() {
        let d = def();
        let view = FieldView::new(&d, Some(b"hello"));
        let result = view.run(&|_field, _default| Cell::Text("overridden".to_string()));
        assert_eq!(result, Cell::Text("overridden".to_string()));
    }
}
