//! MySQL wire-protocol packet codec and row-decoding engine.
//!
//! Reads and writes the binary frames exchanged with a MySQL server, decodes
//! column values out of result-set rows in both the text and binary result
//! protocols, and encodes `COM_QUERY`/`COM_STMT_PREPARE`.
//!
//! Connection establishment, TLS, authentication, the statement lifecycle,
//! connection pooling, and the SQL query API live outside this crate; it
//! exposes only the byte-level interfaces those layers need and consumes a
//! character-set table ([`charset`]) and a column-type table ([`constant`]).

pub mod cast;
pub mod charset;
pub mod col;
pub mod command;
pub mod constant;
pub mod error;
pub mod geometry;
pub mod lenenc;
pub mod packet;
pub mod primitive;
pub mod row;
pub mod temporal;

pub use cast::{FieldView, TypeCast};
pub use col::ColumnDefinition;
pub use error::{Error, Result, ServerError};
pub use packet::{Packet, PacketBuf, PacketHeader};
pub use row::{Cell, NestTables, NullBitmap, RowOptions, RowOutput, RowShape};
