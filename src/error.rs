//! Error types for the packet codec and row-decoding engine.
//!
//! `MalformedValue` from the wire-level table is deliberately absent here: a
//! per-cell decode failure is recorded in-band on the `Cell` (`Cell::Nan`,
//! `Cell::InvalidDate`) rather than raised, per the row parser's contract.

/// A structured MySQL error frame, as produced by [`crate::packet::Packet::as_error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} ({errno}): {message}")]
pub struct ServerError {
    pub errno: u16,
    /// Symbolic name resolved via [`crate::constant::errno_to_symbol`], or the
    /// numeric errno rendered as a string when unknown.
    pub code: String,
    pub sql_state: Option<String>,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A length-coded tag or packet framing field could not be interpreted.
    /// Fatal to the frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// An error frame (`0xFF ...`) was received from the server.
    #[error("server error: {0}")]
    ProtocolError(#[from] ServerError),

    /// A read was attempted past the end of the packet's window.
    #[error("unexpected end of packet")]
    UnexpectedEof,

    /// A column-type byte did not correspond to a known `ColumnType`.
    #[error("invalid column type byte 0x{0:02x}")]
    InvalidColumnType(u8),

    /// An internal invariant was violated — a bug in this crate, not bad
    /// input. Wraps a [`color_eyre::eyre::Report`] carrying a backtrace.
    #[error("internal invariant violated: {0}")]
    LibraryBug(#[from] color_eyre::eyre::Report),
}

pub type Result<T> = std::result::Result<T, Error>;
