//! MySQL Client/Server Protocol
//!
//! Only the part of the protocol used after the connection phase is
//! implemented here: text queries and the prepared statement commands.
//!
//! ## Packets
//!
//! All communication is through a stream of packets. Each packet starts with
//! a 4 bytes header, 3 bytes little endian payload length followed by a
//! sequence id. The sequence id restarts at zero on every new command and is
//! incremented for each packet sent by either side.
//!
//! ```text
//! ┏━━━━━━━━━━━━━━━━┳━━━━━┳━━━━━━━━━┓
//! ┃     Length     ┃ Seq ┃ Payload ┃
//! ┣━━━━━━━━━━━━━━━━╋━━━━━╋━━━━━━━━━┫
//! ┃ u24 (LE)       ┃ u8  ┃  [u8]   ┃
//! ┣━━━━━━━━━━━━━━━━╋━━━━━╋━━━━━━━━━┫
//! ┃ 05 | 00 | 00   ┃ 00  ┃   ..    ┃
//! ┗━━━━━━━━━━━━━━━━┻━━━━━┻━━━━━━━━━┛
//! ```
//!
//! A payload of `0xFFFFFF` bytes or more is split into several packets, the
//! last one being shorter than `0xFFFFFF` (possibly empty).
//!
//! ## Prepared statement flow
//!
//! - `COM_STMT_PREPARE` answered by [`PrepareOk`] followed by parameter and
//!   column [definitions][ColumnDefinition].
//! - `COM_STMT_SEND_LONG_DATA`, not answered.
//! - `COM_STMT_EXECUTE` answered by [`OkPacket`], [`ServerError`] or a
//!   result set: column count, column definitions, [binary rows][BinaryRow]
//!   terminated by an EOF (or OK when `CLIENT_DEPRECATE_EOF` is negotiated).
//! - `COM_STMT_RESET` answered by [`OkPacket`] or [`ServerError`].
//! - `COM_STMT_CLOSE`, not answered.
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/PAGE_PROTOCOL.html>

mod field_type;
mod column;
mod row;

pub mod command;
pub mod response;

mod error;

pub use field_type::{ColumnFlags, FieldType};
pub use column::ColumnDefinition;
pub use row::{BinaryRow, TextRow, value_len};

pub use command::ClientCommand;
pub use response::{EofPacket, OkPacket, PrepareOk, ServerError, ServerStatus};
pub use error::ProtocolError;

/// Largest payload carried by a single packet.
pub const MAX_PAYLOAD: usize = 0xFF_FFFF;
