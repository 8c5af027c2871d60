//! MySQL Server Responses
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_response_packets.html>
use bytes::{Buf, Bytes};
use std::fmt;

use super::{MAX_PAYLOAD, ProtocolError};
use crate::{
    common::ByteStr,
    ext::{BytesExt, FmtExt},
};

/// Header of an OK packet.
pub const OK_HEADER: u8 = 0x00;
/// Header of an EOF packet, also OK packet ending a result set when
/// `CLIENT_DEPRECATE_EOF` is negotiated.
pub const EOF_HEADER: u8 = 0xFE;
/// Header of an ERR packet.
pub const ERR_HEADER: u8 = 0xFF;

/// `ER_PARSE_ERROR`
pub const ER_PARSE_ERROR: u16 = 1064;
/// `ER_SYNTAX_ERROR`
pub const ER_SYNTAX_ERROR: u16 = 1149;

/// Returns `true` if the packet is an ERR packet.
pub fn is_err(packet: &[u8]) -> bool {
    packet.first() == Some(&ERR_HEADER)
}

/// Returns `true` if the packet terminates a sequence of column
/// definitions or rows.
///
/// A row starting with `0xFE` is a length encoded string of at least
/// 2^24 bytes, so the payload length tells them apart.
pub fn is_eof(packet: &[u8], deprecate_eof: bool) -> bool {
    match packet.first() {
        Some(&EOF_HEADER) if deprecate_eof => packet.len() < MAX_PAYLOAD,
        Some(&EOF_HEADER) => packet.len() < 9,
        _ => false,
    }
}

/// Server status flags.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStatus(pub u16);

impl ServerStatus {
    pub const IN_TRANS: u16 = 0x0001;
    pub const AUTOCOMMIT: u16 = 0x0002;
    pub const MORE_RESULTS_EXISTS: u16 = 0x0008;
    pub const NO_GOOD_INDEX_USED: u16 = 0x0010;
    pub const NO_INDEX_USED: u16 = 0x0020;
    pub const CURSOR_EXISTS: u16 = 0x0040;
    pub const LAST_ROW_SENT: u16 = 0x0080;
    pub const DB_DROPPED: u16 = 0x0100;
    pub const NO_BACKSLASH_ESCAPES: u16 = 0x0200;
    pub const METADATA_CHANGED: u16 = 0x0400;
    pub const QUERY_WAS_SLOW: u16 = 0x0800;
    pub const PS_OUT_PARAMS: u16 = 0x1000;

    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }
}

impl fmt::Debug for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerStatus(0x{:04X})", self.0)
    }
}

/// Signals successful completion of a command.
#[derive(Debug, Default, Clone)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: ServerStatus,
    pub warnings: u16,
    /// Human readable status information.
    pub info: Bytes,
}

impl OkPacket {
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        match body.try_u8("OK packet")? {
            OK_HEADER | EOF_HEADER => { },
            found => return Err(ProtocolError::unexpected(found, "OK packet")),
        }
        let affected_rows = body.get_lenenc_int("OK packet")?;
        let last_insert_id = body.get_lenenc_int("OK packet")?;
        let status = ServerStatus(body.try_u16_le("OK packet")?);
        let warnings = body.try_u16_le("OK packet")?;
        Ok(Self { affected_rows, last_insert_id, status, warnings, info: body })
    }
}

/// Marks the end of column definitions or rows when `CLIENT_DEPRECATE_EOF`
/// is not negotiated.
#[derive(Debug, Default, Clone, Copy)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: ServerStatus,
}

impl EofPacket {
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        match body.try_u8("EOF packet")? {
            EOF_HEADER => { },
            found => return Err(ProtocolError::unexpected(found, "EOF packet")),
        }
        // pre 4.1 servers send a bare header
        if body.is_empty() {
            return Ok(Self::default());
        }
        let warnings = body.try_u16_le("EOF packet")?;
        let status = ServerStatus(body.try_u16_le("EOF packet")?);
        Ok(Self { warnings, status })
    }
}

/// Signals that an error occurred.
#[derive(Clone)]
pub struct ServerError {
    code: u16,
    sqlstate: ByteStr,
    message: ByteStr,
}

impl ServerError {
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        match body.try_u8("ERR packet")? {
            ERR_HEADER => { },
            found => return Err(ProtocolError::unexpected(found, "ERR packet")),
        }
        let code = body.try_u16_le("ERR packet")?;
        let sqlstate = match body.first() {
            Some(b'#') => {
                body.need(6, "ERR packet")?;
                body.advance(1);
                let state = body.split_to(5);
                ByteStr::from_utf8(state).map_err(|_| ProtocolError::malformed("ERR packet"))?
            }
            _ => ByteStr::from_static("HY000"),
        };
        let message = match ByteStr::from_utf8(body.clone()) {
            Ok(ok) => ok,
            Err(_) => ByteStr::from(body.lossy().to_string()),
        };
        Ok(Self { code, sqlstate, message })
    }

    /// Create error with given code and message.
    pub fn new(code: u16, sqlstate: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            sqlstate: ByteStr::from_static(sqlstate),
            message: ByteStr::from(message.into()),
        }
    }

    /// Server error number.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Five characters SQLSTATE.
    pub fn sqlstate(&self) -> &str {
        &self.sqlstate
    }

    /// Human readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the server rejected the sql text.
    pub fn is_syntax(&self) -> bool {
        matches!(self.code, ER_PARSE_ERROR | ER_SYNTAX_ERROR)
    }
}

impl std::error::Error for ServerError { }

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR {} ({}): {}", self.code, self.sqlstate, self.message)
    }
}

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// First packet of a successful `COM_STMT_PREPARE` response.
#[derive(Debug, Clone, Copy)]
pub struct PrepareOk {
    pub statement_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

impl PrepareOk {
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        match body.try_u8("prepare response")? {
            OK_HEADER => { },
            found => return Err(ProtocolError::unexpected(found, "prepare response")),
        }
        let statement_id = body.try_u32_le("prepare response")?;
        let num_columns = body.try_u16_le("prepare response")?;
        let num_params = body.try_u16_le("prepare response")?;
        // reserved filler, warning count may be absent on old servers
        let warnings = match body.remaining() >= 3 {
            true => {
                body.advance(1);
                body.get_u16_le()
            }
            false => 0,
        };
        Ok(Self { statement_id, num_columns, num_params, warnings })
    }
}
