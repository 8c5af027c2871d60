//! MySQL Client Commands
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_command_phase.html>
use bytes::{BufMut, BytesMut};

use crate::encode::Encoded;

/// Write a client command payload to `buf`.
///
/// Only the payload is written, packet headers are the transport's business.
pub fn write<C: ClientCommand>(command: C, buf: &mut BytesMut) {
    let size_hint = 1 + command.size_hint();
    buf.reserve(size_hint);

    let offset = buf.len();
    buf.put_u8(C::COMMAND);
    command.encode(&mut *buf);

    assert_eq!(
        buf.len() - offset,
        size_hint,
        "Client command body size not equal to size hint"
    );
}

/// A type which can be encoded into a mysql client command.
pub trait ClientCommand {
    /// Command byte.
    const COMMAND: u8;

    /// Size of the body, without the command byte.
    fn size_hint(&self) -> usize;

    /// Write the body of the command.
    ///
    /// The length of body written must be equal to the
    /// length returned by [`size_hint`][ClientCommand::size_hint].
    fn encode(self, buf: impl BufMut);
}

/// Tells the server that the client wants to close the connection.
pub struct Quit;

impl ClientCommand for Quit {
    const COMMAND: u8 = 0x01;

    fn size_hint(&self) -> usize { 0 }

    fn encode(self, _: impl BufMut) { }
}

/// Send a text-based query that is executed immediately.
pub struct Query<'a> {
    /// The query string itself.
    pub sql: &'a str,
}

impl ClientCommand for Query<'_> {
    const COMMAND: u8 = 0x03;

    fn size_hint(&self) -> usize {
        self.sql.len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.sql.as_bytes());
    }
}

/// Check whether the server is alive.
pub struct Ping;

impl ClientCommand for Ping {
    const COMMAND: u8 = 0x0E;

    fn size_hint(&self) -> usize { 0 }

    fn encode(self, _: impl BufMut) { }
}

/// Creates a prepared statement from the passed query string.
///
/// The text is sent as is, the server is the only one judging it.
pub struct StmtPrepare<'a> {
    pub sql: &'a str,
}

impl ClientCommand for StmtPrepare<'_> {
    const COMMAND: u8 = 0x16;

    fn size_hint(&self) -> usize {
        self.sql.len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.sql.as_bytes());
    }
}

/// Asks the server to execute a prepared statement.
pub struct StmtExecute<'a> {
    /// Statement id returned by the prepare response.
    pub stmt_id: u32,
    /// Cursor flags, zero for no cursor.
    pub flags: u8,
    /// Encoded parameters, one per statement parameter.
    pub params: &'a [Encoded],
    /// Whether the parameter types follow the null bitmap.
    ///
    /// Types are sent on the first execute and after every rebind.
    pub send_types: bool,
}

impl StmtExecute<'_> {
    fn null_bitmap_len(&self) -> usize {
        self.params.len().div_ceil(8)
    }
}

impl ClientCommand for StmtExecute<'_> {
    const COMMAND: u8 = 0x17;

    fn size_hint(&self) -> usize {
        // stmt_id, flags, iteration_count
        let mut size = 4 + 1 + 4;
        if !self.params.is_empty() {
            size += self.null_bitmap_len() + 1;
            if self.send_types {
                size += 2 * self.params.len();
            }
            size += self.params.iter().map(Encoded::wire_len).sum::<usize>();
        }
        size
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32_le(self.stmt_id);
        buf.put_u8(self.flags);
        // iteration_count, always 1
        buf.put_u32_le(1);

        if self.params.is_empty() {
            return;
        }

        let mut bitmap = vec![0u8; self.null_bitmap_len()];
        for (i, param) in self.params.iter().enumerate() {
            if param.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        buf.put_slice(&bitmap);

        buf.put_u8(self.send_types as u8);
        if self.send_types {
            for param in self.params {
                buf.put_u8(param.field_type().tag());
                buf.put_u8(if param.is_unsigned() { 0x80 } else { 0 });
            }
        }

        for param in self.params {
            param.write_value(&mut buf);
        }
    }
}

/// Sends the data for a parameter, appending to what was sent before.
///
/// The server does not answer, faults are reported by the next execute.
pub struct StmtSendLongData<'a> {
    pub stmt_id: u32,
    pub param_id: u16,
    pub data: &'a [u8],
}

impl ClientCommand for StmtSendLongData<'_> {
    const COMMAND: u8 = 0x18;

    fn size_hint(&self) -> usize {
        4 + 2 + self.data.len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32_le(self.stmt_id);
        buf.put_u16_le(self.param_id);
        buf.put_slice(self.data);
    }
}

/// Deallocates a prepared statement. The server does not answer.
pub struct StmtClose {
    pub stmt_id: u32,
}

impl ClientCommand for StmtClose {
    const COMMAND: u8 = 0x19;

    fn size_hint(&self) -> usize { 4 }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32_le(self.stmt_id);
    }
}

/// Resets the long data of a prepared statement and closes its cursor.
pub struct StmtReset {
    pub stmt_id: u32,
}

impl ClientCommand for StmtReset {
    const COMMAND: u8 = 0x1A;

    fn size_hint(&self) -> usize { 4 }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u32_le(self.stmt_id);
    }
}
