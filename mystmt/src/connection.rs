//! MySQL connection.
use bytes::Bytes;
use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    ErrorKind, Result,
    common::{log_warn, span, verbose},
    error::ErrorSlot,
    ext::BytesExt,
    net::PacketStream,
    protocol::{
        ClientCommand, ColumnDefinition, EofPacket, OkPacket, ServerError, ServerStatus, TextRow,
        command::{Ping, Query, Quit, StmtClose},
        response::{OK_HEADER, is_eof, is_err},
    },
    statement::Statement,
    transport::Transport,
};

mod config;

pub use config::{Config, ParseError};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Column limit of a MySQL table, caps preallocation from a server count.
const MAX_COLUMNS: usize = 4096;

/// A single connection in the command phase.
///
/// A connection is created from a transport that already completed the
/// connection phase.
///
/// # Examples
///
/// ```no_run
/// use mystmt::{Config, Connection, PacketStream, Param};
///
/// # fn handshake(io: &mut PacketStream, config: &Config) -> mystmt::Result<()> { Ok(()) }
/// # fn app() -> mystmt::Result<()> {
/// let config = Config::from_env();
/// let mut io = PacketStream::connect(&config)?;
/// handshake(&mut io, &config)?;
///
/// let mut conn = Connection::new(io, &config);
/// let mut stmt = conn.prepare("INSERT INTO t(id, name) VALUES(?, ?)")?;
/// stmt.bind_params(&[Param::long(1), Param::string("Database")])?;
/// stmt.execute(&mut conn)?;
/// assert_eq!(stmt.affected_rows(), 1);
///
/// conn.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Connection<T = PacketStream> {
    io: T,
    id: u64,
    deprecate_eof: bool,
    /// Statement whose unbuffered rows are still on the wire.
    pending: Option<u32>,
    statements: BTreeSet<u32>,
    error: ErrorSlot,
}

impl<T: Transport> Connection<T> {
    /// Create connection from an authenticated transport.
    pub fn new(io: T, config: &Config) -> Self {
        Self {
            io,
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            deprecate_eof: config.deprecate_eof,
            pending: None,
            statements: BTreeSet::new(),
            error: ErrorSlot::default(),
        }
    }

    /// Process unique connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn transport(&self) -> &T {
        &self.io
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.io
    }

    /// Prepare a statement.
    ///
    /// Shorthand for [`Statement::new`] followed by [`Statement::prepare`].
    pub fn prepare(&mut self, sql: &str) -> Result<Statement> {
        let mut stmt = Statement::new();
        stmt.prepare(self, sql)?;
        Ok(stmt)
    }

    /// Run a text query and read its whole result.
    ///
    /// Fails with [`CommandsOutOfSync`][ErrorKind::CommandsOutOfSync] while a
    /// statement has unread rows.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let result = self.query_inner(sql);
        self.error.record(&result);
        result
    }

    fn query_inner(&mut self, sql: &str) -> Result<QueryResult> {
        span!("query");
        self.ensure_idle()?;
        self.send(Query { sql });

        let mut packet = self.recv()?;
        if packet.first() == Some(&OK_HEADER) {
            let ok = OkPacket::decode(packet)?;
            return Ok(QueryResult {
                columns: vec![],
                rows: vec![],
                affected_rows: ok.affected_rows,
                insert_id: ok.last_insert_id,
                warnings: ok.warnings,
                status: ok.status,
            });
        }

        let count = packet.get_lenenc_int("column count")? as usize;
        let columns = self.read_columns(count)?;

        let mut rows = vec![];
        let (warnings, status) = loop {
            let packet = self.recv()?;
            if self.is_end(&packet) {
                break self.decode_end(packet)?;
            }
            rows.push(TextRow::decode(packet, count)?);
        };

        verbose!(rows = rows.len(), "query result read");

        Ok(QueryResult {
            columns,
            affected_rows: rows.len() as u64,
            rows,
            insert_id: 0,
            warnings,
            status,
        })
    }

    /// Check whether the server is alive.
    pub fn ping(&mut self) -> Result<()> {
        let result = self.ensure_idle().and_then(|_| {
            self.send(Ping);
            OkPacket::decode(self.recv()?)?;
            Ok(())
        });
        self.error.record(&result);
        result
    }

    /// Close every statement still open, then the connection.
    pub fn close(mut self) -> Result<()> {
        if !self.statements.is_empty() {
            log_warn!("closing connection with {} open statements", self.statements.len());
        }
        for stmt_id in std::mem::take(&mut self.statements) {
            self.io.send(StmtClose { stmt_id });
        }
        self.io.send(Quit);
        let result = self.io.flush();
        if let Err(_err) = &result {
            #[cfg(feature = "log")]
            log::error!("failed to close connection: {_err}");
        }
        Ok(result?)
    }

    /// Number of statements prepared and not yet closed.
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    /// Error number of the last call, `0` if it succeeded.
    pub fn errno(&self) -> u16 {
        self.error.code()
    }

    /// Error message of the last call, empty if it succeeded.
    pub fn error(&self) -> &str {
        self.error.message()
    }

    /// SQLSTATE of the last call, `00000` if it succeeded.
    pub fn sqlstate(&self) -> &str {
        self.error.sqlstate()
    }
}

// Statement support
impl<T: Transport> Connection<T> {
    pub(crate) fn record<R>(&mut self, result: &Result<R>) {
        self.error.record(result);
    }

    /// Fails if another statement has unread rows.
    pub(crate) fn ensure_idle(&self) -> Result<()> {
        match self.pending {
            Some(_) => Err(ErrorKind::CommandsOutOfSync.into()),
            None => Ok(()),
        }
    }

    pub(crate) fn pending(&self) -> Option<u32> {
        self.pending
    }

    pub(crate) fn set_pending(&mut self, stmt_id: Option<u32>) {
        self.pending = stmt_id;
    }

    pub(crate) fn register(&mut self, stmt_id: u32) {
        self.statements.insert(stmt_id);
    }

    pub(crate) fn unregister(&mut self, stmt_id: u32) {
        self.statements.remove(&stmt_id);
    }

    pub(crate) fn send<C: ClientCommand>(&mut self, command: C) {
        verbose!(command = C::COMMAND, "send");
        self.io.send(command);
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        Ok(self.io.flush()?)
    }

    /// Receive a packet without interpreting ERR packets.
    pub(crate) fn recv_raw(&mut self) -> Result<Bytes> {
        self.io.recv()
    }

    /// Receive a packet, ERR packets are returned as error.
    pub(crate) fn recv(&mut self) -> Result<Bytes> {
        let packet = self.io.recv()?;
        if is_err(&packet) {
            return Err(ServerError::decode(packet)?.into());
        }
        Ok(packet)
    }

    /// Returns `true` if the packet ends a sequence of definitions or rows.
    pub(crate) fn is_end(&self, packet: &[u8]) -> bool {
        is_eof(packet, self.deprecate_eof)
    }

    /// Warnings and status of the packet ending a result set.
    pub(crate) fn decode_end(&self, packet: Bytes) -> Result<(u16, ServerStatus)> {
        if self.deprecate_eof {
            let ok = OkPacket::decode(packet)?;
            Ok((ok.warnings, ok.status))
        } else {
            let eof = EofPacket::decode(packet)?;
            Ok((eof.warnings, eof.status))
        }
    }

    /// Read `count` column definitions and their terminator.
    pub(crate) fn read_columns(&mut self, count: usize) -> Result<Vec<ColumnDefinition>> {
        let mut columns = Vec::with_capacity(count.min(MAX_COLUMNS));
        for _ in 0..count {
            columns.push(ColumnDefinition::decode(self.recv()?)?);
        }
        if count > 0 && !self.deprecate_eof {
            EofPacket::decode(self.recv()?)?;
        }
        Ok(columns)
    }
}

/// Result of a text query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<ColumnDefinition>,
    pub rows: Vec<TextRow>,
    /// Affected rows, or number of rows for a result set.
    pub affected_rows: u64,
    pub insert_id: u64,
    pub warnings: u16,
    pub status: ServerStatus,
}
