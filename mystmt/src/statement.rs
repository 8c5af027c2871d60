//! Prepared statement handle.
use bytes::Buf;

use crate::{
    Connection, ErrorKind, Result,
    bind::{ArityMismatch, Out, Param},
    binder::Binder,
    common::{log_warn, span, verbose},
    cursor::{Cursor, End, RowOffset, Step},
    decode,
    error::ErrorSlot,
    ext::BytesExt,
    protocol::{
        ColumnDefinition, OkPacket, PrepareOk, ProtocolError, ServerError, ServerStatus,
        command::{StmtClose, StmtExecute, StmtPrepare, StmtReset, StmtSendLongData},
        response::{OK_HEADER, is_err},
    },
    sql,
    transport::Transport,
};

/// Execution state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Unprepared,
    Prepared,
    Executed,
    Fetching,
    Exhausted,
    Closed,
}

/// Input of the state transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Prepare,
    Execute,
    /// A row was fetched.
    Row,
    /// End of data was reached.
    End,
    /// Position changed in a stored result.
    Seek,
    /// Reset or free result.
    Reset,
    Close,
}

impl State {
    /// State transition table.
    pub(crate) fn on(self, event: Event) -> Result<State, ErrorKind> {
        use {Event as E, State as S};
        match (self, event) {
            (_, E::Prepare) => Ok(S::Prepared),
            (_, E::Close) => Ok(S::Closed),
            (S::Unprepared | S::Closed, _) => Err(ErrorKind::NotPrepared),
            (_, E::Execute) => Ok(S::Executed),
            (_, E::Reset) => Ok(S::Prepared),
            (S::Executed | S::Fetching, E::Row) => Ok(S::Fetching),
            (S::Executed | S::Fetching, E::End) => Ok(S::Exhausted),
            (S::Executed | S::Fetching | S::Exhausted, E::Seek) => Ok(S::Fetching),
            (S::Prepared | S::Exhausted, E::Row | E::End) | (S::Prepared, E::Seek) => {
                Err(ErrorKind::CommandsOutOfSync)
            }
        }
    }

    /// Returns `true` if the statement holds a server side id.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Unprepared | Self::Closed)
    }
}

/// Statement attribute, see [`Statement::set_attr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtAttr {
    /// Compute [`max_length`][ColumnDefinition::max_length] of every column
    /// when the result is stored.
    UpdateMaxLength(bool),
}

/// Outcome of a successful [`Statement::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// A row was written to the output bindings.
    Row,
    /// There are no more rows.
    EndOfData,
}

/// A prepared statement.
///
/// A statement is bound to the connection it is prepared on, every call
/// taking a connection must be given that same connection.
///
/// Calls fail with [`NotPrepared`][ErrorKind::NotPrepared] before
/// [`prepare`][Statement::prepare] and after [`close`][Statement::close].
#[derive(Debug, Default)]
pub struct Statement {
    conn_id: u64,
    stmt_id: u32,
    state: State,
    params: Vec<ColumnDefinition>,
    columns: Vec<ColumnDefinition>,
    binder: Binder,
    results_bound: bool,
    cursor: Cursor,
    affected_rows: u64,
    insert_id: u64,
    warnings: u16,
    status: ServerStatus,
    update_max_length: bool,
    error: ErrorSlot,
}

impl Statement {
    /// Create an unprepared statement.
    pub fn new() -> Statement {
        Statement::default()
    }

    /// Record the result in the statement and the connection error slot.
    fn track<T: Transport, R>(&mut self, conn: &mut Connection<T>, result: Result<R>) -> Result<R> {
        self.error.record(&result);
        conn.record(&result);
        result
    }

    fn track_local<R>(&mut self, result: Result<R>) -> Result<R> {
        self.error.record(&result);
        result
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state.is_live() {
            true => Ok(()),
            false => Err(ErrorKind::NotPrepared.into()),
        }
    }

    fn ensure_conn<T: Transport>(&self, conn: &Connection<T>) -> Result<()> {
        self.ensure_live()?;
        match conn.id() == self.conn_id {
            true => Ok(()),
            false => Err(ErrorKind::NotPrepared.into()),
        }
    }

    fn transition(&mut self, event: Event) -> Result<()> {
        self.state = self.state.on(event)?;
        Ok(())
    }

    /// Discard unread rows of this statement still on the wire.
    fn drain<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        if !self.cursor.is_pending() || conn.pending() != Some(self.stmt_id) {
            return Ok(());
        }
        let (_count, end) = self.cursor.drain(conn, &self.columns)?;
        log_warn!("discarded {_count} unread rows of statement {}", self.stmt_id);
        self.set_end(end);
        Ok(())
    }

    fn set_end(&mut self, end: End) {
        self.warnings = end.warnings;
        self.status = end.status;
    }

    // Lifecycle

    /// Prepare `sql` on the connection.
    ///
    /// A statement already prepared is closed first. A statement still
    /// open on another connection fails with
    /// [`NotPrepared`][ErrorKind::NotPrepared], close it there first. Fails with
    /// [`Syntax`][ErrorKind::Syntax] when the server rejects the text, and
    /// with [`MultiStatementNotAllowed`][ErrorKind::MultiStatementNotAllowed]
    /// when the text holds more than one statement.
    pub fn prepare<T: Transport>(&mut self, conn: &mut Connection<T>, sql: &str) -> Result<()> {
        let result = self.prepare_inner(conn, sql);
        self.track(conn, result)
    }

    fn prepare_inner<T: Transport>(&mut self, conn: &mut Connection<T>, sql: &str) -> Result<()> {
        span!("prepare");

        if sql::is_multi_statement(sql) {
            return Err(ErrorKind::MultiStatementNotAllowed.into());
        }
        if self.state.is_live() {
            self.ensure_conn(conn)?;
            self.close_inner(conn)?;
        }
        conn.ensure_idle()?;

        conn.send(StmtPrepare { sql });
        let packet = conn.recv_raw()?;
        if is_err(&packet) {
            let err = ServerError::decode(packet)?;
            return Err(match err.is_syntax() {
                true => ErrorKind::Syntax(err).into(),
                false => err.into(),
            });
        }

        let ok = PrepareOk::decode(packet)?;
        let params = conn.read_columns(ok.num_params as usize)?;
        let columns = conn.read_columns(ok.num_columns as usize)?;

        verbose!(
            stmt_id = ok.statement_id,
            params = ok.num_params,
            columns = ok.num_columns,
            "statement prepared"
        );

        *self = Statement {
            conn_id: conn.id(),
            stmt_id: ok.statement_id,
            state: self.state.on(Event::Prepare)?,
            params,
            columns,
            warnings: ok.warnings,
            update_max_length: self.update_max_length,
            ..Statement::default()
        };
        conn.register(ok.statement_id);
        Ok(())
    }

    /// Bind parameters.
    ///
    /// The number of parameters must match [`param_count`][1], an empty
    /// slice is accepted for a statement without parameters. Values are
    /// copied, `params` is not borrowed after this call.
    ///
    /// [1]: Statement::param_count
    pub fn bind_params(&mut self, params: &[Param]) -> Result<()> {
        let result = self.ensure_live().and_then(|_| self.binder.bind(params, self.params.len()));
        self.track_local(result)
    }

    /// Send a chunk of a parameter value.
    ///
    /// Chunks are appended to the value the bound parameter holds, and
    /// replace it on the next [`execute`][Statement::execute]. Only variable
    /// length parameters accept long data.
    pub fn send_long_data<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        index: usize,
        data: &[u8],
    ) -> Result<()> {
        let result = self.send_long_data_inner(conn, index, data);
        self.track(conn, result)
    }

    fn send_long_data_inner<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        index: usize,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_conn(conn)?;
        conn.ensure_idle()?;

        let base = self.binder.long_data(index, self.params.len())?;
        let param_id = index as u16;
        if let Some(base) = base {
            conn.send(StmtSendLongData { stmt_id: self.stmt_id, param_id, data: &base });
        }
        conn.send(StmtSendLongData { stmt_id: self.stmt_id, param_id, data });
        conn.flush()
    }

    /// Execute the statement with the bound parameters.
    ///
    /// Rows left from a previous execute are discarded. When the statement
    /// produces a result set, rows are read by [`fetch`][Statement::fetch]
    /// or [`store_result`][Statement::store_result], until then no other
    /// command can be issued on the connection.
    pub fn execute<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        let result = self.execute_inner(conn);
        self.track(conn, result)
    }

    fn execute_inner<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        span!("execute", stmt_id = self.stmt_id);

        self.ensure_conn(conn)?;
        if !self.binder.is_bound(self.params.len()) {
            return Err(ErrorKind::ParamsNotBound.into());
        }
        self.drain(conn)?;
        conn.ensure_idle()?;

        self.cursor.reset();
        self.affected_rows = 0;
        self.insert_id = 0;

        let (params, send_types) = self.binder.execute_params();
        conn.send(StmtExecute { stmt_id: self.stmt_id, flags: 0, params, send_types });

        let mut packet = match conn.recv() {
            Ok(packet) => packet,
            Err(err) => {
                if !err.is_transport() {
                    self.binder.clear_long_data();
                }
                return Err(err);
            }
        };
        self.binder.executed();

        if packet.first() == Some(&OK_HEADER) {
            let ok = OkPacket::decode(packet)?;
            self.affected_rows = ok.affected_rows;
            self.insert_id = ok.last_insert_id;
            self.warnings = ok.warnings;
            self.status = ok.status;
            verbose!(affected_rows = ok.affected_rows, "statement executed");
            return self.transition(Event::Execute);
        }

        let count = usize::try_from(packet.get_lenenc_int("column count")?)
            .map_err(|_| ProtocolError::malformed("column count"))?;
        if packet.has_remaining() {
            return Err(ProtocolError::malformed("column count").into());
        }
        // metadata is resent on every execute, max length starts over
        self.columns = conn.read_columns(count)?;

        self.cursor.start();
        conn.set_pending(Some(self.stmt_id));
        verbose!(columns = count, "result set announced");
        self.transition(Event::Execute)
    }

    /// Check output bindings against the result columns.
    ///
    /// Fails with [`ArityMismatch`][ErrorKind::ArityMismatch] when the
    /// number of bindings differs from [`field_count`][1], and with
    /// [`UnsupportedConversion`][ErrorKind::UnsupportedConversion] when a
    /// column can not be written into its binding. May be called again
    /// between fetches.
    ///
    /// [1]: Statement::field_count
    pub fn bind_results(&mut self, outs: &[Out]) -> Result<()> {
        let result = self.ensure_live().and_then(|_| self.check_outs(outs));
        self.results_bound = result.is_ok();
        self.track_local(result)
    }

    fn check_outs(&self, outs: &[Out]) -> Result<()> {
        if outs.len() != self.columns.len() {
            return Err(ArityMismatch::columns(self.columns.len(), outs.len()).into());
        }
        for (i, (column, out)) in self.columns.iter().zip(outs).enumerate() {
            decode::check(column, out.field_type()).map_err(|e| e.at(i))?;
        }
        Ok(())
    }

    /// Fetch the next row into `outs`.
    ///
    /// `outs` holds one binding per column, or is empty to skip the values.
    /// Returns [`Fetch::EndOfData`] once when the rows are exhausted,
    /// fetching again fails with
    /// [`CommandsOutOfSync`][ErrorKind::CommandsOutOfSync] unless the
    /// position is moved in a stored result.
    pub fn fetch<T: Transport>(&mut self, conn: &mut Connection<T>, outs: &mut [Out]) -> Result<Fetch> {
        let result = self.fetch_inner(conn, outs);
        self.track(conn, result)
    }

    fn fetch_inner<T: Transport>(&mut self, conn: &mut Connection<T>, outs: &mut [Out]) -> Result<Fetch> {
        self.ensure_conn(conn)?;
        if self.state == State::Prepared {
            return Err(ErrorKind::CommandsOutOfSync.into());
        }
        if !self.cursor.has_result() {
            return Err(ErrorKind::NoResultSet.into());
        }
        if self.state == State::Exhausted {
            return Err(ErrorKind::CommandsOutOfSync.into());
        }
        if !outs.is_empty() {
            self.check_outs(outs)?;
        }

        match self.cursor.next(conn, &self.columns)? {
            Step::Row => {
                self.transition(Event::Row)?;
                self.write_current(outs)?;
                Ok(Fetch::Row)
            }
            Step::End(end) => {
                if let Some(end) = end {
                    self.set_end(end);
                }
                self.transition(Event::End)?;
                Ok(Fetch::EndOfData)
            }
        }
    }

    fn write_current(&self, outs: &mut [Out]) -> Result<()> {
        let Some(row) = self.cursor.current() else {
            return Err(ErrorKind::NoCurrentRow.into());
        };
        for (i, out) in outs.iter_mut().enumerate() {
            let value = row.get(i).flatten().map(|v| &v[..]);
            decode::write(&self.columns[i], value, out, 0)?;
        }
        Ok(())
    }

    /// Read the whole result set, releasing the connection.
    ///
    /// Enables [`data_seek`][Statement::data_seek],
    /// [`row_seek`][Statement::row_seek] and
    /// [`num_rows`][Statement::num_rows]. Does nothing for a statement
    /// without result set.
    pub fn store_result<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        let result = self.store_result_inner(conn);
        self.track(conn, result)
    }

    fn store_result_inner<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        span!("store_result", stmt_id = self.stmt_id);

        self.ensure_conn(conn)?;
        if self.columns.is_empty() {
            return Ok(());
        }
        if !self.cursor.is_pending() {
            return Err(ErrorKind::CommandsOutOfSync.into());
        }

        let end = self.cursor.store(conn, &self.columns)?;
        self.set_end(end);
        self.affected_rows = self.cursor.num_rows();

        if self.update_max_length {
            for (i, column) in self.columns.iter_mut().enumerate() {
                let mut max = 0;
                for row in self.cursor.stored() {
                    if let Some(Some(value)) = row.get(i) {
                        max = max.max(decode::display_len(column, value)?);
                    }
                }
                column.set_max_length(max as u64);
            }
        }

        verbose!(rows = self.affected_rows, "result stored");
        Ok(())
    }

    fn ensure_stored(&self) -> Result<()> {
        self.ensure_live()?;
        match self.cursor.is_stored() {
            true => Ok(()),
            false => Err(ErrorKind::CommandsOutOfSync.into()),
        }
    }

    /// Move to the `n`th row of a stored result, the next fetch returns it.
    pub fn data_seek(&mut self, n: u64) -> Result<()> {
        let result = self.ensure_stored().and_then(|_| {
            self.transition(Event::Seek)?;
            self.cursor.seek(n);
            Ok(())
        });
        self.track_local(result)
    }

    /// Move to a position returned by [`row_tell`][Statement::row_tell],
    /// returns the previous position.
    pub fn row_seek(&mut self, offset: RowOffset) -> Result<RowOffset> {
        let result = self.ensure_stored().and_then(|_| {
            let prev = self.cursor.tell();
            self.transition(Event::Seek)?;
            self.cursor.seek(offset.0 as u64);
            Ok(prev)
        });
        self.track_local(result)
    }

    /// Position of the next row in a stored result.
    pub fn row_tell(&mut self) -> Result<RowOffset> {
        let result = self.ensure_stored().map(|_| self.cursor.tell());
        self.track_local(result)
    }

    /// Write one column of the current row into `out`, skipping the first
    /// `offset` bytes of the value.
    ///
    /// Used to read a value in pieces after a fetch truncated it.
    pub fn fetch_column(&mut self, out: &mut Out, column: usize, offset: usize) -> Result<()> {
        let result = self.fetch_column_inner(out, column, offset);
        self.track_local(result)
    }

    fn fetch_column_inner(&self, out: &mut Out, column: usize, offset: usize) -> Result<()> {
        self.ensure_live()?;
        let Some(row) = self.cursor.current() else {
            return Err(ErrorKind::NoCurrentRow.into());
        };
        let Some(def) = self.columns.get(column) else {
            return Err(ErrorKind::InvalidColumnIndex(column).into());
        };
        decode::check(def, out.field_type()).map_err(|e| e.at(column))?;

        let value = row.get(column).flatten().map(|v| &v[..]);
        decode::write(def, value, out, offset)?;
        Ok(())
    }

    /// Reset the statement on the server.
    ///
    /// Long data sent so far and any unread result are discarded, the
    /// bound parameters are kept.
    pub fn reset<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        let result = self.reset_inner(conn);
        self.track(conn, result)
    }

    fn reset_inner<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        self.ensure_conn(conn)?;
        self.drain(conn)?;
        conn.ensure_idle()?;

        conn.send(StmtReset { stmt_id: self.stmt_id });
        OkPacket::decode(conn.recv()?)?;

        self.binder.clear_long_data();
        self.cursor.reset();
        self.transition(Event::Reset)
    }

    /// Release the result set, unread rows are discarded.
    pub fn free_result<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        let result = self.free_result_inner(conn);
        self.track(conn, result)
    }

    fn free_result_inner<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        self.ensure_conn(conn)?;
        self.drain(conn)?;
        self.cursor.reset();
        self.transition(Event::Reset)
    }

    /// Close the statement, releasing its server side id and its rows.
    ///
    /// Closing a statement which is not prepared, or already closed, does
    /// nothing.
    pub fn close<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        if !self.state.is_live() {
            self.error.clear();
            return Ok(());
        }
        let result = self.ensure_conn(conn).and_then(|_| self.close_inner(conn));
        self.track(conn, result)
    }

    fn close_inner<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<()> {
        span!("close", stmt_id = self.stmt_id);

        if let Err(err) = self.drain(conn) {
            if err.is_transport() {
                return Err(err);
            }
        }
        conn.ensure_idle()?;

        conn.send(StmtClose { stmt_id: self.stmt_id });
        conn.unregister(self.stmt_id);
        self.cursor.reset();
        self.binder.clear();
        self.results_bound = false;
        self.transition(Event::Close)?;
        conn.flush()
    }

    /// Set a statement attribute.
    pub fn set_attr(&mut self, attr: StmtAttr) {
        match attr {
            StmtAttr::UpdateMaxLength(enabled) => self.update_max_length = enabled,
        }
    }

    /// Current value of an attribute.
    pub fn attr_update_max_length(&self) -> bool {
        self.update_max_length
    }

    // Accessors

    pub fn state(&self) -> State {
        self.state
    }

    /// Server side statement id.
    pub fn id(&self) -> u32 {
        self.stmt_id
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Number of result columns, zero for a statement without result set.
    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Result column definitions.
    pub fn result_metadata(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Parameter definitions sent by the server on prepare.
    pub fn param_metadata(&self) -> &[ColumnDefinition] {
        &self.params
    }

    /// Returns `true` if [`bind_results`][Statement::bind_results] accepted
    /// the last output bindings.
    pub fn results_bound(&self) -> bool {
        self.results_bound
    }

    /// Number of rows in a stored result.
    pub fn num_rows(&self) -> u64 {
        self.cursor.num_rows()
    }

    /// Rows changed by the last execute, or number of rows of a stored
    /// result.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// `AUTO_INCREMENT` value generated by the last execute.
    pub fn insert_id(&self) -> u64 {
        self.insert_id
    }

    pub fn warning_count(&self) -> u16 {
        self.warnings
    }

    pub fn server_status(&self) -> ServerStatus {
        self.status
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
