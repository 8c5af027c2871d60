//! Result cursor.
//!
//! Rows of an executed statement are either read one by one from the
//! connection, or all read up front by [`store_result`][1] and kept by the
//! statement.
//!
//! [1]: crate::Statement::store_result
use crate::{
    Connection, ErrorKind, Result,
    protocol::{BinaryRow, ColumnDefinition, ServerStatus},
    transport::Transport,
};

/// Position in a stored result, see [`Statement::row_seek`][1].
///
/// [1]: crate::Statement::row_seek
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowOffset(pub(crate) usize);

/// Packet ending a result set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct End {
    pub(crate) warnings: u16,
    pub(crate) status: ServerStatus,
}

pub(crate) enum Step {
    Row,
    /// No more rows, with the end packet when it was read by this step.
    End(Option<End>),
}

#[derive(Debug, Default)]
enum Rows {
    /// No result set.
    #[default]
    None,
    /// Rows are still on the wire.
    Pending,
    /// Every row was read from the wire.
    Done,
    Stored { rows: Vec<BinaryRow>, pos: usize },
}

#[derive(Debug, Default)]
pub(crate) struct Cursor {
    rows: Rows,
    current: Option<BinaryRow>,
}

impl Cursor {
    /// Forget the result set.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// A result set was announced, rows follow on the wire.
    pub(crate) fn start(&mut self) {
        self.rows = Rows::Pending;
        self.current = None;
    }

    pub(crate) fn has_result(&self) -> bool {
        !matches!(self.rows, Rows::None)
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self.rows, Rows::Pending)
    }

    pub(crate) fn is_stored(&self) -> bool {
        matches!(self.rows, Rows::Stored { .. })
    }

    /// Row of the last successful fetch.
    pub(crate) fn current(&self) -> Option<&BinaryRow> {
        self.current.as_ref()
    }

    /// Advance to the next row.
    pub(crate) fn next<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        columns: &[ColumnDefinition],
    ) -> Result<Step> {
        if self.is_pending() {
            return match self.read(conn, columns)? {
                Packet::Row(row) => {
                    self.current = Some(row);
                    Ok(Step::Row)
                }
                Packet::End(end) => {
                    self.current = None;
                    Ok(Step::End(Some(end)))
                }
            };
        }

        match &mut self.rows {
            Rows::Stored { rows, pos } => match rows.get(*pos) {
                Some(row) => {
                    self.current = Some(row.clone());
                    *pos += 1;
                    Ok(Step::Row)
                }
                None => {
                    self.current = None;
                    Ok(Step::End(None))
                }
            },
            Rows::Pending | Rows::Done => {
                self.current = None;
                Ok(Step::End(None))
            }
            Rows::None => Err(ErrorKind::NoResultSet.into()),
        }
    }

    /// Read every remaining row from the wire and keep them.
    pub(crate) fn store<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        columns: &[ColumnDefinition],
    ) -> Result<End> {
        let mut rows = vec![];
        let end = self.read_all(conn, columns, |row| rows.push(row))?;
        self.rows = Rows::Stored { rows, pos: 0 };
        self.current = None;
        Ok(end)
    }

    /// Read and discard every remaining row from the wire.
    ///
    /// Returns the number of discarded rows.
    pub(crate) fn drain<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        columns: &[ColumnDefinition],
    ) -> Result<(usize, End)> {
        let mut count = 0;
        let end = self.read_all(conn, columns, |_| count += 1)?;
        self.current = None;
        Ok((count, end))
    }

    fn read_all<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        columns: &[ColumnDefinition],
        mut f: impl FnMut(BinaryRow),
    ) -> Result<End> {
        loop {
            match self.read(conn, columns)? {
                Packet::Row(row) => f(row),
                Packet::End(end) => return Ok(end),
            }
        }
    }

    /// Read one packet of a pending result.
    ///
    /// The result is over when the end packet or a server error is read,
    /// and the connection is released.
    fn read<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
        columns: &[ColumnDefinition],
    ) -> Result<Packet> {
        let result = read_packet(conn, columns);
        match &result {
            Ok(Packet::Row(_)) => { },
            Err(err) if err.is_transport() => { },
            Ok(Packet::End(_)) | Err(_) => {
                self.rows = Rows::Done;
                conn.set_pending(None);
            }
        }
        result
    }

    /// Stored rows, empty if the result is not stored.
    pub(crate) fn stored(&self) -> &[BinaryRow] {
        match &self.rows {
            Rows::Stored { rows, .. } => rows,
            _ => &[],
        }
    }

    pub(crate) fn num_rows(&self) -> u64 {
        self.stored().len() as u64
    }

    /// Move to the `n`th stored row, clamped to the end.
    pub(crate) fn seek(&mut self, n: u64) {
        if let Rows::Stored { rows, pos } = &mut self.rows {
            *pos = usize::try_from(n).unwrap_or(usize::MAX).min(rows.len());
            self.current = None;
        }
    }

    pub(crate) fn tell(&self) -> RowOffset {
        match &self.rows {
            Rows::Stored { pos, .. } => RowOffset(*pos),
            _ => RowOffset(0),
        }
    }
}

enum Packet {
    Row(BinaryRow),
    End(End),
}

fn read_packet<T: Transport>(conn: &mut Connection<T>, columns: &[ColumnDefinition]) -> Result<Packet> {
    let packet = conn.recv()?;
    if conn.is_end(&packet) {
        let (warnings, status) = conn.decode_end(packet)?;
        return Ok(Packet::End(End { warnings, status }));
    }
    Ok(Packet::Row(BinaryRow::decode(packet, columns)?))
}
