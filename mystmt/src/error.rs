//! `mystmt` error types.
use std::{backtrace::Backtrace, fmt, io, str::Utf8Error};

use crate::{
    bind::{ArityMismatch, UnsupportedConversion},
    connection::ParseError,
    protocol::{ProtocolError, ServerError, response::ER_PARSE_ERROR},
};

/// A specialized [`Result`] type for `mystmt` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `mystmt` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Add context to the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// MySQL error number.
    ///
    /// Server errors keep the server number, client side errors use the
    /// client error numbers.
    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    /// SQLSTATE of the error.
    pub fn sqlstate(&self) -> &str {
        match &self.kind {
            ErrorKind::Database(e) | ErrorKind::Syntax(e) => e.sqlstate(),
            ErrorKind::MultiStatementNotAllowed => "42000",
            _ => "HY000",
        }
    }

    /// Returns `true` if the connection can not be used anymore.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Io(_) | ErrorKind::Protocol(_))
    }
}

/// All possible error kind from `mystmt` library.
pub enum ErrorKind {
    Config(ParseError),
    Protocol(ProtocolError),
    Io(io::Error),
    /// Server rejected a command.
    Database(ServerError),
    /// Server rejected the statement text.
    Syntax(ServerError),
    MultiStatementNotAllowed,
    ArityMismatch(ArityMismatch),
    UnsupportedConversion(UnsupportedConversion),
    /// Statement is not prepared on this connection, or closed.
    NotPrepared,
    /// Command issued in the wrong order.
    CommandsOutOfSync,
    /// Execute or long data before parameters are bound.
    ParamsNotBound,
    /// Fetch on a statement which does not produce a result set.
    NoResultSet,
    /// Column fetch before any row is fetched.
    NoCurrentRow,
    InvalidColumnIndex(usize),
    InvalidParamIndex(usize),
    /// Long data for a fixed width parameter.
    LongDataNotAllowed(usize),
    Utf8(Utf8Error),
}

impl ErrorKind {
    fn code(&self) -> u16 {
        match self {
            Self::Database(e) | Self::Syntax(e) => e.code(),
            Self::MultiStatementNotAllowed => ER_PARSE_ERROR,
            Self::Io(_) => 2013,
            Self::CommandsOutOfSync => 2014,
            Self::Protocol(_) => 2027,
            Self::NotPrepared => 2030,
            Self::ParamsNotBound => 2031,
            Self::InvalidParamIndex(_) | Self::LongDataNotAllowed(_) => 2034,
            Self::ArityMismatch(_) | Self::InvalidColumnIndex(_) => 2035,
            Self::UnsupportedConversion(_) => 2036,
            Self::NoCurrentRow => 2051,
            Self::NoResultSet => 2053,
            Self::Config(_) | Self::Utf8(_) => 2000,
        }
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<std::io::Error>e => ErrorKind::Io(e));
from!(<ServerError>e => ErrorKind::Database(e));
from!(<ArityMismatch>e => ErrorKind::ArityMismatch(e));
from!(<UnsupportedConversion>e => ErrorKind::UnsupportedConversion(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Io(e) => write!(f, "lost connection to server: {e}"),
            Self::Database(e) | Self::Syntax(e) => e.fmt(f),
            Self::MultiStatementNotAllowed => {
                f.write_str("multiple statements are not allowed in a prepared statement")
            }
            Self::ArityMismatch(e) => e.fmt(f),
            Self::UnsupportedConversion(e) => e.fmt(f),
            Self::NotPrepared => f.write_str("statement not prepared"),
            Self::CommandsOutOfSync => f.write_str("commands out of sync, you can't run this command now"),
            Self::ParamsNotBound => f.write_str("no data supplied for parameters in prepared statement"),
            Self::NoResultSet => f.write_str("prepared statement contains no metadata"),
            Self::NoCurrentRow => f.write_str("attempt to read column without prior row fetch"),
            Self::InvalidColumnIndex(i) => write!(f, "invalid column number: {i}"),
            Self::InvalidParamIndex(i) => write!(f, "invalid parameter number: {i}"),
            Self::LongDataNotAllowed(i) => write!(f, "parameter {i} does not accept long data"),
            Self::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Last error of a [`Connection`][1] or a [`Statement`][2].
///
/// [1]: crate::Connection
/// [2]: crate::Statement
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorSlot {
    code: u16,
    sqlstate: String,
    message: String,
}

impl ErrorSlot {
    pub(crate) fn record<T>(&mut self, result: &Result<T>) {
        match result {
            Ok(_) => self.clear(),
            Err(e) => self.set(e),
        }
    }

    pub(crate) fn set(&mut self, error: &Error) {
        self.code = error.code();
        self.sqlstate.clear();
        self.sqlstate.push_str(error.sqlstate());
        self.message = error.kind.to_string();
    }

    pub(crate) fn clear(&mut self) {
        self.code = 0;
        self.sqlstate.clear();
        self.message.clear();
    }

    pub(crate) fn code(&self) -> u16 {
        self.code
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn sqlstate(&self) -> &str {
        match self.code {
            0 => "00000",
            _ => &self.sqlstate,
        }
    }
}
