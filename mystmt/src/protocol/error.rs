//! Protocol error
use std::fmt;

/// An error when translating buffer from mysql.
pub enum ProtocolError {
    /// A packet was received where another kind was expected.
    Unexpected {
        found: u8,
        phase: &'static str,
    },
    /// A packet is shorter than its fields or carries an invalid value.
    Malformed {
        phase: &'static str,
    },
    /// The packet sequence id does not follow the previous one.
    Sequence {
        expect: u8,
        found: u8,
    },
    /// The server sent a column type outside the known tag set.
    UnknownFieldType(u8),
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolError::Unexpected { found, phase } => {
                write!(f, "Unexpected packet header `0x{found:02X}` in `{phase}`")
            },
            ProtocolError::Malformed { phase } => write!(f, "Malformed packet in `{phase}`"),
            ProtocolError::Sequence { expect, found } => {
                write!(f, "Packets out of order, expected sequence {expect} found {found}")
            },
            ProtocolError::UnknownFieldType(ty) => write!(f, "Unknown field type `{ty}`"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl ProtocolError {
    pub(crate) fn unexpected(found: u8, phase: &'static str) -> ProtocolError {
        Self::Unexpected { found, phase }
    }

    pub(crate) fn malformed(phase: &'static str) -> ProtocolError {
        Self::Malformed { phase }
    }

    pub(crate) fn sequence(expect: u8, found: u8) -> ProtocolError {
        Self::Sequence { expect, found }
    }
}
