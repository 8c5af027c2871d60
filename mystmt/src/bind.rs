//! Binding descriptors.
//!
//! [`Param`] describes one statement parameter, [`Out`] describes where one
//! result column is written. Both only borrow caller memory, a [`Param`] is
//! read during [`bind_params`][1] and an [`Out`] is written during
//! [`fetch`][2] or [`fetch_column`][3].
//!
//! [1]: crate::Statement::bind_params
//! [2]: crate::Statement::fetch
//! [3]: crate::Statement::fetch_column
use std::fmt;

use crate::{protocol::FieldType, time::MysqlTime};

/// Input binding for one statement parameter.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    pub(crate) ty: FieldType,
    pub(crate) unsigned: bool,
    pub(crate) is_null: bool,
    pub(crate) length: Option<usize>,
    pub(crate) value: Value<'a>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Value<'a> {
    None,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Bytes(&'a [u8]),
    Time(MysqlTime),
}

macro_rules! int_param {
    ($($(#[$meta:meta])* $name:ident($int:ty) => $ty:ident, $variant:ident, $unsigned:literal;)*) => {$(
        $(#[$meta])*
        pub const fn $name(value: $int) -> Self {
            Self::new(FieldType::$ty, $unsigned, Value::$variant(value as _))
        }
    )*};
}

impl<'a> Param<'a> {
    const fn new(ty: FieldType, unsigned: bool, value: Value<'a>) -> Self {
        Self { ty, unsigned, is_null: false, length: None, value }
    }

    /// SQL `NULL`.
    pub const fn null() -> Self {
        Self { ty: FieldType::Null, unsigned: false, is_null: true, length: None, value: Value::None }
    }

    int_param! {
        /// `TINYINT`.
        tiny(i8) => Tiny, Int, false;
        /// `TINYINT UNSIGNED`.
        utiny(u8) => Tiny, UInt, true;
        short(i16) => Short, Int, false;
        ushort(u16) => Short, UInt, true;
        long(i32) => Long, Int, false;
        ulong(u32) => Long, UInt, true;
        longlong(i64) => LongLong, Int, false;
        ulonglong(u64) => LongLong, UInt, true;
        /// `YEAR`, sent as a two byte unsigned integer.
        year(u16) => Year, UInt, true;
    }

    pub const fn float(value: f32) -> Self {
        Self::new(FieldType::Float, false, Value::Float(value))
    }

    pub const fn double(value: f64) -> Self {
        Self::new(FieldType::Double, false, Value::Double(value))
    }

    /// Text parameter, sent as `MYSQL_TYPE_STRING`.
    pub fn string<B: AsRef<[u8]> + ?Sized>(value: &'a B) -> Self {
        Self::new(FieldType::String, false, Value::Bytes(value.as_ref()))
    }

    /// Binary parameter, sent as `MYSQL_TYPE_BLOB`.
    pub const fn blob(value: &'a [u8]) -> Self {
        Self::new(FieldType::Blob, false, Value::Bytes(value))
    }

    /// Variable length parameter with explicit wire type.
    pub const fn bytes(ty: FieldType, value: &'a [u8]) -> Self {
        Self::new(ty, false, Value::Bytes(value))
    }

    /// Temporal parameter, `ty` is one of `DATE`, `TIME`, `DATETIME`
    /// or `TIMESTAMP`.
    pub const fn time(ty: FieldType, value: MysqlTime) -> Self {
        Self::new(ty, false, Value::Time(value))
    }

    /// Send the parameter as `NULL` while keeping its type.
    pub const fn with_null(mut self, is_null: bool) -> Self {
        self.is_null = is_null;
        self
    }

    /// Only send the first `len` bytes of a variable length value.
    ///
    /// Fixed width values ignore the length.
    pub const fn length(mut self, len: usize) -> Self {
        self.length = Some(len);
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    pub fn is_null(&self) -> bool {
        self.is_null || matches!(self.ty, FieldType::Null)
    }
}

/// Output binding for one result column.
#[derive(Debug)]
pub struct Out<'a> {
    pub(crate) target: Target<'a>,
    pub(crate) length: Option<&'a mut usize>,
    pub(crate) is_null: Option<&'a mut bool>,
}

/// Caller buffer an [`Out`] writes into.
#[derive(Debug)]
pub enum Target<'a> {
    /// Discard the value, only the length and null slots are written.
    Null,
    Tiny(&'a mut i8),
    UTiny(&'a mut u8),
    Short(&'a mut i16),
    UShort(&'a mut u16),
    Long(&'a mut i32),
    ULong(&'a mut u32),
    LongLong(&'a mut i64),
    ULongLong(&'a mut u64),
    Float(&'a mut f32),
    Double(&'a mut f64),
    /// Temporal buffer of the given type.
    Time(FieldType, &'a mut MysqlTime),
    /// Byte buffer of the given string or blob type, its length is the
    /// buffer capacity.
    Bytes(FieldType, &'a mut [u8]),
}

impl Target<'_> {
    /// Wire type this buffer is declared as.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Null => FieldType::Null,
            Self::Tiny(_) | Self::UTiny(_) => FieldType::Tiny,
            Self::Short(_) | Self::UShort(_) => FieldType::Short,
            Self::Long(_) | Self::ULong(_) => FieldType::Long,
            Self::LongLong(_) | Self::ULongLong(_) => FieldType::LongLong,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Time(ty, _) | Self::Bytes(ty, _) => *ty,
        }
    }
}

macro_rules! out {
    ($($name:ident($ty:ty) => $variant:ident;)*) => {$(
        pub fn $name(buf: &'a mut $ty) -> Self {
            Self::new(Target::$variant(buf))
        }
    )*};
}

impl<'a> Out<'a> {
    pub fn new(target: Target<'a>) -> Self {
        Self { target, length: None, is_null: None }
    }

    /// Skip the column.
    pub fn skip() -> Self {
        Self::new(Target::Null)
    }

    out! {
        tiny(i8) => Tiny;
        utiny(u8) => UTiny;
        short(i16) => Short;
        ushort(u16) => UShort;
        long(i32) => Long;
        ulong(u32) => ULong;
        longlong(i64) => LongLong;
        ulonglong(u64) => ULongLong;
        float(f32) => Float;
        double(f64) => Double;
    }

    /// Text buffer, declared as `MYSQL_TYPE_STRING`.
    pub fn string(buf: &'a mut [u8]) -> Self {
        Self::new(Target::Bytes(FieldType::String, buf))
    }

    /// Binary buffer, declared as `MYSQL_TYPE_BLOB`.
    pub fn blob(buf: &'a mut [u8]) -> Self {
        Self::new(Target::Bytes(FieldType::Blob, buf))
    }

    /// Temporal buffer, declared as `MYSQL_TYPE_DATETIME`.
    pub fn time(buf: &'a mut MysqlTime) -> Self {
        Self::new(Target::Time(FieldType::DateTime, buf))
    }

    /// Receive the full length of the column value.
    pub fn with_length(mut self, length: &'a mut usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Receive whether the column value is `NULL`.
    pub fn with_null(mut self, is_null: &'a mut bool) -> Self {
        self.is_null = Some(is_null);
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.target.field_type()
    }
}

/// Number of bindings does not match the statement.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ArityMismatch {
    pub(crate) what: &'static str,
    pub(crate) expect: usize,
    pub(crate) found: usize,
}

impl ArityMismatch {
    pub(crate) fn params(expect: usize, found: usize) -> Self {
        Self { what: "parameters", expect, found }
    }

    pub(crate) fn columns(expect: usize, found: usize) -> Self {
        Self { what: "columns", expect, found }
    }

    pub fn expect(&self) -> usize {
        self.expect
    }

    pub fn found(&self) -> usize {
        self.found
    }
}

impl std::error::Error for ArityMismatch { }

impl fmt::Display for ArityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement has {} {}, {} bound", self.expect, self.what, self.found)
    }
}

impl fmt::Debug for ArityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Buffer type can not be used for a parameter or a column.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedConversion {
    pub(crate) buffer: FieldType,
    pub(crate) column: Option<FieldType>,
    pub(crate) index: usize,
}

impl UnsupportedConversion {
    pub(crate) fn param(buffer: FieldType) -> Self {
        Self { buffer, column: None, index: 0 }
    }

    pub(crate) fn column(buffer: FieldType, column: FieldType) -> Self {
        Self { buffer, column: Some(column), index: 0 }
    }

    pub(crate) fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Declared type of the rejected buffer.
    pub fn buffer_type(&self) -> FieldType {
        self.buffer
    }

    /// Position of the rejected binding.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::error::Error for UnsupportedConversion { }

impl fmt::Display for UnsupportedConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            None => write!(
                f,
                "using unsupported buffer type: {} (parameter: {})",
                self.buffer, self.index + 1,
            ),
            Some(column) => write!(
                f,
                "can not fetch {column} column {} into buffer type {}",
                self.index + 1, self.buffer,
            ),
        }
    }
}

impl fmt::Debug for UnsupportedConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
