//! Column decoding.
//!
//! Every column value is first read into a [`Wire`] according to the column
//! type, then converted to whatever buffer the caller bound. Numeric
//! narrowing wraps, text copies are truncated to the buffer capacity while
//! the length slot always receives the full length.
use std::borrow::Cow;

use crate::{
    bind::{Out, Target, UnsupportedConversion},
    protocol::{ColumnDefinition, ColumnFlags, FieldType, ProtocolError},
    time::MysqlTime,
};

const PHASE: &str = "column value";

/// Check whether a column can be fetched into a buffer of type `buffer`.
pub(crate) fn check(column: &ColumnDefinition, buffer: FieldType) -> Result<(), UnsupportedConversion> {
    use FieldType::*;

    let col = column.field_type();
    let unsupported = || UnsupportedConversion::column(buffer, col);

    let supported_buffer = matches!(
        buffer,
        Null | Tiny | Short | Long | LongLong | Float | Double
            | Date | Time | DateTime | Timestamp
            | TinyBlob | MediumBlob | LongBlob | Blob
            | VarChar | VarString | String | Json | Bit
            | Decimal | NewDecimal
    );
    if !supported_buffer {
        return Err(unsupported());
    }

    let text_buffer = buffer.is_var_len();
    if col == Geometry && !(text_buffer || buffer == Null) {
        return Err(unsupported());
    }
    if buffer.is_temporal() && (col.is_numeric() || col == Bit) {
        return Err(unsupported());
    }
    Ok(())
}

/// Column value read from a binary row.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Wire<'a> {
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Time(MysqlTime),
    Text(&'a [u8]),
    Bit(&'a [u8]),
}

fn read<'a>(column: &ColumnDefinition, value: &'a [u8]) -> Result<Wire<'a>, ProtocolError> {
    let ty = column.field_type();
    let wire = match ty {
        FieldType::Float => Wire::Float(f32::from_le_bytes(fixed(value)?)),
        FieldType::Double => Wire::Double(f64::from_le_bytes(fixed(value)?)),
        FieldType::Bit => Wire::Bit(value),
        ty if ty.is_integer() => {
            let width = value.len();
            if width == 0 || width > 8 {
                return Err(ProtocolError::malformed(PHASE));
            }
            let mut raw = [0u8; 8];
            raw[..width].copy_from_slice(value);
            let int = u64::from_le_bytes(raw);
            if column.is_unsigned() || ty == FieldType::Year {
                Wire::UInt(int)
            } else {
                let shift = 64 - width as u32 * 8;
                Wire::Int(((int << shift) as i64) >> shift)
            }
        }
        ty if ty.is_temporal() => Wire::Time(MysqlTime::decode_binary(ty, value)?),
        _ => Wire::Text(value),
    };
    Ok(wire)
}

fn fixed<const N: usize>(value: &[u8]) -> Result<[u8; N], ProtocolError> {
    value.try_into().map_err(|_| ProtocolError::malformed(PHASE))
}

impl<'a> Wire<'a> {
    fn to_i64(self) -> i64 {
        match self {
            Self::Int(int) => int,
            Self::UInt(int) => int as i64,
            Self::Float(float) => float as i64,
            Self::Double(double) => double as i64,
            Self::Time(time) => time.to_number(),
            Self::Text(text) => parse_int(text),
            Self::Bit(bits) => be_uint(bits) as i64,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Self::Int(int) => int as f64,
            Self::UInt(int) => int as f64,
            Self::Float(float) => float as f64,
            Self::Double(double) => double,
            Self::Time(time) => time.to_f64(),
            Self::Text(text) => parse_float(text),
            Self::Bit(bits) => be_uint(bits) as f64,
        }
    }

    fn to_time(self, column: &ColumnDefinition) -> MysqlTime {
        match self {
            Self::Time(time) => time,
            Self::Text(text) => MysqlTime::parse(text).unwrap_or_else(|| MysqlTime {
                kind: MysqlTime::kind_of(column.field_type()),
                ..Default::default()
            }),
            _ => MysqlTime::default(),
        }
    }

    fn to_text(self, column: &ColumnDefinition) -> Cow<'a, [u8]> {
        let mut itoa = itoa::Buffer::new();
        let int = match self {
            Self::Int(int) => itoa.format(int),
            Self::UInt(int) => itoa.format(int),
            Self::Float(float) => return float_text(float as f64, Some(float), column).into(),
            Self::Double(double) => return float_text(double, None, column).into(),
            Self::Time(time) => return Cow::Owned(time.to_string().into_bytes()),
            Self::Text(text) | Self::Bit(text) => return Cow::Borrowed(text),
        };

        let width = column.length() as usize;
        if column.flags().contains(ColumnFlags::ZEROFILL) && int.len() < width {
            let mut padded = vec![b'0'; width - int.len()];
            padded.extend_from_slice(int.as_bytes());
            return Cow::Owned(padded);
        }
        Cow::Owned(int.as_bytes().to_vec())
    }
}

/// Float text, fixed point when the column declares less than 31 decimals.
fn float_text(value: f64, single: Option<f32>, column: &ColumnDefinition) -> Vec<u8> {
    let decimals = column.decimals() as usize;
    let text = match (decimals < 31, single) {
        (true, _) => format!("{value:.decimals$}"),
        (false, Some(single)) => single.to_string(),
        (false, None) => value.to_string(),
    };
    text.into_bytes()
}

/// Big endian unsigned integer of at most 8 bytes.
fn be_uint(bits: &[u8]) -> u64 {
    bits.iter().rev().take(8).rev().fold(0, |acc, &b| acc << 8 | b as u64)
}

/// Leading integer of the text, 0 when there is none.
///
/// Out of range values saturate.
fn parse_int(text: &[u8]) -> i64 {
    let text = text.trim_ascii_start();
    let (negative, rest) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return 0;
    }

    let mut acc: u64 = 0;
    for &b in &rest[..digits] {
        match acc.checked_mul(10).and_then(|acc| acc.checked_add((b - b'0') as u64)) {
            Some(next) => acc = next,
            None => return if negative { i64::MIN } else { u64::MAX as i64 },
        }
    }

    match negative {
        true if acc > i64::MIN.unsigned_abs() => i64::MIN,
        true => (acc as i64).wrapping_neg(),
        false => acc as i64,
    }
}

/// Leading floating point number of the text, 0 when there is none.
fn parse_float(text: &[u8]) -> f64 {
    let text = text.trim_ascii_start();
    let digits = |from: usize| text[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = match text.first() {
        Some(b'-' | b'+') => 1,
        _ => 0,
    };
    let int = digits(end);
    end += int;
    let mut frac = 0;
    if text.get(end) == Some(&b'.') {
        frac = digits(end + 1);
        end += 1 + frac;
    }
    if int + frac == 0 {
        return 0.0;
    }
    if let Some(b'e' | b'E') = text.get(end) {
        let mut exp = end + 1;
        if let Some(b'-' | b'+') = text.get(exp) {
            exp += 1;
        }
        let exp_digits = digits(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    std::str::from_utf8(&text[..end])
        .ok()
        .and_then(|num| num.parse().ok())
        .unwrap_or(0.0)
}

/// Write one column value into an output binding.
///
/// `offset` skips that many bytes of the value for byte buffers, other
/// buffers ignore it.
pub(crate) fn write(
    column: &ColumnDefinition,
    value: Option<&[u8]>,
    out: &mut Out,
    offset: usize,
) -> Result<(), ProtocolError> {
    let Some(value) = value else {
        if let Some(is_null) = out.is_null.as_deref_mut() {
            *is_null = true;
        }
        if let Some(length) = out.length.as_deref_mut() {
            *length = 0;
        }
        return Ok(());
    };

    if let Some(is_null) = out.is_null.as_deref_mut() {
        *is_null = false;
    }

    let wire = read(column, value)?;

    macro_rules! int {
        ($buf:expr, $ty:ty) => {{
            **$buf = wire.to_i64() as $ty;
            size_of::<$ty>()
        }};
    }

    let length = match &mut out.target {
        Target::Null => value.len(),
        Target::Tiny(buf) => int!(buf, i8),
        Target::UTiny(buf) => int!(buf, u8),
        Target::Short(buf) => int!(buf, i16),
        Target::UShort(buf) => int!(buf, u16),
        Target::Long(buf) => int!(buf, i32),
        Target::ULong(buf) => int!(buf, u32),
        Target::LongLong(buf) => int!(buf, i64),
        Target::ULongLong(buf) => int!(buf, u64),
        Target::Float(buf) => {
            **buf = match wire {
                Wire::Float(float) => float,
                wire => wire.to_f64() as f32,
            };
            size_of::<f32>()
        }
        Target::Double(buf) => {
            **buf = wire.to_f64();
            size_of::<f64>()
        }
        Target::Time(_, buf) => {
            **buf = wire.to_time(column);
            size_of::<MysqlTime>()
        }
        Target::Bytes(_, buf) => {
            let text = wire.to_text(column);
            let rest = &text[offset.min(text.len())..];
            let copy = rest.len().min(buf.len());
            buf[..copy].copy_from_slice(&rest[..copy]);
            text.len()
        }
    };

    if let Some(slot) = out.length.as_deref_mut() {
        *slot = length;
    }
    Ok(())
}

/// Length of the value as text, used to track the longest value of a
/// stored result.
pub(crate) fn display_len(column: &ColumnDefinition, value: &[u8]) -> Result<usize, ProtocolError> {
    Ok(read(column, value)?.to_text(column).len())
}
