//! The [`MysqlTime`] value.
use bytes::{Buf, BufMut};
use std::{fmt, str::FromStr};

use crate::{
    common::unit_error,
    protocol::{FieldType, ProtocolError},
};

unit_error! {
    /// Text or value is not a valid date or time.
    pub struct InvalidTime("invalid date or time value");
}

/// Which part of a [`MysqlTime`] is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeKind {
    /// Zero or invalid value.
    #[default]
    None,
    Date,
    Time,
    DateTime,
}

/// Date and time value exchanged with `DATE`, `TIME`, `DATETIME` and
/// `TIMESTAMP` columns.
///
/// A `TIME` value is a duration, `hour` may exceed 23 and `negative`
/// applies to the whole value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MysqlTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u32,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
    pub negative: bool,
    pub kind: TimeKind,
}

impl MysqlTime {
    pub const fn date(year: u16, month: u8, day: u8) -> Self {
        Self {
            year, month, day,
            hour: 0, minute: 0, second: 0, microsecond: 0,
            negative: false,
            kind: TimeKind::Date,
        }
    }

    pub const fn time(negative: bool, hour: u32, minute: u8, second: u8) -> Self {
        Self {
            year: 0, month: 0, day: 0,
            hour, minute, second, microsecond: 0,
            negative,
            kind: TimeKind::Time,
        }
    }

    pub const fn datetime(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year, month, day,
            hour: hour as u32, minute, second, microsecond: 0,
            negative: false,
            kind: TimeKind::DateTime,
        }
    }

    /// Set the fractional second part.
    pub const fn with_micros(mut self, microsecond: u32) -> Self {
        self.microsecond = microsecond;
        self
    }

    /// Kind a column of type `ty` produces.
    pub(crate) fn kind_of(ty: FieldType) -> TimeKind {
        match ty {
            FieldType::Date | FieldType::NewDate => TimeKind::Date,
            FieldType::Time => TimeKind::Time,
            FieldType::DateTime | FieldType::Timestamp => TimeKind::DateTime,
            _ => TimeKind::None,
        }
    }

    /// Decode the binary protocol value, without its length byte.
    pub fn decode_binary(ty: FieldType, mut value: &[u8]) -> Result<Self, ProtocolError> {
        const PHASE: &str = "temporal value";
        let mut me = MysqlTime { kind: Self::kind_of(ty), ..Default::default() };

        if ty == FieldType::Time {
            match value.len() {
                0 => return Ok(me),
                8 | 12 => { },
                _ => return Err(ProtocolError::malformed(PHASE)),
            }
            me.negative = value.get_u8() == 1;
            let days = value.get_u32_le();
            me.hour = days.saturating_mul(24).saturating_add(value.get_u8() as u32);
            me.minute = value.get_u8();
            me.second = value.get_u8();
            if value.has_remaining() {
                me.microsecond = value.get_u32_le();
            }
            return Ok(me);
        }

        match value.len() {
            0 | 4 | 7 | 11 => { },
            _ => return Err(ProtocolError::malformed(PHASE)),
        }
        if value.has_remaining() {
            me.year = value.get_u16_le();
            me.month = value.get_u8();
            me.day = value.get_u8();
        }
        if value.has_remaining() {
            me.hour = value.get_u8() as u32;
            me.minute = value.get_u8();
            me.second = value.get_u8();
        }
        if value.has_remaining() {
            me.microsecond = value.get_u32_le();
        }
        Ok(me)
    }

    /// Length of the binary protocol value for a parameter of type `ty`,
    /// without its length byte.
    pub(crate) fn binary_len(&self, ty: FieldType) -> usize {
        if ty == FieldType::Time {
            return match (self.hour, self.minute, self.second, self.microsecond) {
                (0, 0, 0, 0) => 0,
                (_, _, _, 0) => 8,
                _ => 12,
            };
        }
        match (self.hour, self.minute, self.second, self.microsecond) {
            (_, _, _, 1..) => 11,
            (1.., _, _, _) | (_, 1.., _, _) | (_, _, 1.., _) => 7,
            _ if ty == FieldType::Date || self.year != 0 || self.month != 0 || self.day != 0 => 4,
            _ => 0,
        }
    }

    /// Write the binary protocol value, length byte included.
    pub(crate) fn encode_binary(&self, ty: FieldType, buf: &mut impl BufMut) {
        let len = self.binary_len(ty);
        buf.put_u8(len as u8);

        if ty == FieldType::Time {
            if len == 0 {
                return;
            }
            buf.put_u8(self.negative as u8);
            buf.put_u32_le(self.hour / 24);
            buf.put_u8((self.hour % 24) as u8);
            buf.put_u8(self.minute);
            buf.put_u8(self.second);
            if len == 12 {
                buf.put_u32_le(self.microsecond);
            }
            return;
        }

        if len >= 4 {
            buf.put_u16_le(self.year);
            buf.put_u8(self.month);
            buf.put_u8(self.day);
        }
        if len >= 7 {
            buf.put_u8(self.hour as u8);
            buf.put_u8(self.minute);
            buf.put_u8(self.second);
        }
        if len == 11 {
            buf.put_u32_le(self.microsecond);
        }
    }

    /// Parse the canonical text forms, `YYYY-MM-DD`, `[-]HH:MM:SS` and
    /// `YYYY-MM-DD HH:MM:SS`, each with an optional fraction.
    ///
    /// Returns [`None`] if the text is in neither form.
    pub fn parse(text: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(text).ok()?.trim();

        let (date, time) = match text.split_once([' ', 'T']) {
            Some((date, time)) => (Some(date), Some(time)),
            None if text.contains(':') => (None, Some(text)),
            None => (Some(text), None),
        };

        let mut me = MysqlTime::default();

        if let Some(date) = date {
            let mut parts = date.splitn(3, '-');
            me.year = parts.next()?.parse().ok()?;
            me.month = parts.next()?.parse().ok()?;
            me.day = parts.next()?.parse().ok()?;
            me.kind = TimeKind::Date;
        }

        if let Some(time) = time {
            let (negative, time) = match time.strip_prefix('-') {
                Some(time) if date.is_none() => (true, time),
                _ => (false, time),
            };
            let (time, frac) = match time.split_once('.') {
                Some((time, frac)) => (time, Some(frac)),
                None => (time, None),
            };
            let mut parts = time.splitn(3, ':');
            me.hour = parts.next()?.parse().ok()?;
            me.minute = parts.next()?.parse().ok()?;
            me.second = parts.next()?.parse().ok()?;
            if let Some(frac) = frac {
                if frac.is_empty() || frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let scale = 10u32.pow(6 - frac.len() as u32);
                me.microsecond = frac.parse::<u32>().ok()? * scale;
            }
            me.negative = negative;
            me.kind = match date {
                Some(_) => TimeKind::DateTime,
                None => TimeKind::Time,
            };
        }

        Some(me)
    }

    /// Numeric form used when a temporal value is fetched into a number,
    /// `YYYYMMDD`, `HHMMSS` or `YYYYMMDDHHMMSS`.
    pub fn to_number(&self) -> i64 {
        let date = self.year as i64 * 10_000 + self.month as i64 * 100 + self.day as i64;
        let time = self.hour as i64 * 10_000 + self.minute as i64 * 100 + self.second as i64;
        let value = match self.kind {
            TimeKind::Date => date,
            TimeKind::Time => time,
            TimeKind::DateTime => date * 1_000_000 + time,
            TimeKind::None => 0,
        };
        match self.negative {
            true => -value,
            false => value,
        }
    }

    /// Same as [`to_number`][Self::to_number] with the fraction.
    pub fn to_f64(&self) -> f64 {
        let frac = self.microsecond as f64 / 1_000_000.0;
        match self.negative {
            true => self.to_number() as f64 - frac,
            false => self.to_number() as f64 + frac,
        }
    }
}

impl fmt::Display for MysqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TimeKind::Date => write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?,
            TimeKind::Time => {
                if self.negative {
                    f.write_str("-")?;
                }
                write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)?
            },
            TimeKind::DateTime | TimeKind::None => write!(
                f,
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute, self.second
            )?,
        }
        if self.microsecond != 0 && self.kind != TimeKind::Date {
            write!(f, ".{:06}", self.microsecond)?;
        }
        Ok(())
    }
}

impl FromStr for MysqlTime {
    type Err = InvalidTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MysqlTime::parse(s.as_bytes()).ok_or(InvalidTime)
    }
}
