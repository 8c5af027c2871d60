use ::time::{Date, Month, PrimitiveDateTime, Time};

use crate::{InvalidTime, MysqlTime, TimeKind};

impl From<Date> for MysqlTime {
    fn from(value: Date) -> Self {
        // negative years clamp to zero
        let year = value.year().clamp(0, u16::MAX as i32) as u16;
        MysqlTime::date(year, value.month().into(), value.day())
    }
}

impl From<Time> for MysqlTime {
    fn from(value: Time) -> Self {
        MysqlTime::time(false, value.hour().into(), value.minute(), value.second())
            .with_micros(value.microsecond())
    }
}

impl From<PrimitiveDateTime> for MysqlTime {
    fn from(value: PrimitiveDateTime) -> Self {
        let date = MysqlTime::from(value.date());
        let time = value.time();
        MysqlTime::datetime(
            date.year,
            date.month,
            date.day,
            time.hour(),
            time.minute(),
            time.second(),
        )
        .with_micros(time.microsecond())
    }
}

fn to_date(value: &MysqlTime) -> Result<Date, InvalidTime> {
    let month = Month::try_from(value.month).map_err(|_| InvalidTime)?;
    Date::from_calendar_date(value.year.into(), month, value.day).map_err(|_| InvalidTime)
}

fn to_time(value: &MysqlTime) -> Result<Time, InvalidTime> {
    let hour = u8::try_from(value.hour).map_err(|_| InvalidTime)?;
    Time::from_hms_micro(hour, value.minute, value.second, value.microsecond).map_err(|_| InvalidTime)
}

impl TryFrom<MysqlTime> for Date {
    type Error = InvalidTime;

    fn try_from(value: MysqlTime) -> Result<Self, Self::Error> {
        match value.kind {
            TimeKind::Date | TimeKind::DateTime => to_date(&value),
            _ => Err(InvalidTime),
        }
    }
}

/// Only a non negative `TIME` below 24 hours, or the time part of a
/// `DATETIME`, converts.
impl TryFrom<MysqlTime> for Time {
    type Error = InvalidTime;

    fn try_from(value: MysqlTime) -> Result<Self, Self::Error> {
        match value.kind {
            TimeKind::Time if !value.negative => to_time(&value),
            TimeKind::DateTime => to_time(&value),
            _ => Err(InvalidTime),
        }
    }
}

impl TryFrom<MysqlTime> for PrimitiveDateTime {
    type Error = InvalidTime;

    fn try_from(value: MysqlTime) -> Result<Self, Self::Error> {
        match value.kind {
            TimeKind::DateTime => Ok(PrimitiveDateTime::new(to_date(&value)?, to_time(&value)?)),
            TimeKind::Date => Ok(PrimitiveDateTime::new(to_date(&value)?, Time::MIDNIGHT)),
            _ => Err(InvalidTime),
        }
    }
}
