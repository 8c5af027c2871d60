//! Type integration with external types
//!
//! Conversion between [`MysqlTime`][crate::MysqlTime] and external types.
//!
//! Available for:
//!
//! - [`time`][::time]'s [`Date`][td], [`Time`][tt] and
//!   [`PrimitiveDateTime`][tp], requires `time` feature
//!
//! [td]: ::time::Date
//! [tt]: ::time::Time
//! [tp]: ::time::PrimitiveDateTime

mod time;
