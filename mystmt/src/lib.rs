//! MySQL Prepared Statement Driver
//!
//! Client side of the MySQL binary statement protocol: prepare, bind,
//! execute and fetch over a connection that already completed the
//! authentication handshake.
//!
//! # Examples
//!
//! Insert and read back rows:
//!
//! ```no_run
//! use mystmt::{Config, Connection, Fetch, Out, PacketStream, Param};
//!
//! # fn handshake(io: &mut PacketStream, config: &Config) -> mystmt::Result<()> { Ok(()) }
//! # fn app() -> mystmt::Result<()> {
//! let config = Config::from_env();
//! let mut io = PacketStream::connect(&config)?;
//! handshake(&mut io, &config)?;
//! let mut conn = Connection::new(io, &config);
//!
//! let mut insert = conn.prepare("INSERT INTO t(id, name) VALUES(?, ?)")?;
//! for (id, name) in [(1, "MySQL"), (2, "Database")] {
//!     insert.bind_params(&[Param::long(id), Param::string(name)])?;
//!     insert.execute(&mut conn)?;
//! }
//! insert.close(&mut conn)?;
//!
//! let mut select = conn.prepare("SELECT id, name FROM t")?;
//! select.execute(&mut conn)?;
//!
//! let mut id = 0i32;
//! let mut name = [0u8; 16];
//! let mut len = 0usize;
//! loop {
//!     let mut outs = [Out::long(&mut id), Out::string(&mut name).with_length(&mut len)];
//!     if select.fetch(&mut conn, &mut outs)? == Fetch::EndOfData {
//!         break;
//!     }
//!     println!("{id}: {}", String::from_utf8_lossy(&name[..len.min(16)]));
//! }
//!
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

pub mod common;
mod ext;

// Protocol
pub mod protocol;
mod time;

// Marshaling
pub mod bind;
pub mod encode;
mod decode;

// Component
mod binder;
mod sql;
mod statement;
mod cursor;

// Operation
pub mod transport;
mod net;

// Connection
pub mod connection;

#[cfg(feature = "time")]
pub mod types;

mod error;


pub use bind::{Param, Out, Target, ArityMismatch, UnsupportedConversion};
pub use protocol::{ColumnDefinition as Column, FieldType};
pub use time::{MysqlTime, TimeKind, InvalidTime};

pub use statement::{Statement, State, StmtAttr, Fetch};
pub use cursor::RowOffset;
pub use transport::Transport;
pub use net::PacketStream;
pub use connection::{Connection, Config, QueryResult};
pub use error::{Error, ErrorKind, Result};
