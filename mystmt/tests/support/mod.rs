//! In-process scripted server.
//!
//! Answers the commands a [`Connection`] sends with real protocol packets,
//! over a handful of in-memory tables. Understood sql:
//!
//! - `INSERT INTO <table> VALUES(?, ...)`
//! - `SELECT * FROM <table>` and `SELECT <col>, ... FROM <table>`, with an
//!   optional `WHERE <col> = ?`
//! - `DELETE FROM <table>`
#![allow(dead_code)]
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    collections::{HashMap, VecDeque},
    io,
};

use mystmt::{
    Column, Config, Connection, FieldType, MysqlTime, Transport,
    protocol::{ClientCommand, ColumnFlags, command},
};

pub const COM_QUIT: u8 = 0x01;
pub const COM_QUERY: u8 = 0x03;
pub const COM_PING: u8 = 0x0E;
pub const COM_STMT_PREPARE: u8 = 0x16;
pub const COM_STMT_EXECUTE: u8 = 0x17;
pub const COM_STMT_SEND_LONG_DATA: u8 = 0x18;
pub const COM_STMT_CLOSE: u8 = 0x19;
pub const COM_STMT_RESET: u8 = 0x1A;

const STATUS_AUTOCOMMIT: u16 = 0x0002;

/// Install a tracing subscriber, filtered by `RUST_LOG`.
pub fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connection over a fresh server holding `tables`.
pub fn connect(tables: Vec<Table>) -> Connection<Server> {
    connect_with(tables, false)
}

pub fn connect_with(tables: Vec<Table>, deprecate_eof: bool) -> Connection<Server> {
    setup();
    let mut server = Server::new(deprecate_eof);
    for table in tables {
        server.tables.insert(table.name.clone(), table);
    }
    let config = Config::default().deprecate_eof(deprecate_eof);
    Connection::new(server, &config)
}

/// Column of a test table.
pub fn column(name: &str, ty: FieldType) -> Column {
    column_with(name, ty, 0)
}

pub fn column_with(name: &str, ty: FieldType, flags: u16) -> Column {
    let length = match ty {
        FieldType::Tiny => 4,
        FieldType::Short => 6,
        FieldType::Long => 11,
        FieldType::LongLong => 20,
        FieldType::Float => 12,
        FieldType::Double => 22,
        FieldType::Date => 10,
        FieldType::Time => 10,
        FieldType::DateTime | FieldType::Timestamp => 19,
        _ => 255,
    };
    Column::new(name.to_owned(), ty, flags).with_length(length, 0)
}

/// Value held by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Bytes(Vec<u8>),
    Time(MysqlTime),
}

impl Value {
    pub fn text(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    fn to_i64(&self) -> i64 {
        match self {
            Value::Int(int) => *int,
            Value::UInt(int) => *int as i64,
            Value::Double(double) => *double as i64,
            Value::Bytes(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0),
            Value::Time(time) => time.to_number(),
            Value::Null => 0,
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Value::Double(double) => *double,
            Value::Bytes(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0.0),
            value => value.to_i64() as f64,
        }
    }

    fn to_text(&self) -> Vec<u8> {
        match self {
            Value::Null => vec![],
            Value::Int(int) => int.to_string().into_bytes(),
            Value::UInt(int) => int.to_string().into_bytes(),
            Value::Double(double) => double.to_string().into_bytes(),
            Value::Bytes(bytes) => bytes.clone(),
            Value::Time(time) => time.to_string().into_bytes(),
        }
    }

    fn to_time(&self) -> MysqlTime {
        match self {
            Value::Time(time) => *time,
            value => MysqlTime::parse(&value.to_text()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<Column>) -> Table {
        Table { name: name.to_owned(), columns, rows: vec![] }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Table {
        self.rows = rows;
        self
    }
}

/// Error code, SQLSTATE and message.
type SqlError = (u16, &'static str, String);

#[derive(Debug, Clone)]
enum Sql {
    Insert { table: String, params: usize },
    Select { table: String, columns: Vec<usize>, filter: Option<usize> },
    Delete { table: String },
}

#[derive(Debug)]
struct Prepared {
    sql: Sql,
    params: usize,
    types: Vec<(FieldType, bool)>,
    long_data: HashMap<u16, Vec<u8>>,
}

/// Scripted server side of a connection.
#[derive(Debug)]
pub struct Server {
    pub tables: HashMap<String, Table>,
    /// Command byte of every command received, in order.
    pub commands: Vec<u8>,
    pub closed: bool,
    deprecate_eof: bool,
    statements: HashMap<u32, Prepared>,
    next_id: u32,
    outbox: VecDeque<Bytes>,
    /// Packets answering the next command instead of the tables.
    reply: Option<Vec<Bytes>>,
    scratch: BytesMut,
}

impl Server {
    pub fn new(deprecate_eof: bool) -> Server {
        Server {
            tables: HashMap::new(),
            commands: vec![],
            closed: false,
            deprecate_eof,
            statements: HashMap::new(),
            next_id: 1,
            outbox: VecDeque::new(),
            reply: None,
            scratch: BytesMut::new(),
        }
    }

    pub fn table(&self, name: &str) -> &Table {
        &self.tables[name]
    }

    /// Number of statements prepared and not closed.
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    /// Packets queued and not yet received by the client.
    pub fn pending_packets(&self) -> usize {
        self.outbox.len()
    }

    /// Answer the next command with `packets`, whatever it is.
    pub fn reply_with(&mut self, packets: Vec<Bytes>) {
        self.reply = Some(packets);
    }

    pub fn count(&self, command: u8) -> usize {
        self.commands.iter().filter(|&&c| c == command).count()
    }

    fn handle(&mut self, mut packet: Bytes) {
        let command = packet.get_u8();
        self.commands.push(command);
        tracing::debug!(command, len = packet.len(), "server received");
        if let Some(reply) = self.reply.take() {
            self.outbox.extend(reply);
            return;
        }
        match command {
            COM_QUIT => self.closed = true,
            COM_PING => self.ok(0, 0),
            COM_QUERY => {
                let sql = String::from_utf8_lossy(&packet).into_owned();
                self.query(&sql);
            }
            COM_STMT_PREPARE => {
                let sql = String::from_utf8_lossy(&packet).into_owned();
                self.prepare(&sql);
            }
            COM_STMT_EXECUTE => self.execute(packet),
            COM_STMT_SEND_LONG_DATA => {
                let stmt_id = packet.get_u32_le();
                let param_id = packet.get_u16_le();
                if let Some(stmt) = self.statements.get_mut(&stmt_id) {
                    stmt.long_data.entry(param_id).or_default().extend_from_slice(&packet);
                }
            }
            COM_STMT_CLOSE => {
                let stmt_id = packet.get_u32_le();
                self.statements.remove(&stmt_id);
            }
            COM_STMT_RESET => {
                let stmt_id = packet.get_u32_le();
                match self.statements.get_mut(&stmt_id) {
                    Some(stmt) => {
                        stmt.long_data.clear();
                        self.ok(0, 0);
                    }
                    None => self.unknown_statement(stmt_id),
                }
            }
            _ => self.err(1047, "08S01", "Unknown command"),
        }
    }

    fn parse(&self, sql: &str) -> Result<Sql, SqlError> {
        let syntax = || -> SqlError {
            (1064, "42000", format!("You have an error in your SQL syntax near '{sql}'"))
        };
        let words = sql
            .trim()
            .trim_end_matches(';')
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>();
        let upper = words.iter().map(|w| w.to_ascii_uppercase()).collect::<Vec<_>>();
        let upper = upper.iter().map(String::as_str).collect::<Vec<_>>();

        match upper.as_slice() {
            ["INSERT", "INTO", _, "VALUES", params @ ..] => {
                if params.is_empty() || params.iter().any(|p| *p != "?") {
                    return Err(syntax());
                }
                let t = self.lookup(words[2])?;
                if t.columns.len() != params.len() {
                    return Err((1136, "21S01", "Column count doesn't match value count at row 1".into()));
                }
                Ok(Sql::Insert { table: t.name.clone(), params: params.len() })
            }
            ["DELETE", "FROM", _] => Ok(Sql::Delete { table: self.lookup(words[2])?.name.clone() }),
            ["SELECT", rest @ ..] => {
                let from = rest.iter().position(|w| *w == "FROM").ok_or_else(syntax)?;
                let names = &words[1..1 + from];
                let t = self.lookup(words.get(2 + from).ok_or_else(syntax)?)?;
                let find = |name: &str| -> Result<usize, SqlError> {
                    t.columns
                        .iter()
                        .position(|c| c.name() == name)
                        .ok_or_else(|| (1054, "42S22", format!("Unknown column '{name}' in 'field list'")))
                };
                let columns = match names {
                    ["*"] => (0..t.columns.len()).collect(),
                    [] => return Err(syntax()),
                    names => names.iter().map(|&n| find(n)).collect::<Result<_, _>>()?,
                };
                let filter = match &upper[3 + from..] {
                    [] => None,
                    ["WHERE", _, "=", "?"] => Some(find(words[4 + from])?),
                    _ => return Err(syntax()),
                };
                Ok(Sql::Select { table: t.name.clone(), columns, filter })
            }
            _ => Err(syntax()),
        }
    }

    fn lookup(&self, name: &str) -> Result<&Table, SqlError> {
        match self.tables.get(name) {
            Some(table) => Ok(table),
            None => Err((1146, "42S02", format!("Table 'test.{name}' doesn't exist"))),
        }
    }

    fn prepare(&mut self, sql: &str) {
        let parsed = match self.parse(sql) {
            Ok(ok) => ok,
            Err((code, state, message)) => return self.err(code, state, &message),
        };

        let (params, columns) = match &parsed {
            Sql::Insert { params, .. } => (*params, vec![]),
            Sql::Delete { .. } => (0, vec![]),
            Sql::Select { table, columns, filter } => {
                let t = &self.tables[table];
                (filter.is_some() as usize, columns.iter().map(|&i| t.columns[i].clone()).collect())
            }
        };

        let stmt_id = self.next_id;
        self.next_id += 1;

        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        buf.put_u32_le(stmt_id);
        buf.put_u16_le(columns.len() as u16);
        buf.put_u16_le(params as u16);
        buf.put_u8(0x00);
        buf.put_u16_le(0);
        self.outbox.push_back(buf.freeze());

        let param_defs = (0..params).map(|_| Column::new("?", FieldType::VarString, 0)).collect::<Vec<_>>();
        self.definitions(&param_defs);
        self.definitions(&columns);

        self.statements.insert(
            stmt_id,
            Prepared { sql: parsed, params, types: vec![], long_data: HashMap::new() },
        );
    }

    fn execute(&mut self, mut packet: Bytes) {
        let stmt_id = packet.get_u32_le();
        let _flags = packet.get_u8();
        let _iterations = packet.get_u32_le();

        let Some(stmt) = self.statements.get_mut(&stmt_id) else {
            return self.unknown_statement(stmt_id);
        };

        let mut params = Vec::with_capacity(stmt.params);
        if stmt.params > 0 {
            let bitmap = packet.split_to(stmt.params.div_ceil(8));
            if packet.get_u8() == 1 {
                stmt.types = (0..stmt.params)
                    .map(|_| {
                        let ty = FieldType::try_from(packet.get_u8()).unwrap();
                        (ty, packet.get_u8() & 0x80 != 0)
                    })
                    .collect();
            }
            if stmt.types.len() != stmt.params {
                stmt.long_data.clear();
                return self.err(1210, "HY000", "Incorrect arguments to mysqld_stmt_execute");
            }
            for (i, &(ty, unsigned)) in stmt.types.iter().enumerate() {
                if let Some(data) = stmt.long_data.remove(&(i as u16)) {
                    params.push(Value::Bytes(data));
                } else if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                    params.push(Value::Null);
                } else {
                    params.push(read_param(&mut packet, ty, unsigned));
                }
            }
        }
        stmt.long_data.clear();

        let sql = stmt.sql.clone();
        match sql {
            Sql::Insert { table, .. } => {
                let t = self.tables.get_mut(&table).unwrap();
                t.rows.push(params);
                let insert_id = t.rows.len() as u64;
                self.ok(1, insert_id);
            }
            Sql::Delete { table } => {
                let t = self.tables.get_mut(&table).unwrap();
                let affected = t.rows.len() as u64;
                t.rows.clear();
                self.ok(affected, 0);
            }
            Sql::Select { table, columns, filter } => {
                let t = self.tables[&table].clone();
                let defs = columns.iter().map(|&i| t.columns[i].clone()).collect::<Vec<_>>();
                let rows = select(&t, &columns, filter.zip(params.first()));

                let mut buf = BytesMut::new();
                put_lenenc_int(&mut buf, defs.len() as u64);
                self.outbox.push_back(buf.freeze());
                self.definitions(&defs);
                for row in rows {
                    self.outbox.push_back(binary_row(&defs, &row));
                }
                self.end();
            }
        }
    }

    fn query(&mut self, sql: &str) {
        let parsed = match self.parse(sql) {
            Ok(Sql::Insert { .. }) => return self.err(1064, "42000", "text INSERT not supported"),
            Ok(Sql::Select { filter: Some(_), .. }) => {
                return self.err(1064, "42000", "placeholder in text query");
            }
            Ok(ok) => ok,
            Err((code, state, message)) => return self.err(code, state, &message),
        };

        match parsed {
            Sql::Delete { table } => {
                let t = self.tables.get_mut(&table).unwrap();
                let affected = t.rows.len() as u64;
                t.rows.clear();
                self.ok(affected, 0);
            }
            Sql::Select { table, columns, .. } => {
                let t = self.tables[&table].clone();
                let defs = columns.iter().map(|&i| t.columns[i].clone()).collect::<Vec<_>>();

                let mut buf = BytesMut::new();
                put_lenenc_int(&mut buf, defs.len() as u64);
                self.outbox.push_back(buf.freeze());
                self.definitions(&defs);
                for row in select(&t, &columns, None) {
                    let mut buf = BytesMut::new();
                    for value in &row {
                        match value {
                            Value::Null => buf.put_u8(0xFB),
                            value => put_lenenc_bytes(&mut buf, &value.to_text()),
                        }
                    }
                    self.outbox.push_back(buf.freeze());
                }
                self.end();
            }
            Sql::Insert { .. } => unreachable!(),
        }
    }

    fn definitions(&mut self, columns: &[Column]) {
        for column in columns {
            self.outbox.push_back(column_definition(column));
        }
        if !columns.is_empty() && !self.deprecate_eof {
            self.eof();
        }
    }

    fn ok(&mut self, affected_rows: u64, insert_id: u64) {
        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        put_lenenc_int(&mut buf, affected_rows);
        put_lenenc_int(&mut buf, insert_id);
        buf.put_u16_le(STATUS_AUTOCOMMIT);
        buf.put_u16_le(0);
        self.outbox.push_back(buf.freeze());
    }

    fn eof(&mut self) {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFE);
        buf.put_u16_le(0);
        buf.put_u16_le(STATUS_AUTOCOMMIT);
        self.outbox.push_back(buf.freeze());
    }

    /// End of a result set.
    fn end(&mut self) {
        if !self.deprecate_eof {
            return self.eof();
        }
        let mut buf = BytesMut::new();
        buf.put_u8(0xFE);
        put_lenenc_int(&mut buf, 0);
        put_lenenc_int(&mut buf, 0);
        buf.put_u16_le(STATUS_AUTOCOMMIT);
        buf.put_u16_le(0);
        self.outbox.push_back(buf.freeze());
    }

    fn err(&mut self, code: u16, sqlstate: &str, message: &str) {
        tracing::debug!(code, sqlstate, message, "server error");
        let mut buf = BytesMut::new();
        buf.put_u8(0xFF);
        buf.put_u16_le(code);
        buf.put_u8(b'#');
        buf.put_slice(sqlstate.as_bytes());
        buf.put_slice(message.as_bytes());
        self.outbox.push_back(buf.freeze());
    }

    fn unknown_statement(&mut self, stmt_id: u32) {
        let message = format!("Unknown prepared statement handler ({stmt_id}) given to mysqld_stmt_execute");
        self.err(1243, "HY000", &message);
    }
}

impl Transport for Server {
    fn send<C: ClientCommand>(&mut self, command: C) {
        self.scratch.clear();
        command::write(command, &mut self.scratch);
        let packet = self.scratch.split().freeze();
        self.handle(packet);
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn recv(&mut self) -> mystmt::Result<Bytes> {
        match self.outbox.pop_front() {
            Some(packet) => Ok(packet),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }
}

fn select(table: &Table, columns: &[usize], filter: Option<(usize, &Value)>) -> Vec<Vec<Value>> {
    table
        .rows
        .iter()
        .filter(|row| match filter {
            Some((col, value)) => row[col].to_text() == value.to_text() && row[col] != Value::Null,
            None => true,
        })
        .map(|row| columns.iter().map(|&i| row[i].clone()).collect())
        .collect()
}

fn read_param(packet: &mut Bytes, ty: FieldType, unsigned: bool) -> Value {
    match ty {
        FieldType::Null => Value::Null,
        FieldType::Tiny => match unsigned {
            true => Value::UInt(packet.get_u8() as u64),
            false => Value::Int(packet.get_i8() as i64),
        },
        FieldType::Short | FieldType::Year => match unsigned {
            true => Value::UInt(packet.get_u16_le() as u64),
            false => Value::Int(packet.get_i16_le() as i64),
        },
        FieldType::Long | FieldType::Int24 => match unsigned {
            true => Value::UInt(packet.get_u32_le() as u64),
            false => Value::Int(packet.get_i32_le() as i64),
        },
        FieldType::LongLong => match unsigned {
            true => Value::UInt(packet.get_u64_le()),
            false => Value::Int(packet.get_i64_le()),
        },
        FieldType::Float => Value::Double(packet.get_f32_le() as f64),
        FieldType::Double => Value::Double(packet.get_f64_le()),
        FieldType::Date | FieldType::Time | FieldType::DateTime | FieldType::Timestamp => {
            let len = packet.get_u8() as usize;
            let value = packet.split_to(len);
            Value::Time(MysqlTime::decode_binary(ty, &value).unwrap())
        }
        _ => Value::Bytes(get_lenenc_bytes(packet).to_vec()),
    }
}

fn binary_row(columns: &[Column], row: &[Value]) -> Bytes {
    let mut bitmap = vec![0u8; (columns.len() + 9) / 8];
    let mut values = BytesMut::new();

    for (i, (column, value)) in columns.iter().zip(row).enumerate() {
        if *value == Value::Null {
            let bit = i + 2;
            bitmap[bit / 8] |= 1 << (bit % 8);
            continue;
        }
        let ty = column.field_type();
        match ty {
            FieldType::Tiny | FieldType::Short | FieldType::Year | FieldType::Long
            | FieldType::Int24 | FieldType::LongLong => {
                let width = ty.pack_len().unwrap();
                values.put_slice(&value.to_i64().to_le_bytes()[..width]);
            }
            FieldType::Float => values.put_f32_le(value.to_f64() as f32),
            FieldType::Double => values.put_f64_le(value.to_f64()),
            FieldType::Date | FieldType::Time | FieldType::DateTime | FieldType::Timestamp => {
                put_time(&mut values, ty, &value.to_time());
            }
            _ => put_lenenc_bytes(&mut values, &value.to_text()),
        }
    }

    let mut buf = BytesMut::new();
    buf.put_u8(0x00);
    buf.put_slice(&bitmap);
    buf.put_slice(&values);
    buf.freeze()
}

fn put_time(buf: &mut BytesMut, ty: FieldType, time: &MysqlTime) {
    if ty == FieldType::Time {
        let len = if time.microsecond != 0 { 12 } else { 8 };
        buf.put_u8(len);
        buf.put_u8(time.negative as u8);
        buf.put_u32_le(time.hour / 24);
        buf.put_u8((time.hour % 24) as u8);
        buf.put_u8(time.minute);
        buf.put_u8(time.second);
        if len == 12 {
            buf.put_u32_le(time.microsecond);
        }
        return;
    }
    let len = match (ty, time.microsecond) {
        (FieldType::Date, _) => 4,
        (_, 0) => 7,
        _ => 11,
    };
    buf.put_u8(len);
    buf.put_u16_le(time.year);
    buf.put_u8(time.month);
    buf.put_u8(time.day);
    if len > 4 {
        buf.put_u8(time.hour as u8);
        buf.put_u8(time.minute);
        buf.put_u8(time.second);
    }
    if len > 7 {
        buf.put_u32_le(time.microsecond);
    }
}

fn column_definition(column: &Column) -> Bytes {
    let mut buf = BytesMut::new();
    for s in [
        column.catalog(),
        column.database(),
        column.table(),
        column.org_table(),
        column.name(),
        column.org_name(),
    ] {
        put_lenenc_bytes(&mut buf, s.as_bytes());
    }
    buf.put_u8(0x0C);
    buf.put_u16_le(column.charset());
    buf.put_u32_le(column.length());
    buf.put_u8(column.field_type().tag());
    buf.put_u16_le(column.flags().0);
    buf.put_u8(column.decimals());
    buf.put_u16_le(0);
    buf.freeze()
}

fn put_lenenc_int(buf: &mut BytesMut, value: u64) {
    match value {
        0..0xFB => buf.put_u8(value as u8),
        0xFB..0x1_0000 => {
            buf.put_u8(0xFC);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..0x100_0000 => {
            buf.put_u8(0xFD);
            buf.put_uint_le(value, 3);
        }
        _ => {
            buf.put_u8(0xFE);
            buf.put_u64_le(value);
        }
    }
}

fn put_lenenc_bytes(buf: &mut BytesMut, value: &[u8]) {
    put_lenenc_int(buf, value.len() as u64);
    buf.put_slice(value);
}

fn get_lenenc_bytes(buf: &mut Bytes) -> Bytes {
    let len = match buf.get_u8() {
        0xFC => buf.get_u16_le() as usize,
        0xFD => buf.get_uint_le(3) as usize,
        0xFE => buf.get_u64_le() as usize,
        len => len as usize,
    };
    buf.split_to(len)
}

/// Flags of an unsigned column.
pub const UNSIGNED: u16 = ColumnFlags::UNSIGNED;
