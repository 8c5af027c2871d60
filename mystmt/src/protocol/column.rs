use bytes::{Buf, Bytes};

use super::{ColumnFlags, FieldType, ProtocolError};
use crate::{common::ByteStr, ext::BytesExt};

/// Column definition, as sent with result sets and prepare responses.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_query_response_text_resultset_column_definition.html>
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    catalog: ByteStr,
    schema: ByteStr,
    table: ByteStr,
    org_table: ByteStr,
    name: ByteStr,
    org_name: ByteStr,
    charset: u16,
    length: u32,
    max_length: u64,
    field_type: FieldType,
    flags: ColumnFlags,
    decimals: u8,
    default: Option<Bytes>,
}

const PHASE: &str = "column definition";

impl ColumnDefinition {
    /// Decode `Protocol::ColumnDefinition41`.
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let catalog = body.get_lenenc_bytestr(PHASE)?;
        let schema = body.get_lenenc_bytestr(PHASE)?;
        let table = body.get_lenenc_bytestr(PHASE)?;
        let org_table = body.get_lenenc_bytestr(PHASE)?;
        let name = body.get_lenenc_bytestr(PHASE)?;
        let org_name = body.get_lenenc_bytestr(PHASE)?;

        // length of fixed length fields, always 0x0C
        let fixed = usize::try_from(body.get_lenenc_int(PHASE)?)
            .map_err(|_| ProtocolError::malformed(PHASE))?;
        if fixed < 12 {
            return Err(ProtocolError::malformed(PHASE));
        }
        body.need(fixed, PHASE)?;
        let mut fields = body.split_to(fixed);

        let charset = fields.get_u16_le();
        let length = fields.get_u32_le();
        let field_type = FieldType::try_from(fields.get_u8())?;
        let flags = ColumnFlags(fields.get_u16_le());
        let decimals = fields.get_u8();

        // only sent for `COM_FIELD_LIST`
        let default = match body.is_empty() {
            true => None,
            false => Some(body.get_lenenc_bytes(PHASE)?),
        };

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            charset,
            length,
            max_length: 0,
            field_type,
            flags,
            decimals,
            default,
        })
    }

    /// Create column definition without any origin information.
    pub fn new(name: impl Into<ByteStr>, field_type: FieldType, flags: u16) -> Self {
        Self {
            catalog: ByteStr::from_static("def"),
            schema: ByteStr::default(),
            table: ByteStr::default(),
            org_table: ByteStr::default(),
            name: name.into(),
            org_name: ByteStr::default(),
            charset: 63,
            length: 0,
            max_length: 0,
            field_type,
            flags: ColumnFlags(flags),
            decimals: 0,
            default: None,
        }
    }

    /// Column name or alias.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column name in the table.
    pub fn org_name(&self) -> &str {
        &self.org_name
    }

    /// Table name or alias.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table name in the database.
    pub fn org_table(&self) -> &str {
        &self.org_table
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.schema
    }

    /// Catalog name, always `"def"`.
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn charset(&self) -> u16 {
        self.charset
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Declared column length.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Longest value in a stored result.
    ///
    /// Zero unless [`StmtAttr::UpdateMaxLength`][crate::StmtAttr] is set and
    /// the result was stored.
    pub fn max_length(&self) -> u64 {
        self.max_length
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    /// Number of decimal digits.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Default value, only sent by the server when listing fields.
    pub fn default_value(&self) -> Option<&[u8]> {
        self.default.as_deref()
    }

    pub fn is_nullable(&self) -> bool {
        !self.flags.contains(ColumnFlags::NOT_NULL)
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.is_unsigned()
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(ColumnFlags::PRIMARY_KEY)
    }

    pub fn is_unique_key(&self) -> bool {
        self.flags.contains(ColumnFlags::UNIQUE_KEY)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.flags.contains(ColumnFlags::AUTO_INCREMENT)
    }

    pub(crate) fn set_max_length(&mut self, value: u64) {
        self.max_length = value;
    }

    /// Set the declared length and decimals.
    pub fn with_length(mut self, length: u32, decimals: u8) -> Self {
        self.length = length;
        self.decimals = decimals;
        self
    }
}
