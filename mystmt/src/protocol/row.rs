use bytes::{Buf, Bytes};

use super::{ColumnDefinition, FieldType, ProtocolError};
use crate::ext::{BytesExt, LENENC_NULL};

const PHASE: &str = "binary row";

/// Size of one binary protocol value, length prefix included.
///
/// Returns the prefix length and the value length.
pub fn value_len(ty: FieldType, buf: &[u8]) -> Result<(usize, usize), ProtocolError> {
    if let Some(len) = ty.pack_len() {
        return Ok((0, len));
    }
    if ty.is_temporal() {
        let len = *buf.first().ok_or(ProtocolError::malformed(PHASE))?;
        return Ok((1, len as usize));
    }
    let (prefix, len) = match buf.first() {
        Some(&b @ ..0xFB) => (1, b as u64),
        Some(0xFC) if buf.len() >= 3 => (3, u16::from_le_bytes([buf[1], buf[2]]) as u64),
        Some(0xFD) if buf.len() >= 4 => (4, u32::from_le_bytes([buf[1], buf[2], buf[3], 0]) as u64),
        Some(0xFE) if buf.len() >= 9 => {
            let mut len = [0u8; 8];
            len.copy_from_slice(&buf[1..9]);
            (9, u64::from_le_bytes(len))
        }
        _ => return Err(ProtocolError::malformed(PHASE)),
    };
    let len = usize::try_from(len).map_err(|_| ProtocolError::malformed(PHASE))?;
    Ok((prefix, len))
}

/// A row in the binary protocol.
///
/// Each value holds the bytes of the value without its length prefix, a
/// `NULL` is [`None`]. A zero length string is `Some` of empty bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRow {
    values: Vec<Option<Bytes>>,
}

impl BinaryRow {
    /// Decode `ProtocolBinary::ResultsetRow`.
    ///
    /// The null bitmap is offset by two bits.
    pub fn decode(mut body: Bytes, columns: &[ColumnDefinition]) -> Result<Self, ProtocolError> {
        match body.try_u8(PHASE)? {
            0x00 => { },
            found => return Err(ProtocolError::unexpected(found, PHASE)),
        }

        let bitmap_len = (columns.len() + 7 + 2) / 8;
        body.need(bitmap_len, PHASE)?;
        let bitmap = body.split_to(bitmap_len);

        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let bit = i + 2;
            if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
                values.push(None);
                continue;
            }
            let (prefix, len) = value_len(column.field_type(), &body)?;
            let total = prefix.checked_add(len).ok_or(ProtocolError::malformed(PHASE))?;
            body.need(total, PHASE)?;
            body.advance(prefix);
            values.push(Some(body.split_to(len)));
        }

        Ok(Self { values })
    }

    pub fn from_values(values: Vec<Option<Bytes>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `index`, outer [`None`] when out of bounds.
    pub fn get(&self, index: usize) -> Option<Option<&Bytes>> {
        self.values.get(index).map(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Bytes>] {
        &self.values
    }
}

/// A row in the text protocol, every value is a length encoded string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRow {
    values: Vec<Option<Bytes>>,
}

impl TextRow {
    /// Decode `ProtocolText::ResultsetRow`.
    pub fn decode(mut body: Bytes, column_len: usize) -> Result<Self, ProtocolError> {
        let mut values = Vec::with_capacity(column_len);
        for _ in 0..column_len {
            if body.first() == Some(&LENENC_NULL) {
                body.advance(1);
                values.push(None);
            } else {
                values.push(Some(body.get_lenenc_bytes("text row")?));
            }
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `index`, outer [`None`] when out of bounds.
    pub fn get(&self, index: usize) -> Option<Option<&[u8]>> {
        self.values.get(index).map(Option::as_deref)
    }

    pub fn into_values(self) -> Vec<Option<Bytes>> {
        self.values
    }
}
