//! Parameter encoding.
//!
//! A [`Param`] is encoded once, when parameters are bound. The execute
//! packet is then written from the [`Encoded`] copy.
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    bind::{Param, UnsupportedConversion, Value},
    ext::BufMutExt,
    protocol::FieldType,
};

/// Parameter in its wire form.
#[derive(Debug, Clone)]
pub struct Encoded {
    ty: FieldType,
    unsigned: bool,
    is_null: bool,
    /// Value with its length prefix, if any.
    value: Bytes,
    /// Length of the prefix in `value`.
    prefix: usize,
    long_data: bool,
}

impl Encoded {
    /// Encode a parameter.
    ///
    /// Returns [`UnsupportedConversion`] if the parameter type can not be
    /// sent, or if the value does not fit the declared type.
    pub fn new(param: &Param) -> Result<Encoded, UnsupportedConversion> {
        let ty = param.ty;
        let unsupported = || UnsupportedConversion::param(ty);

        if !is_param_type(ty) {
            return Err(unsupported());
        }

        let mut me = Encoded {
            ty,
            unsigned: param.unsigned,
            is_null: param.is_null(),
            value: Bytes::new(),
            prefix: 0,
            long_data: false,
        };

        if me.is_null {
            return Ok(me);
        }

        let mut buf = BytesMut::new();
        match (param.value, ty.pack_len()) {
            (Value::Int(int), Some(width)) if ty.is_integer() => {
                buf.put_slice(&int.to_le_bytes()[..width]);
            }
            (Value::UInt(int), Some(width)) if ty.is_integer() => {
                buf.put_slice(&int.to_le_bytes()[..width]);
            }
            (Value::Float(float), _) if ty == FieldType::Float => buf.put_f32_le(float),
            (Value::Double(double), _) if ty == FieldType::Double => buf.put_f64_le(double),
            (Value::Time(time), _) if ty.is_temporal() => time.encode_binary(ty, &mut buf),
            (Value::Bytes(bytes), _) if ty.is_var_len() => {
                let len = param.length.map_or(bytes.len(), |len| len.min(bytes.len()));
                buf.put_lenenc_bytes(&bytes[..len]);
                me.prefix = buf.len() - len;
            }
            _ => return Err(unsupported()),
        }

        me.value = buf.freeze();
        Ok(me)
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    /// Returns `true` if the parameter is sent as `NULL`.
    ///
    /// Long data takes precedence over the null flag.
    pub fn is_null(&self) -> bool {
        self.is_null && !self.long_data
    }

    /// Returns `true` if the value was sent with long data.
    pub fn is_long_data(&self) -> bool {
        self.long_data
    }

    /// Length of the value in the execute packet.
    pub fn wire_len(&self) -> usize {
        match self.is_null || self.long_data {
            true => 0,
            false => self.value.len(),
        }
    }

    /// Write the value of the execute packet.
    ///
    /// Nothing is written for `NULL` and long data parameters.
    pub fn write_value(&self, buf: &mut impl BufMut) {
        if !(self.is_null || self.long_data) {
            buf.put_slice(&self.value);
        }
    }

    /// Value without its length prefix, empty for `NULL`.
    pub fn content(&self) -> Bytes {
        self.value.slice(self.prefix..)
    }

    pub(crate) fn set_long_data(&mut self, long_data: bool) {
        self.long_data = long_data;
    }
}

/// Types a parameter can be declared as.
fn is_param_type(ty: FieldType) -> bool {
    use FieldType::*;
    matches!(
        ty,
        Null | Tiny | Short | Year | Long | LongLong | Float | Double
            | Time | Date | DateTime | Timestamp
            | TinyBlob | MediumBlob | LongBlob | Blob
            | VarChar | VarString | String | Json
            | Decimal | NewDecimal
    )
}
