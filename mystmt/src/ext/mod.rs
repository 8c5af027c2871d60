use bytes::{Buf, BufMut, Bytes};

use crate::{common::ByteStr, protocol::ProtocolError};

/// Marker byte of a length encoded integer followed by 2 bytes.
const LENENC_U16: u8 = 0xFC;
/// Marker byte of a length encoded integer followed by 3 bytes.
const LENENC_U24: u8 = 0xFD;
/// Marker byte of a length encoded integer followed by 8 bytes.
const LENENC_U64: u8 = 0xFE;
/// Marker byte of a `NULL` in text protocol rows.
pub const LENENC_NULL: u8 = 0xFB;

/// Integer width conversion for protocol fields.
pub trait UsizeExt {
    /// Length is `usize` in rust, while mysql sometime want `u32`,
    /// this will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
    /// Length is `usize` in rust, while mysql sometime want `u16`,
    /// this will panic when overflow instead of wrapping.
    fn to_u16(self) -> u16;
}

/// Length encoded operation in [`BufMut`].
pub trait BufMutExt {
    /// Write a length encoded integer.
    fn put_lenenc_int(&mut self, value: u64);

    /// Write a length encoded string, the length followed by the bytes.
    fn put_lenenc_bytes(&mut self, value: &[u8]);
}

/// Checked read operation on received [`Bytes`].
///
/// Every method fails with [`ProtocolError::Malformed`] instead of panicking
/// when the packet is shorter than the field.
pub trait BytesExt {
    fn need(&self, len: usize, phase: &'static str) -> Result<(), ProtocolError>;

    fn try_u8(&mut self, phase: &'static str) -> Result<u8, ProtocolError>;

    fn try_u16_le(&mut self, phase: &'static str) -> Result<u16, ProtocolError>;

    fn try_u32_le(&mut self, phase: &'static str) -> Result<u32, ProtocolError>;

    /// Read a length encoded integer.
    fn get_lenenc_int(&mut self, phase: &'static str) -> Result<u64, ProtocolError>;

    /// Read a length encoded string as bytes.
    fn get_lenenc_bytes(&mut self, phase: &'static str) -> Result<Bytes, ProtocolError>;

    /// Read a length encoded string as [`ByteStr`].
    fn get_lenenc_bytestr(&mut self, phase: &'static str) -> Result<ByteStr, ProtocolError>;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_u16(self) -> u16 {
        self.try_into().expect("message size too large for protocol")
    }
}

/// Size of a length encoded integer.
pub fn lenenc_int_len(value: u64) -> usize {
    match value {
        ..0xFB => 1,
        ..0x1_0000 => 3,
        ..0x100_0000 => 4,
        _ => 9,
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_lenenc_int(&mut self, value: u64) {
        match value {
            ..0xFB => self.put_u8(value as u8),
            ..0x1_0000 => {
                self.put_u8(LENENC_U16);
                self.put_u16_le(value as u16);
            }
            ..0x100_0000 => {
                self.put_u8(LENENC_U24);
                self.put_uint_le(value, 3);
            }
            _ => {
                self.put_u8(LENENC_U64);
                self.put_u64_le(value);
            }
        }
    }

    fn put_lenenc_bytes(&mut self, value: &[u8]) {
        self.put_lenenc_int(value.len() as u64);
        self.put_slice(value);
    }
}

impl BytesExt for Bytes {
    fn need(&self, len: usize, phase: &'static str) -> Result<(), ProtocolError> {
        match self.remaining() < len {
            true => Err(ProtocolError::malformed(phase)),
            false => Ok(()),
        }
    }

    fn try_u8(&mut self, phase: &'static str) -> Result<u8, ProtocolError> {
        self.need(1, phase)?;
        Ok(self.get_u8())
    }

    fn try_u16_le(&mut self, phase: &'static str) -> Result<u16, ProtocolError> {
        self.need(2, phase)?;
        Ok(self.get_u16_le())
    }

    fn try_u32_le(&mut self, phase: &'static str) -> Result<u32, ProtocolError> {
        self.need(4, phase)?;
        Ok(self.get_u32_le())
    }

    fn get_lenenc_int(&mut self, phase: &'static str) -> Result<u64, ProtocolError> {
        let width = match self.try_u8(phase)? {
            b @ ..0xFB => return Ok(b as u64),
            LENENC_U16 => 2,
            LENENC_U24 => 3,
            LENENC_U64 => 8,
            _ => return Err(ProtocolError::malformed(phase)),
        };
        self.need(width, phase)?;
        Ok(self.get_uint_le(width))
    }

    fn get_lenenc_bytes(&mut self, phase: &'static str) -> Result<Bytes, ProtocolError> {
        let len = self.get_lenenc_int(phase)?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::malformed(phase))?;
        self.need(len, phase)?;
        Ok(self.split_to(len))
    }

    fn get_lenenc_bytestr(&mut self, phase: &'static str) -> Result<ByteStr, ProtocolError> {
        let bytes = self.get_lenenc_bytes(phase)?;
        ByteStr::from_utf8(bytes).map_err(|_| ProtocolError::malformed(phase))
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}
