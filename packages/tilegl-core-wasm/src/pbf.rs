// Minimal protobuf wire-format reader over a borrowed byte slice.
// Only what vector tiles need: varints, zig-zag varints, fixed 32/64 bit
// values, length-delimited fields, and skipping by wire type.

use crate::error::DecodeError;

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_FIXED64: u8 = 1;
pub const WIRE_BYTES: u8 = 2;
pub const WIRE_FIXED32: u8 = 5;

/// Cursor over protobuf bytes. `pos` is public so callers can record offsets
/// (a feature's geometry) and come back to them later.
#[derive(Debug, Clone)]
pub struct Pbf<'a> {
    buf: &'a [u8],
    pub pos: usize,
}

impl<'a> Pbf<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Pbf { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Pbf { buf, pos }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut result: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = *self.buf.get(self.pos).ok_or(DecodeError::Truncated(self.pos))?;
            self.pos += 1;
            if shift == 63 && byte > 1 {
                return Err(DecodeError::MalformedVarint(start));
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::MalformedVarint(start))
    }

    /// Varints that must fit in 32 bits (command integers, indices).
    pub fn read_varint32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| DecodeError::MalformedVarint(start))
    }

    pub fn read_svarint(&mut self) -> Result<i64, DecodeError> {
        let n = self.read_varint()?;
        Ok(zigzag_decode(n))
    }

    /// Reads a field header, returning `(field_number, wire_type)`.
    pub fn read_tag(&mut self) -> Result<(u64, u8), DecodeError> {
        let val = self.read_varint()?;
        Ok((val >> 3, (val & 0x7) as u8))
    }

    /// Reads a length prefix and returns the absolute end offset of the payload.
    pub fn read_len_end(&mut self) -> Result<usize, DecodeError> {
        let len_pos = self.pos;
        let len = self.read_varint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .ok_or(DecodeError::MalformedVarint(len_pos))?;
        if end > self.buf.len() {
            return Err(DecodeError::Truncated(self.buf.len()));
        }
        Ok(end)
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let end = self.read_len_end()?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidString(start))
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let slice = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated(self.buf.len()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    pub fn read_float(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }

    /// Skips one field's payload according to its wire type.
    pub fn skip(&mut self, wire_type: u8) -> Result<(), DecodeError> {
        match wire_type {
            WIRE_VARINT => {
                self.read_varint()?;
            }
            WIRE_FIXED64 => self.advance(8)?,
            WIRE_BYTES => {
                self.pos = self.read_len_end()?;
            }
            WIRE_FIXED32 => self.advance(4)?,
            other => {
                return Err(DecodeError::UnknownWireType {
                    wire_type: u64::from(other),
                    pos: self.pos,
                })
            }
        }
        Ok(())
    }

    fn advance(&mut self, n: usize) -> Result<(), DecodeError> {
        if self.pos + n > self.buf.len() {
            return Err(DecodeError::Truncated(self.buf.len()));
        }
        self.pos += n;
        Ok(())
    }
}

#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
