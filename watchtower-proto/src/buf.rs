//! Checked readers and writers for the primitive protocol types.
//!
//! Everything on the wire is big endian. Variable-length integers use the
//! 7-bit little-endian group encoding with the high bit as continuation.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::error::{ProtoError, Result};

/// Longest string the protocol allows, in UTF-16 code units.
pub const MAX_STRING_CHARS: usize = 32767;

const VARINT_MAX_BYTES: usize = 5;

/// Reads protocol primitives from any [`Buf`], failing instead of panicking
/// when the packet is shorter than the field being read.
pub trait McRead: Buf {
  fn need(&self, len: usize) -> Result<()> {
    if self.remaining() < len {
      return Err(ProtoError::Truncated {
        needed: len,
        remaining: self.remaining(),
      });
    }
    Ok(())
  }

  fn read_varint(&mut self) -> Result<i32> {
    let mut value: u32 = 0;
    for group in 0..VARINT_MAX_BYTES {
      self.need(1)?;
      let byte = self.get_u8();
      value |= u32::from(byte & 0x7f) << (7 * group);
      if byte & 0x80 == 0 {
        return Ok(value as i32);
      }
    }
    Err(ProtoError::VarIntTooLong(VARINT_MAX_BYTES))
  }

  fn read_string(&mut self) -> Result<String> {
    let len = self.read_varint()?;
    // Each UTF-16 unit encodes to at most 3 UTF-8 bytes.
    let len = usize::try_from(len)
      .ok()
      .filter(|len| *len <= MAX_STRING_CHARS * 3)
      .ok_or_else(|| ProtoError::InvalidString(format!("bad length {len}")))?;
    self.need(len)?;
    let raw = self.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|e| ProtoError::InvalidString(e.to_string()))
  }

  fn read_uuid(&mut self) -> Result<Uuid> {
    self.need(16)?;
    Ok(Uuid::from_u128(self.get_u128()))
  }

  fn read_bool(&mut self) -> Result<bool> {
    Ok(self.read_u8()? != 0)
  }

  fn read_u8(&mut self) -> Result<u8> {
    self.need(1)?;
    Ok(self.get_u8())
  }

  fn read_i16(&mut self) -> Result<i16> {
    self.need(2)?;
    Ok(self.get_i16())
  }

  fn read_i32(&mut self) -> Result<i32> {
    self.need(4)?;
    Ok(self.get_i32())
  }

  fn read_i64(&mut self) -> Result<i64> {
    self.need(8)?;
    Ok(self.get_i64())
  }

  fn read_f32(&mut self) -> Result<f32> {
    self.need(4)?;
    Ok(self.get_f32())
  }

  fn read_f64(&mut self) -> Result<f64> {
    self.need(8)?;
    Ok(self.get_f64())
  }

  /// Skips a VarInt-prefixed byte array.
  fn skip_byte_array(&mut self) -> Result<()> {
    let len = self.read_varint()?;
    let len = usize::try_from(len).map_err(|_| ProtoError::Truncated {
      needed: 0,
      remaining: self.remaining(),
    })?;
    self.skip(len)
  }

  fn skip(&mut self, len: usize) -> Result<()> {
    self.need(len)?;
    self.advance(len);
    Ok(())
  }
}

impl<B: Buf + ?Sized> McRead for B {}

/// Writes protocol primitives into any [`BufMut`].
pub trait McWrite: BufMut {
  fn write_varint(&mut self, value: i32) {
    let mut value = value as u32;
    loop {
      if value & !0x7f == 0 {
        self.put_u8(value as u8);
        return;
      }
      self.put_u8((value & 0x7f) as u8 | 0x80);
      value >>= 7;
    }
  }

  fn write_string(&mut self, value: &str) {
    self.write_varint(value.len() as i32);
    self.put_slice(value.as_bytes());
  }

  fn write_uuid(&mut self, value: Uuid) {
    self.put_u128(value.as_u128());
  }

  fn write_bool(&mut self, value: bool) {
    self.put_u8(u8::from(value));
  }
}

impl<B: BufMut + ?Sized> McWrite for B {}

/// Number of bytes `value` occupies as a VarInt.
pub fn varint_len(value: i32) -> usize {
  let value = value as u32;
  match value {
    0..=0x7f => 1,
    0x80..=0x3fff => 2,
    0x4000..=0x1f_ffff => 3,
    0x20_0000..=0x0fff_ffff => 4,
    _ => 5,
  }
}
