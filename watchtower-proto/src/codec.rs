//! Packet framing for a Minecraft connection.
//!
//! Every packet is prefixed by its length as a VarInt of at most three bytes.
//! Once the server enables compression, the frame body starts with a second
//! VarInt holding the uncompressed size (zero when the payload was stored
//! as-is) followed by a zlib stream.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tokio_util::codec::{Decoder, Encoder};

use crate::buf::{McRead, McWrite, varint_len};
use crate::error::ProtoError;

/// Largest frame expressible with a three byte length prefix.
pub const MAX_FRAME_LEN: usize = (1 << 21) - 1;

/// Largest payload a compressed frame may inflate to.
pub const MAX_UNCOMPRESSED_LEN: usize = 1 << 23;

const FRAME_PREFIX_MAX_BYTES: usize = 3;

/// A packet id with its undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub body: Bytes,
}

impl RawPacket {
    pub fn new(id: i32, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PacketCodec {
    compression_threshold: Option<usize>,
}

impl PacketCodec {
    /// Applies a Set Compression threshold. Negative values disable compression.
    pub fn set_compression(&mut self, threshold: i32) {
        self.compression_threshold = usize::try_from(threshold).ok();
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.compression_threshold
    }
}

/// Reads the frame length without consuming it. `None` means more bytes are needed.
fn peek_frame_len(src: &[u8]) -> Result<Option<(usize, usize)>, ProtoError> {
    let mut value = 0usize;
    for (i, byte) in src.iter().take(FRAME_PREFIX_MAX_BYTES).enumerate() {
        value |= usize::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if src.len() >= FRAME_PREFIX_MAX_BYTES {
        return Err(ProtoError::VarIntTooLong(FRAME_PREFIX_MAX_BYTES));
    }
    Ok(None)
}

fn inflate(compressed: &[u8], declared: i32) -> Result<Bytes, ProtoError> {
    let declared = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= MAX_UNCOMPRESSED_LEN)
        .ok_or(ProtoError::FrameTooLarge(declared.max(0) as usize))?;

    let mut inflated = Vec::with_capacity(declared);
    ZlibDecoder::new(compressed)
        .take(declared as u64 + 1)
        .read_to_end(&mut inflated)?;

    if inflated.len() != declared {
        return Err(ProtoError::DecompressedSize {
            declared,
            actual: inflated.len(),
        });
    }
    Ok(Bytes::from(inflated))
}

impl Decoder for PacketCodec {
    type Item = RawPacket;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RawPacket>, ProtoError> {
        let Some((len, prefix)) = peek_frame_len(src)? else {
            return Ok(None);
        };
        if src.len() < prefix + len {
            src.reserve(prefix + len - src.len());
            return Ok(None);
        }

        src.advance(prefix);
        let mut frame = src.split_to(len).freeze();
        let mut payload = match self.compression_threshold {
            None => frame,
            Some(_) => {
                let data_len = frame.read_varint()?;
                if data_len == 0 {
                    frame
                } else {
                    inflate(&frame, data_len)?
                }
            }
        };

        let id = payload.read_varint()?;
        Ok(Some(RawPacket { id, body: payload }))
    }
}

impl Encoder<RawPacket> for PacketCodec {
    type Error = ProtoError;

    fn encode(&mut self, packet: RawPacket, dst: &mut BytesMut) -> Result<(), ProtoError> {
        let mut payload = BytesMut::with_capacity(varint_len(packet.id) + packet.body.len());
        payload.write_varint(packet.id);
        payload.put_slice(&packet.body);

        let frame = match self.compression_threshold {
            None => payload,
            Some(threshold) if payload.len() < threshold => {
                let mut frame = BytesMut::with_capacity(1 + payload.len());
                frame.write_varint(0);
                frame.put_slice(&payload);
                frame
            }
            Some(_) => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&payload)?;
                let compressed = encoder.finish()?;
                let mut frame = BytesMut::with_capacity(5 + compressed.len());
                frame.write_varint(payload.len() as i32);
                frame.put_slice(&compressed);
                frame
            }
        };

        if frame.len() > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge(frame.len()));
        }
        dst.reserve(varint_len(frame.len() as i32) + frame.len());
        dst.write_varint(frame.len() as i32);
        dst.put_slice(&frame);
        Ok(())
    }
}
