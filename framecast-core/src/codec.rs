//! Datagram codec built on `tokio_util::codec`.
//!
//! One UDP datagram is one message. Outgoing messages go through the
//! [`Encoder`] impls; incoming chunks are validated by
//! [`DatagramCodec::decode_chunk`] in the order the receiver relies on:
//! length, tag, declared chunk size, exact datagram length.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::error::FramecastError;
use crate::wire::{ChunkHeader, ControlSample, MAX_CHUNK_PAYLOAD};

// ── OutgoingChunk ─────────────────────────────────────────────────

/// A chunk about to be sent; borrows its payload from the raster.
#[derive(Debug, Clone, Copy)]
pub struct OutgoingChunk<'a> {
    pub header: ChunkHeader,
    pub payload: &'a [u8],
}

// ── DatagramCodec ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DatagramCodec {
    max_chunk_payload: usize,
}

impl DatagramCodec {
    pub fn new() -> Self {
        Self::with_max_chunk_payload(MAX_CHUNK_PAYLOAD)
    }

    pub fn with_max_chunk_payload(max_chunk_payload: usize) -> Self {
        Self { max_chunk_payload }
    }

    /// Validate a chunk datagram and split it into header and payload.
    pub fn decode_chunk<'a>(
        &self,
        datagram: &'a [u8],
    ) -> Result<(ChunkHeader, &'a [u8]), FramecastError> {
        let header = ChunkHeader::decode(datagram)?;
        let size = header.chunk_size as usize;
        if size > self.max_chunk_payload {
            return Err(FramecastError::ChunkTooLarge {
                size,
                max: self.max_chunk_payload,
            });
        }
        let expected = ChunkHeader::SIZE + size;
        if datagram.len() != expected {
            return Err(FramecastError::LengthMismatch {
                expected,
                actual: datagram.len(),
            });
        }
        Ok((header, &datagram[ChunkHeader::SIZE..]))
    }

    /// Receive buffer size large enough for any acceptable datagram, plus
    /// one byte so oversized datagrams show up as a length mismatch.
    pub fn recv_buffer_len(&self) -> usize {
        ChunkHeader::SIZE + self.max_chunk_payload + 1
    }
}

impl Default for DatagramCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<OutgoingChunk<'_>> for DatagramCodec {
    type Error = FramecastError;

    fn encode(&mut self, item: OutgoingChunk<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() != item.header.chunk_size as usize {
            return Err(FramecastError::LengthMismatch {
                expected: item.header.chunk_size as usize,
                actual: item.payload.len(),
            });
        }
        dst.reserve(ChunkHeader::SIZE + item.payload.len());
        item.header.encode(dst);
        dst.put_slice(item.payload);
        Ok(())
    }
}

impl Encoder<ControlSample> for DatagramCodec {
    type Error = FramecastError;

    fn encode(&mut self, item: ControlSample, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(ControlSample::SIZE);
        item.encode(dst);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
