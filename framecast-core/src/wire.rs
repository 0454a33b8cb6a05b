//! Wire format shared by sender and receiver.
//!
//! Every datagram starts with a one-byte message tag. All multi-byte
//! fields are **big-endian**.
//!
//! ## Chunk datagram (29 byte header + payload)
//!
//! ```text
//! msg_type:     u8   (1)   = 1
//! frame_id:     u32  (4)
//! chunk_index:  u32  (4)
//! total_chunks: u32  (4)
//! width:        u32  (4)
//! height:       u32  (4)
//! chunk_size:   u32  (4)
//! chunk_offset: u32  (4)
//! data:         [u8] (chunk_size bytes)
//! ```
//!
//! ## Control datagram (17 bytes)
//!
//! ```text
//! msg_type:     u8      (1) = 2
//! x_axis:       f32     (4)
//! y_axis:       f32     (4)
//! buttons:      [u8; 8] (8)
//! ```

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::FramecastError;

// ── Constants ────────────────────────────────────────────────────

/// Largest datagram the sender emits, chosen to avoid IP fragmentation.
pub const MAX_DATAGRAM_SIZE: usize = 1400;

/// Largest chunk payload the receiver accepts.
pub const MAX_CHUNK_PAYLOAD: usize = 1400;

/// Packed RGB24: three interleaved bytes per pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// Number of button slots carried by a control sample.
pub const CONTROL_BUTTONS: usize = 8;

/// Well-known port the receiver binds for video chunks.
pub const DEFAULT_VIDEO_PORT: u16 = 5555;

/// Well-known port the sender binds for control samples.
pub const DEFAULT_CONTROL_PORT: u16 = 5556;

/// Default raster width in pixels.
pub const DEFAULT_WIDTH: u32 = 640;

/// Default raster height in pixels.
pub const DEFAULT_HEIGHT: u32 = 480;

/// Size in bytes of a `width` x `height` raster, if it fits in memory.
pub fn raster_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

// ── MessageType ──────────────────────────────────────────────────

/// Leading tag of every datagram.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// One fragment of a raster frame (sender → receiver).
    FrameChunk = 1,
    /// A control-input sample (receiver → sender).
    Control = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = FramecastError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::FrameChunk),
            2 => Ok(MessageType::Control),
            other => Err(FramecastError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::FrameChunk => write!(f, "FrameChunk"),
            MessageType::Control => write!(f, "Control"),
        }
    }
}

/// Check the tag byte at the start of `data` against `expected`.
fn expect_tag(data: &[u8], expected: MessageType) -> Result<(), FramecastError> {
    let tag = MessageType::try_from(data[0])?;
    if tag != expected {
        return Err(FramecastError::UnexpectedMessageType {
            expected: expected as u8,
            actual: tag as u8,
        });
    }
    Ok(())
}

// ── ChunkHeader ──────────────────────────────────────────────────

/// Self-describing header prepended to every chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub frame_id: u32,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub width: u32,
    pub height: u32,
    pub chunk_size: u32,
    pub chunk_offset: u32,
}

impl ChunkHeader {
    /// Encoded size on the wire, tag included.
    pub const SIZE: usize = 29;

    /// Serialize the header (tag included) into `dst`.
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(MessageType::FrameChunk as u8);
        dst.put_u32(self.frame_id);
        dst.put_u32(self.chunk_index);
        dst.put_u32(self.total_chunks);
        dst.put_u32(self.width);
        dst.put_u32(self.height);
        dst.put_u32(self.chunk_size);
        dst.put_u32(self.chunk_offset);
    }

    /// Serialize to a fixed array.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        self.encode(&mut &mut buf[..]);
        buf
    }

    /// Parse the header at the start of `data`.
    ///
    /// Only the header is validated here; payload checks belong to the
    /// codec and the reassembler.
    pub fn decode(data: &[u8]) -> Result<Self, FramecastError> {
        if data.len() < Self::SIZE {
            return Err(FramecastError::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        expect_tag(data, MessageType::FrameChunk)?;

        let mut buf = &data[1..Self::SIZE];
        Ok(Self {
            frame_id: buf.get_u32(),
            chunk_index: buf.get_u32(),
            total_chunks: buf.get_u32(),
            width: buf.get_u32(),
            height: buf.get_u32(),
            chunk_size: buf.get_u32(),
            chunk_offset: buf.get_u32(),
        })
    }

    /// Byte size of the raster this header's frame was fragmented from.
    pub fn frame_len(&self) -> Option<usize> {
        raster_len(self.width, self.height)
    }
}

// ── ControlSample ────────────────────────────────────────────────

/// One sample of the receiver's local input.
///
/// There is no sequence number: the newest sample to arrive wins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlSample {
    /// Horizontal axis in `[-1.0, 1.0]`.
    pub x_axis: f32,
    /// Vertical axis in `[-1.0, 1.0]`.
    pub y_axis: f32,
    pub buttons: [bool; CONTROL_BUTTONS],
}

impl ControlSample {
    /// Encoded size on the wire, tag included.
    pub const SIZE: usize = 17;

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(MessageType::Control as u8);
        dst.put_f32(self.x_axis);
        dst.put_f32(self.y_axis);
        for pressed in self.buttons {
            dst.put_u8(pressed as u8);
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        self.encode(&mut &mut buf[..]);
        buf
    }

    /// Parse a control datagram. The datagram must be exactly
    /// [`ControlSample::SIZE`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self, FramecastError> {
        if data.len() < Self::SIZE {
            return Err(FramecastError::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        if data.len() != Self::SIZE {
            return Err(FramecastError::LengthMismatch {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        expect_tag(data, MessageType::Control)?;

        let mut buf = &data[1..];
        let x_axis = buf.get_f32();
        let y_axis = buf.get_f32();
        if !x_axis.is_finite() || !y_axis.is_finite() {
            return Err(FramecastError::InvalidControl("non-finite axis value"));
        }

        let mut buttons = [false; CONTROL_BUTTONS];
        for slot in buttons.iter_mut() {
            *slot = buf.get_u8() != 0;
        }

        Ok(Self {
            x_axis,
            y_axis,
            buttons,
        })
    }

    /// Buttons rendered as `0`/`1` digits, for logging.
    pub fn buttons_display(&self) -> String {
        self.buttons
            .iter()
            .map(|&b| if b { '1' } else { '0' })
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ChunkHeader {
        ChunkHeader {
            frame_id: 0x0102_0304,
            chunk_index: 7,
            total_chunks: 673,
            width: 640,
            height: 480,
            chunk_size: 1371,
            chunk_offset: 7 * 1371,
        }
    }

    #[test]
    fn chunk_header_is_big_endian() {
        let bytes = sample_header().to_bytes();
        assert_eq!(bytes.len(), ChunkHeader::SIZE);
        assert_eq!(bytes[0], MessageType::FrameChunk as u8);
        assert_eq!(&bytes[1..5], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[17..21], &[0, 0, 0x01, 0xE0]); // height 480
    }

    #[test]
    fn chunk_header_decode_matches_encode() {
        let hdr = sample_header();
        let decoded = ChunkHeader::decode(&hdr.to_bytes()).unwrap();
        assert_eq!(decoded, hdr);
        assert_eq!(decoded.frame_len(), Some(921_600));
    }

    #[test]
    fn chunk_header_too_short() {
        let short = [1u8; 10];
        assert!(matches!(
            ChunkHeader::decode(&short),
            Err(FramecastError::Truncated { expected: 29, actual: 10 })
        ));
    }

    #[test]
    fn chunk_header_wrong_tag() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = MessageType::Control as u8;
        assert!(matches!(
            ChunkHeader::decode(&bytes),
            Err(FramecastError::UnexpectedMessageType { expected: 1, actual: 2 })
        ));

        bytes[0] = 0x42;
        assert!(matches!(
            ChunkHeader::decode(&bytes),
            Err(FramecastError::UnknownMessageType(0x42))
        ));
    }

    #[test]
    fn control_sample_layout() {
        let mut sample = ControlSample {
            x_axis: -1.0,
            y_axis: 0.5,
            buttons: [false; CONTROL_BUTTONS],
        };
        sample.buttons[0] = true;
        sample.buttons[7] = true;

        let bytes = sample.to_bytes();
        assert_eq!(bytes[0], MessageType::Control as u8);
        assert_eq!(&bytes[1..5], &(-1.0f32).to_be_bytes());
        assert_eq!(&bytes[5..9], &0.5f32.to_be_bytes());
        assert_eq!(&bytes[9..], &[1, 0, 0, 0, 0, 0, 0, 1]);

        let decoded = ControlSample::decode(&bytes).unwrap();
        assert_eq!(decoded, sample);
        assert_eq!(decoded.buttons_display(), "10000001");
    }

    #[test]
    fn control_sample_rejects_wrong_size() {
        let bytes = ControlSample::default().to_bytes();
        assert!(ControlSample::decode(&bytes[..16]).is_err());

        let mut long = bytes.to_vec();
        long.push(0);
        assert!(matches!(
            ControlSample::decode(&long),
            Err(FramecastError::LengthMismatch { expected: 17, actual: 18 })
        ));
    }

    #[test]
    fn control_sample_rejects_nan() {
        let mut bytes = ControlSample::default().to_bytes();
        bytes[1..5].copy_from_slice(&f32::NAN.to_be_bytes());
        assert!(matches!(
            ControlSample::decode(&bytes),
            Err(FramecastError::InvalidControl(_))
        ));
    }

    #[test]
    fn raster_len_default_resolution() {
        assert_eq!(raster_len(DEFAULT_WIDTH, DEFAULT_HEIGHT), Some(921_600));
        assert_eq!(raster_len(0, 480), Some(0));
    }
}
